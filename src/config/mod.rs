//! Config schema, loading, and validation.

mod load;
mod schema;

use thiserror::Error;

pub use load::{load, load_defaults};
pub use schema::{
    CameraSource, CaptureConfig, Config, LogFormat, LoggingConfig, Resolution, StorageConfig,
};

/// Config capability errors.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}

use std::fs;
use std::path::Path;

use crate::paths;

use super::{Config, ConfigError};

/// Load and validate a config file.
///
/// The output root's leading `~` is expanded here, so everything
/// downstream sees a concrete path.
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let mut config: Config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })?;
    config.storage.output_dir = paths::expand_home(&config.storage.output_dir);
    config.validate()?;
    Ok(config)
}

/// Built-in defaults with the output root expanded, for running without
/// a config file.
pub fn load_defaults() -> Config {
    let mut config = Config::default();
    config.storage.output_dir = paths::expand_home(&config.storage.output_dir);
    config
}

#![forbid(unsafe_code)]

pub mod camera;
pub mod config;
pub mod daemon;
pub mod error;
pub mod lock;
pub mod paths;
pub mod status;
pub mod storage;
pub mod telemetry;

pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;

// Re-export the main surface at crate root for convenience
pub use crate::camera::{CameraBackend, CameraError, detect_camera};
pub use crate::config::Config;
pub use crate::daemon::CaptureDaemon;
pub use crate::lock::CameraLock;
pub use crate::status::{DaemonState, StatusSnapshot};
pub use crate::storage::StorageManager;

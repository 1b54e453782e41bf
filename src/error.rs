use thiserror::Error;

use crate::camera::CameraError;
use crate::config::ConfigError;
use crate::lock::LockError;
use crate::status::StatusError;
use crate::storage::StorageError;

/// Crate-level convenience error.
///
/// Not a "god error": it is a thin wrapper over canonical capability errors.
/// Handling policy is positional. The daemon absorbs capture and publish
/// faults inside the loop, and only startup faults escape through this type.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Camera(#[from] CameraError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Status(#[from] StatusError),
}

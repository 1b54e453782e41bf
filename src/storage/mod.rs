//! Disk-space guard, image path layout, and retention cleanup.

mod cleanup;
mod manager;

pub use cleanup::cleanup_old_days;
pub use manager::StorageManager;

use thiserror::Error;

/// Storage capability errors.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StorageError {
    /// `statvfs` failed on the output root. Surfaces a vanished or
    /// unreadable output tree to the caller instead of guessing.
    #[error("failed to stat filesystem at {path}: {errno}")]
    Statvfs {
        path: String,
        errno: nix::errno::Errno,
    },

    /// The filesystem reports zero capacity, which no disk that can
    /// actually hold images does.
    #[error("filesystem at {path} reports zero capacity")]
    NoCapacity { path: String },

    #[error("output directory {path} is not writable: {source}")]
    NotWritable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

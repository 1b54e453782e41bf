//! Inter-process camera mutex.
//!
//! One advisory flock on a well-known path serializes physical camera
//! access across processes (the daemon and any future live-view reader).
//! The kernel drops the lock if the holder dies, so a crashed process
//! can never wedge the camera. The lock file itself is never unlinked;
//! unlinking would let a second process lock a fresh inode while the
//! first still holds the old one.

use std::fs::{File, OpenOptions};
use std::io::Write as _;
use std::path::Path;

use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use thiserror::Error;

/// Lock capability errors.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum LockError {
    /// Non-blocking acquire found the lock already held.
    #[error("camera lock {path} is held by another process")]
    Busy { path: String },

    #[error("failed to open lock file {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to lock {path}: {errno}")]
    Acquire { path: String, errno: Errno },
}

/// Held camera lock; released on drop.
pub struct CameraLock {
    _flock: Flock<File>,
}

impl CameraLock {
    /// Acquire the lock at `path`, creating the file if absent.
    ///
    /// Blocking mode waits indefinitely; non-blocking mode returns
    /// [`LockError::Busy`] if another process holds the lock. The holder
    /// pid is written into the file for diagnostics only.
    pub fn acquire(path: &Path, blocking: bool) -> Result<Self, LockError> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(path)
            .map_err(|source| LockError::Open {
                path: path.display().to_string(),
                source,
            })?;
        let arg = if blocking {
            FlockArg::LockExclusive
        } else {
            FlockArg::LockExclusiveNonblock
        };
        let mut flock = match Flock::lock(file, arg) {
            Ok(flock) => flock,
            Err((_, errno)) if errno == Errno::EWOULDBLOCK => {
                return Err(LockError::Busy {
                    path: path.display().to_string(),
                });
            }
            Err((_, errno)) => {
                return Err(LockError::Acquire {
                    path: path.display().to_string(),
                    errno,
                });
            }
        };
        write_holder_pid(&mut flock);
        Ok(Self { _flock: flock })
    }
}

/// Record the holder pid in the lock file. Diagnostic only: failures
/// here never fail the acquisition.
fn write_holder_pid(file: &mut File) {
    let _ = file.set_len(0);
    let _ = write!(file, "{}", std::process::id());
    let _ = file.flush();
}

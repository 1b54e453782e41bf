//! Disk-space guard and the dated image tree.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use nix::sys::statvfs::statvfs;

use crate::config::StorageConfig;

use super::StorageError;

const BYTES_PER_GB: f64 = (1024u64 * 1024 * 1024) as f64;

/// Decides whether capture may proceed and where each image lands.
///
/// Thresholds are mutable at runtime so a config reload can tighten or
/// relax them without a restart.
pub struct StorageManager {
    output_dir: PathBuf,
    stop_threshold: f64,
    warn_threshold: f64,
}

impl StorageManager {
    pub fn new(storage: &StorageConfig) -> Self {
        Self {
            output_dir: storage.output_dir.clone(),
            stop_threshold: storage.stop_threshold,
            warn_threshold: storage.warn_threshold,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn set_thresholds(&mut self, stop: f64, warn: f64) {
        self.stop_threshold = stop;
        self.warn_threshold = warn;
    }

    /// Create the output root if absent and prove it is writable by
    /// touching and removing a probe file. A failure here is fatal at
    /// startup: a daemon that cannot write images must not start.
    pub fn ensure_output_dir(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.output_dir)?;
        let probe = self.output_dir.join(".write_test");
        fs::write(&probe, b"").map_err(|source| StorageError::NotWritable {
            path: self.output_dir.display().to_string(),
            source,
        })?;
        fs::remove_file(&probe).map_err(|source| StorageError::NotWritable {
            path: self.output_dir.display().to_string(),
            source,
        })?;
        Ok(())
    }

    /// Percent of the backing filesystem in use, counting root-reserved
    /// blocks as used.
    pub fn disk_usage_percent(&self) -> Result<f64, StorageError> {
        let stats = self.fs_stats()?;
        let used = stats.total_bytes.saturating_sub(stats.free_bytes);
        Ok(used as f64 / stats.total_bytes as f64 * 100.0)
    }

    /// Space still available to this process on the backing filesystem, in GB.
    pub fn disk_free_gb(&self) -> Result<f64, StorageError> {
        Ok(self.fs_stats()?.available_bytes as f64 / BYTES_PER_GB)
    }

    /// Whether capture may proceed. `Ok(false)` means the stop threshold
    /// is breached; crossing only the warn threshold logs and allows the
    /// capture. A failed disk query is an error the caller must handle,
    /// not a silent go-ahead.
    pub fn has_space(&self) -> Result<bool, StorageError> {
        let usage = self.disk_usage_percent()?;
        match space_state(usage, self.stop_threshold, self.warn_threshold) {
            SpaceState::Full => {
                tracing::error!(
                    usage = format_args!("{usage:.1}%"),
                    stop_threshold = self.stop_threshold,
                    "disk usage at stop threshold, capture disabled"
                );
                Ok(false)
            }
            SpaceState::NearFull => {
                tracing::warn!(
                    usage = format_args!("{usage:.1}%"),
                    warn_threshold = self.warn_threshold,
                    "disk usage approaching stop threshold"
                );
                Ok(true)
            }
            SpaceState::Ok => Ok(true),
        }
    }

    /// Target path for a capture at `timestamp`: `root/YYYY/MM/DD/HHMMSS.jpg`.
    /// Creates the day directory as a side effect. The caller must skip
    /// the capture if the path already exists; two timestamps in the same
    /// second collide by construction.
    pub fn image_path(&self, timestamp: NaiveDateTime) -> Result<PathBuf, StorageError> {
        let day_dir = self
            .output_dir
            .join(timestamp.format("%Y").to_string())
            .join(timestamp.format("%m").to_string())
            .join(timestamp.format("%d").to_string());
        fs::create_dir_all(&day_dir)?;
        Ok(day_dir.join(format!("{}.jpg", timestamp.format("%H%M%S"))))
    }

    /// `statvfs` on the output root. Fails if the root has vanished,
    /// which the caller treats as a daemon-stopping fault.
    fn fs_stats(&self) -> Result<FsStats, StorageError> {
        let stats = statvfs(&self.output_dir).map_err(|errno| StorageError::Statvfs {
            path: self.output_dir.display().to_string(),
            errno,
        })?;
        // fsblkcnt_t and the fragment size are u32 on 32-bit targets.
        let frsize = stats.fragment_size() as u64;
        let total_bytes = stats.blocks() as u64 * frsize;
        if total_bytes == 0 {
            return Err(StorageError::NoCapacity {
                path: self.output_dir.display().to_string(),
            });
        }
        Ok(FsStats {
            total_bytes,
            free_bytes: stats.blocks_free() as u64 * frsize,
            available_bytes: stats.blocks_available() as u64 * frsize,
        })
    }
}

/// Byte counts derived from `statvfs`. Free counts root-reserved blocks,
/// available is what an unprivileged writer can actually use.
struct FsStats {
    total_bytes: u64,
    free_bytes: u64,
    available_bytes: u64,
}

enum SpaceState {
    Ok,
    NearFull,
    Full,
}

/// Pure threshold policy, split out so it is testable without a disk.
fn space_state(usage: f64, stop: f64, warn: f64) -> SpaceState {
    if usage >= stop {
        SpaceState::Full
    } else if usage >= warn {
        SpaceState::NearFull
    } else {
        SpaceState::Ok
    }
}

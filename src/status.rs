//! Atomic status publishing.
//!
//! One JSON snapshot per cycle, committed by write-temp-then-rename in
//! the status file's own directory. A concurrent reader sees either the
//! previous complete snapshot or the new one, never a torn write, even
//! if the daemon is killed mid-publish.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Status capability errors.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StatusError {
    #[error("failed to serialize status: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write status to {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DaemonState {
    Running,
    Stopped,
    Error,
}

impl DaemonState {
    pub fn as_str(self) -> &'static str {
        match self {
            DaemonState::Running => "running",
            DaemonState::Stopped => "stopped",
            DaemonState::Error => "error",
        }
    }
}

impl fmt::Display for DaemonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One published copy of daemon health. Constructed fresh each cycle,
/// superseded by the next snapshot, never mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub daemon: DaemonState,
    /// Active backend name.
    pub camera: String,
    /// Local timestamp of the last capture attempt that ran.
    pub last_capture: Option<String>,
    pub last_capture_success: Option<bool>,
    pub consecutive_failures: u32,
    pub captures_today: u32,
    /// Percent of the backing filesystem in use; `-1` if the query failed.
    pub disk_usage_percent: f64,
    /// Free space on the backing filesystem in GB; `-1` if the query failed.
    pub disk_free_gb: f64,
    pub uptime_seconds: f64,
    /// Config file the daemon is running from, or `"defaults"`.
    pub config_loaded: String,
}

/// Serialize and atomically commit a snapshot.
///
/// Best-effort from the control loop's perspective: the caller logs the
/// error and moves on. The temp file is cleaned up on any failure.
pub fn write_status(path: &Path, snapshot: &StatusSnapshot) -> Result<(), StatusError> {
    let contents = serde_json::to_string_pretty(snapshot)?;
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|source| StatusError::Write {
        path: path.display().to_string(),
        source,
    })?;
    let temp = tempfile::Builder::new()
        .prefix(".status-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|source| StatusError::Write {
            path: path.display().to_string(),
            source,
        })?;
    fs::write(temp.path(), contents).map_err(|source| StatusError::Write {
        path: path.display().to_string(),
        source,
    })?;
    temp.persist(path).map_err(|e| StatusError::Write {
        path: path.display().to_string(),
        source: e.error,
    })?;
    Ok(())
}

/// Read a published snapshot; `None` if the file is missing or does not
/// parse. Never fails: a corrupt status artifact is a reporting problem,
/// not an operational one.
pub fn read_status(path: &Path) -> Option<StatusSnapshot> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!(path = %path.display(), "failed to read status file: {e}");
            return None;
        }
    };
    match serde_json::from_str(&contents) {
        Ok(snapshot) => Some(snapshot),
        Err(e) => {
            tracing::warn!(path = %path.display(), "failed to parse status file: {e}");
            None
        }
    }
}

/// Round to one decimal place for published percentages and uptimes.
pub(crate) fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Round to two decimal places for published gigabyte counts.
pub(crate) fn round_hundredth(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StatusSnapshot {
        StatusSnapshot {
            daemon: DaemonState::Running,
            camera: "picamera".to_string(),
            last_capture: Some("2026-08-22T06:30:00".to_string()),
            last_capture_success: Some(true),
            consecutive_failures: 0,
            captures_today: 17,
            disk_usage_percent: 42.5,
            disk_free_gb: 101.23,
            uptime_seconds: 3600.4,
            config_loaded: "/etc/timelapsed/timelapsed.toml".to_string(),
        }
    }

    #[test]
    fn write_then_read_roundtrips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(".status.json");

        write_status(&path, &sample()).expect("write status");
        let read = read_status(&path).expect("status present");
        assert_eq!(read.daemon, DaemonState::Running);
        assert_eq!(read.camera, "picamera");
        assert_eq!(read.captures_today, 17);
        assert_eq!(read.disk_free_gb, 101.23);
        assert_eq!(read.config_loaded, "/etc/timelapsed/timelapsed.toml");
    }

    #[test]
    fn write_creates_missing_parents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested/output/.status.json");

        write_status(&path, &sample()).expect("write status");
        assert!(path.exists());
    }

    #[test]
    fn write_leaves_no_temp_files_behind() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(".status.json");

        write_status(&path, &sample()).expect("first write");
        write_status(&path, &sample()).expect("second write");

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .expect("read_dir")
            .map(|entry| entry.expect("entry").file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from(".status.json")]);
    }

    #[test]
    fn failed_rewrite_leaves_previous_status_intact() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(".status.json");
        write_status(&path, &sample()).expect("first write");

        let mut perms = fs::metadata(dir.path()).expect("dir metadata").permissions();
        perms.set_mode(0o555);
        fs::set_permissions(dir.path(), perms).expect("drop write permission");
        // Permission bits do not bind a privileged process; without a
        // refusable directory there is nothing to exercise.
        let canary = dir.path().join(".write_test");
        if fs::write(&canary, b"").is_ok() {
            let _ = fs::remove_file(&canary);
            return;
        }

        let mut replacement = sample();
        replacement.camera = "usb".to_string();
        replacement.captures_today = 99;
        let err = write_status(&path, &replacement).expect_err("write into read-only dir");
        assert!(matches!(err, StatusError::Write { .. }));

        let read = read_status(&path).expect("previous snapshot survives");
        assert_eq!(read.camera, "picamera");
        assert_eq!(read.captures_today, 17);

        let mut perms = fs::metadata(dir.path()).expect("dir metadata").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(dir.path(), perms).expect("restore write permission");
    }

    #[test]
    fn read_missing_file_is_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(read_status(&dir.path().join(".status.json")).is_none());
    }

    #[test]
    fn read_corrupt_file_is_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(".status.json");
        std::fs::write(&path, "{ not json").expect("write garbage");
        assert!(read_status(&path).is_none());
    }

    #[test]
    fn daemon_state_serializes_lowercase() {
        let value = serde_json::to_value(sample()).expect("to_value");
        assert_eq!(value["daemon"], "running");
    }

    #[test]
    fn rounding_helpers_clamp_precision() {
        assert_eq!(round_tenth(3.14159), 3.1);
        assert_eq!(round_tenth(7.25), 7.3);
        assert_eq!(round_hundredth(101.2345), 101.23);
    }
}

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub capture: CaptureConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Reject out-of-range fields before the daemon ever sees them.
    ///
    /// The daemon trusts a validated config: no range is re-checked at
    /// capture time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capture.interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "capture.interval_secs",
                reason: "must be a positive number of seconds".to_string(),
            });
        }
        if self.capture.jpeg_quality == 0 || self.capture.jpeg_quality > 100 {
            return Err(ConfigError::Invalid {
                field: "capture.jpeg_quality",
                reason: format!("must be 1-100, got {}", self.capture.jpeg_quality),
            });
        }
        if !(0.0..=100.0).contains(&self.storage.stop_threshold) {
            return Err(ConfigError::Invalid {
                field: "storage.stop_threshold",
                reason: format!("must be 0-100, got {}", self.storage.stop_threshold),
            });
        }
        if !(0.0..=100.0).contains(&self.storage.warn_threshold) {
            return Err(ConfigError::Invalid {
                field: "storage.warn_threshold",
                reason: format!("must be 0-100, got {}", self.storage.warn_threshold),
            });
        }
        if self.storage.retention_days == 0 {
            return Err(ConfigError::Invalid {
                field: "storage.retention_days",
                reason: "must be a positive number of days".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Seconds between cycle starts, not between cycle end and next start.
    pub interval_secs: u64,
    pub source: CameraSource,
    pub resolution: Resolution,
    pub jpeg_quality: u8,
    /// V4L device index, only meaningful for the USB backend.
    pub device_index: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            source: CameraSource::Auto,
            resolution: Resolution(1920, 1080),
            jpeg_quality: 85,
            device_index: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraSource {
    Auto,
    Pi,
    Usb,
}

impl CameraSource {
    pub fn as_str(self) -> &'static str {
        match self {
            CameraSource::Auto => "auto",
            CameraSource::Pi => "pi",
            CameraSource::Usb => "usb",
        }
    }
}

impl fmt::Display for CameraSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target resolution, serialized as a `[width, height]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution(pub u32, pub u32);

impl Resolution {
    pub fn width(self) -> u32 {
        self.0
    }

    pub fn height(self) -> u32 {
        self.1
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.0, self.1)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Output root; a leading `~` is expanded at load time.
    pub output_dir: PathBuf,
    /// Disk usage percent at which capture stops.
    pub stop_threshold: f64,
    /// Disk usage percent at which warnings start.
    pub warn_threshold: f64,
    pub cleanup_enabled: bool,
    pub retention_days: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("~/timelapse-images"),
            stop_threshold: 90.0,
            warn_threshold: 85.0,
            cleanup_enabled: false,
            retention_days: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Pretty,
    Compact,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Extra tracing filter directives, e.g. `"timelapsed=debug"`.
    pub filter: Option<String>,
    pub format: LogFormat,
    /// Log every successful capture at info level. Off by default to keep
    /// week-long journals readable at one-minute intervals.
    pub gap_tracking: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: None,
            format: LogFormat::Compact,
            gap_tracking: false,
        }
    }
}

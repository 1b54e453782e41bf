//! Pi camera module backend driving the libcamera still tools.

use std::path::Path;
use std::process::{Command, Stdio};

use crate::config::Resolution;

use super::{CameraBackend, CameraError};

/// Capture tools in preference order. Bookworm ships `rpicam-still`;
/// older images only have `libcamera-still`.
const CAPTURE_TOOLS: &[&str] = &["rpicam-still", "libcamera-still"];

/// Milliseconds the sensor pipeline gets to converge auto-exposure
/// before the shutter fires.
const SETTLE_MS: u32 = 2000;

pub struct PiCameraBackend {
    resolution: Resolution,
    tool: Option<&'static str>,
}

impl PiCameraBackend {
    pub fn new(resolution: Resolution) -> Self {
        Self {
            resolution,
            tool: None,
        }
    }

    fn resolve_tool() -> Option<&'static str> {
        CAPTURE_TOOLS.iter().copied().find(|tool| {
            Command::new(tool)
                .arg("--version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .is_ok_and(|status| status.success())
        })
    }
}

impl CameraBackend for PiCameraBackend {
    fn name(&self) -> &'static str {
        "picamera"
    }

    fn open(&mut self) -> Result<(), CameraError> {
        let tool = Self::resolve_tool().ok_or(CameraError::ToolMissing)?;
        self.tool = Some(tool);
        tracing::info!(tool, resolution = %self.resolution, "Pi camera ready");
        Ok(())
    }

    fn capture(&mut self, output_path: &Path, quality: u8) -> Result<bool, CameraError> {
        let Some(tool) = self.tool else {
            return Err(CameraError::NotOpen);
        };
        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let output = Command::new(tool)
            .arg("-n")
            .args(["-t", &SETTLE_MS.to_string()])
            .args(["--width", &self.resolution.width().to_string()])
            .args(["--height", &self.resolution.height().to_string()])
            .args(["-q", &quality.to_string()])
            .arg("-o")
            .arg(output_path)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(tool, status = %output.status, "capture tool failed: {}", stderr.trim());
            return Ok(false);
        }
        // The tool can exit 0 without writing a frame; an empty file is a
        // dropped frame, and we keep only valid JPEGs in the output tree.
        let wrote_frame = std::fs::metadata(output_path).is_ok_and(|meta| meta.len() > 0);
        if !wrote_frame {
            tracing::warn!(path = %output_path.display(), "capture produced no image data");
            let _ = std::fs::remove_file(output_path);
        }
        Ok(wrote_frame)
    }

    fn close(&mut self) {
        // Subprocess capture holds no persistent pipeline.
        self.tool = None;
    }

    fn is_available(&self) -> bool {
        let Some(tool) = Self::resolve_tool() else {
            return false;
        };
        Command::new(tool)
            .arg("--list-cameras")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|status| status.success())
    }
}

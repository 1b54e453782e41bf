//! USB webcam backend over V4L2.
//!
//! Streams MJPG frames and re-encodes through the `image` crate so the
//! configured JPEG quality actually applies. Pi camera modules are not
//! reachable through V4L2 on current Raspberry Pi OS; that hardware goes
//! through [`super::PiCameraBackend`].

use std::io::Write as _;
use std::path::Path;
use std::thread;
use std::time::Duration;

use image::codecs::jpeg::JpegEncoder;
use v4l::Device;
use v4l::FourCC;
use v4l::buffer::Type;
use v4l::io::mmap::Stream as MmapStream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;

use crate::config::Resolution;

use super::{CameraBackend, CameraError};

/// Auto-exposure settle time after the device opens.
const SETTLE: Duration = Duration::from_millis(500);

/// Buffers for the per-shot stream; one in flight, one being filled.
const STREAM_BUFFERS: u32 = 2;

pub struct UsbCameraBackend {
    device_index: u32,
    resolution: Resolution,
    device: Option<Device>,
}

impl UsbCameraBackend {
    pub fn new(device_index: u32, resolution: Resolution) -> Self {
        Self {
            device_index,
            resolution,
            device: None,
        }
    }

    fn device_path(&self) -> String {
        format!("/dev/video{}", self.device_index)
    }
}

impl CameraBackend for UsbCameraBackend {
    fn name(&self) -> &'static str {
        "usb"
    }

    fn open(&mut self) -> Result<(), CameraError> {
        let device = Device::new(self.device_index as usize).map_err(|e| CameraError::Open {
            device: self.device_path(),
            reason: e.to_string(),
        })?;
        let wanted = v4l::Format::new(
            self.resolution.width(),
            self.resolution.height(),
            FourCC::new(b"MJPG"),
        );
        let actual = Capture::set_format(&device, &wanted).map_err(|e| CameraError::Open {
            device: self.device_path(),
            reason: format!("set_format failed: {e}"),
        })?;
        if &actual.fourcc.repr != b"MJPG" {
            return Err(CameraError::UnsupportedFormat {
                device: self.device_path(),
                offered: String::from_utf8_lossy(&actual.fourcc.repr).into_owned(),
            });
        }
        if actual.width != self.resolution.width() || actual.height != self.resolution.height() {
            tracing::debug!(
                wanted = %self.resolution,
                got = format!("{}x{}", actual.width, actual.height),
                "driver adjusted capture resolution"
            );
        }
        thread::sleep(SETTLE);
        self.device = Some(device);
        tracing::info!(
            index = self.device_index,
            resolution = %self.resolution,
            "USB camera opened"
        );
        Ok(())
    }

    fn capture(&mut self, output_path: &Path, quality: u8) -> Result<bool, CameraError> {
        let Some(device) = self.device.as_ref() else {
            return Err(CameraError::NotOpen);
        };

        // Fresh stream per shot: a stream left running between captures
        // hands back a frame as old as the dequeue backlog, which at
        // timelapse intervals means a stale image.
        let mut stream = MmapStream::with_buffers(device, Type::VideoCapture, STREAM_BUFFERS)?;
        // First dequeued frame is whatever was in the buffer when the
        // stream started; discard it.
        let _ = stream.next()?;
        let (data, meta) = stream.next()?;

        let used = (meta.bytesused as usize).min(data.len());
        if used == 0 {
            tracing::warn!(index = self.device_index, "empty frame from webcam");
            return Ok(false);
        }
        let decoded = match image::load_from_memory(&data[..used]) {
            Ok(img) => img,
            Err(e) => {
                tracing::warn!(index = self.device_index, "frame decode failed: {e}");
                return Ok(false);
            }
        };

        let rgb = decoded.to_rgb8();
        let mut encoded = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut encoded, quality);
        if let Err(e) = encoder.encode_image(&rgb) {
            tracing::warn!(index = self.device_index, "jpeg encode failed: {e}");
            return Ok(false);
        }

        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::File::create(output_path)?;
        file.write_all(&encoded)?;
        Ok(true)
    }

    fn close(&mut self) {
        // Dropping the handle closes the fd; double-close is a no-op.
        self.device = None;
    }

    fn is_available(&self) -> bool {
        let Ok(device) = Device::new(self.device_index as usize) else {
            return false;
        };
        device
            .query_caps()
            .is_ok_and(|caps| {
                caps.capabilities
                    .contains(v4l::capability::Flags::VIDEO_CAPTURE)
            })
    }
}

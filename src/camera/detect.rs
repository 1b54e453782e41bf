//! Backend selection and the capture timeout wrapper.

use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel::RecvTimeoutError;

use crate::config::{CameraSource, CaptureConfig};

use super::{CameraBackend, CameraError, PiCameraBackend, SharedBackend, UsbCameraBackend};

/// Select a backend for the configured source.
///
/// An explicit source must be available or detection fails. `auto`
/// probes the module camera first, then a USB webcam; the order is a
/// policy choice (the module camera is the primary expected hardware)
/// and stays deterministic. The returned backend is not yet opened.
pub fn detect_camera(capture: &CaptureConfig) -> Result<Box<dyn CameraBackend>, CameraError> {
    match capture.source {
        CameraSource::Pi => {
            let backend = PiCameraBackend::new(capture.resolution);
            if !backend.is_available() {
                return Err(CameraError::NoneDetected(
                    "Pi camera source requested but no module camera responded; \
                     check the ribbon cable and that rpicam-still is installed"
                        .to_string(),
                ));
            }
            tracing::info!("camera selected: picamera (forced)");
            Ok(Box::new(backend))
        }
        CameraSource::Usb => {
            let backend = UsbCameraBackend::new(capture.device_index, capture.resolution);
            if !backend.is_available() {
                return Err(CameraError::NoneDetected(format!(
                    "USB camera source requested but no camera found at device index {}",
                    capture.device_index
                )));
            }
            tracing::info!("camera selected: usb (forced)");
            Ok(Box::new(backend))
        }
        CameraSource::Auto => {
            let pi = PiCameraBackend::new(capture.resolution);
            if pi.is_available() {
                tracing::info!("camera selected: picamera (auto-detected)");
                return Ok(Box::new(pi));
            }
            let usb = UsbCameraBackend::new(capture.device_index, capture.resolution);
            if usb.is_available() {
                tracing::info!("camera selected: usb (auto-detected)");
                return Ok(Box::new(usb));
            }
            Err(CameraError::NoneDetected(format!(
                "no camera detected; tried the Pi module camera, then a USB webcam \
                 at device index {}",
                capture.device_index
            )))
        }
    }
}

/// Run one capture under a time bound.
///
/// The capture runs on a worker thread; we block on its result or the
/// timeout, whichever comes first. On timeout the worker is abandoned
/// still holding the backend mutex, so the caller must treat the backend
/// state as unknown and prefer close/reopen before reuse. Worker errors
/// and panics both surface as a logged `false`, never a propagated fault.
pub fn capture_with_timeout(
    camera: &SharedBackend,
    output_path: &Path,
    quality: u8,
    timeout: Duration,
) -> bool {
    let (tx, rx) = crossbeam::channel::bounded(1);
    let worker_camera = Arc::clone(camera);
    let worker_path = output_path.to_path_buf();
    let spawned = thread::Builder::new()
        .name("capture".to_string())
        .spawn(move || {
            let mut backend = match worker_camera.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let _ = tx.send(backend.capture(&worker_path, quality));
        });
    if let Err(e) = spawned {
        tracing::error!("failed to spawn capture worker: {e}");
        return false;
    }

    match rx.recv_timeout(timeout) {
        Ok(Ok(wrote_frame)) => wrote_frame,
        Ok(Err(e)) => {
            tracing::error!("capture failed: {e}");
            false
        }
        Err(RecvTimeoutError::Timeout) => {
            tracing::error!(
                timeout_secs = timeout.as_secs(),
                path = %output_path.display(),
                "capture timed out"
            );
            false
        }
        Err(RecvTimeoutError::Disconnected) => {
            tracing::error!("capture worker exited without reporting a result");
            false
        }
    }
}

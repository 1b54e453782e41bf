//! Camera hardware abstraction.
//!
//! Provides:
//! - [`CameraBackend`]: the capability contract each hardware variant implements.
//! - [`detect_camera`]: source selection and auto-probing.
//! - [`capture_with_timeout`]: bounds one capture so a hung driver cannot stall the loop.

mod detect;
mod pi;
mod usb;

pub use detect::{capture_with_timeout, detect_camera};
pub use pi::PiCameraBackend;
pub use usb::UsbCameraBackend;

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;

/// Ceiling for one capture call. A backend that blows it is abandoned,
/// not killed; the recovery path's close/reopen restores known-good state.
pub const CAPTURE_TIMEOUT: Duration = Duration::from_secs(30);

/// Backend handle shared between the control loop and the capture worker.
pub type SharedBackend = Arc<Mutex<Box<dyn CameraBackend>>>;

/// Camera capability errors.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CameraError {
    /// `capture` called before `open`, or after `close`.
    #[error("camera is not open")]
    NotOpen,

    /// Detection exhausted every candidate backend.
    #[error("{0}")]
    NoneDetected(String),

    /// Opening the hardware pipeline failed.
    #[error("failed to open {device}: {reason}")]
    Open { device: String, reason: String },

    /// Neither Pi capture tool is installed.
    #[error("no Pi camera capture tool found (tried rpicam-still, libcamera-still)")]
    ToolMissing,

    /// Device offers no stream format we can consume.
    #[error("{device} offers no usable capture format (got {offered})")]
    UnsupportedFormat { device: String, offered: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Contract every hardware variant implements.
///
/// The pipeline is kept open across many captures: re-initialization is
/// the dominant latency cost, and toggling it destabilizes auto-exposure.
pub trait CameraBackend: Send {
    /// Stable backend name for logs and the status artifact.
    fn name(&self) -> &'static str;

    /// Initialize the hardware pipeline. May block for a short settle
    /// time while auto-exposure and white balance converge. Valid to
    /// call again only after a matching `close`.
    fn open(&mut self) -> Result<(), CameraError>;

    /// Produce exactly one JPEG at `output_path`, creating parent
    /// directories as needed. `quality` is an encoder hint in 1..=100.
    ///
    /// `Ok(false)` is an ordinary capture failure (dropped frame); `Err`
    /// is reserved for backend-level I/O faults.
    fn capture(&mut self, output_path: &Path, quality: u8) -> Result<bool, CameraError>;

    /// Release hardware resources. Must tolerate being called when never
    /// opened, or twice in a row.
    fn close(&mut self);

    /// Probe whether this camera type is currently connected. May open
    /// and immediately drop a throwaway handle; must not fail.
    fn is_available(&self) -> bool;
}

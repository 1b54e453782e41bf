//! Daemon module - the capture service.
//!
//! Provides:
//! - The control loop and its recovery state machine
//! - Startup wiring (config resolution, signals, storage, camera)
//! - The failure backoff schedule

mod backoff;
mod core;
mod run;

pub use backoff::backoff_delay;
pub use core::CaptureDaemon;
pub use run::run_daemon;

//! Daemon core - the control loop and recovery state machine.
//!
//! Owns all runtime state, the camera handle, and the storage guard.
//! Runs on a single thread; capture attempts execute on a short-lived
//! worker solely to enforce the capture timeout. Signal handlers never
//! touch this state beyond the two atomic flags.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, TryLockError};
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDate, NaiveDateTime};

use crate::camera::{self, CameraBackend, SharedBackend};
use crate::config::{self, Config};
use crate::lock::CameraLock;
use crate::status::{self, DaemonState, StatusSnapshot};
use crate::storage::{StorageManager, cleanup_old_days};
use crate::{Result, paths};

use super::backoff::backoff_delay;

/// Poll granularity for interruptible sleeps; bounds shutdown latency.
const WAIT_SLICE: Duration = Duration::from_millis(500);

/// Outcome of one capture attempt.
enum Attempt {
    Captured(PathBuf),
    /// An image for this second already exists; the camera was not touched.
    Skipped,
    Failed(&'static str),
}

pub struct CaptureDaemon {
    config: Config,
    config_path: Option<PathBuf>,
    camera: SharedBackend,
    camera_name: &'static str,
    storage: StorageManager,
    lock_path: PathBuf,
    shutdown: Arc<AtomicBool>,
    reload: Arc<AtomicBool>,
    started: Instant,
    consecutive_failures: u32,
    captures_today: u32,
    counter_date: NaiveDate,
    last_capture: Option<String>,
    last_capture_success: Option<bool>,
}

impl CaptureDaemon {
    /// Build a daemon around an already-opened backend and a storage
    /// guard whose output root has been verified writable.
    ///
    /// `shutdown` and `reload` are the only channels from the signal
    /// handlers into the loop.
    pub fn new(
        config: Config,
        config_path: Option<PathBuf>,
        camera: Box<dyn CameraBackend>,
        storage: StorageManager,
        shutdown: Arc<AtomicBool>,
        reload: Arc<AtomicBool>,
    ) -> Self {
        let camera_name = camera.name();
        Self {
            config,
            config_path,
            camera: Arc::new(Mutex::new(camera)),
            camera_name,
            storage,
            lock_path: PathBuf::from(paths::CAMERA_LOCK_PATH),
            shutdown,
            reload,
            started: Instant::now(),
            consecutive_failures: 0,
            captures_today: 0,
            counter_date: Local::now().date_naive(),
            last_capture: None,
            last_capture_success: None,
        }
    }

    /// Run the control loop until shutdown is requested.
    ///
    /// Transient capture faults are absorbed by the backoff machinery
    /// and never escape. A fault that does escape (a failed disk query)
    /// closes the camera and publishes an `error` snapshot first; the
    /// process supervisor owns the restart from there.
    pub fn run(&mut self) -> Result<()> {
        tracing::info!(
            camera = self.camera_name,
            interval_secs = self.config.capture.interval_secs,
            output_dir = %self.storage.output_dir().display(),
            "capture daemon started"
        );

        while !self.shutdown.load(Ordering::Relaxed) {
            if self.reload.swap(false, Ordering::Relaxed) {
                self.reload_config();
            }
            self.roll_daily_counter();

            let cycle_start = Instant::now();
            if let Err(e) = self.capture_once() {
                tracing::error!("unrecoverable fault in capture cycle: {e}");
                self.close_camera();
                self.publish_status(DaemonState::Error);
                return Err(e);
            }
            self.publish_status(DaemonState::Running);
            self.idle_until_next_cycle(cycle_start);
        }

        tracing::info!("shutdown requested, stopping capture daemon");
        self.close_camera();
        self.publish_status(DaemonState::Stopped);
        tracing::info!(captures_today = self.captures_today, "capture daemon stopped");
        Ok(())
    }

    /// Reset the captures-today counter when the local date rolls over.
    fn roll_daily_counter(&mut self) {
        let today = Local::now().date_naive();
        if today != self.counter_date {
            tracing::info!(
                date = %today,
                captures_yesterday = self.captures_today,
                "new day, resetting capture counter"
            );
            self.captures_today = 0;
            self.counter_date = today;
        }
    }

    fn capture_once(&mut self) -> Result<()> {
        self.capture_once_at(Local::now().naive_local())
    }

    /// One capture attempt at a given wall-clock time, split from
    /// [`Self::capture_once`] so tests can steer the timestamp.
    fn capture_once_at(&mut self, now: NaiveDateTime) -> Result<()> {
        if !self.storage.has_space()? {
            // Guard already logged the breach. No capture, no cleanup;
            // the next cycle re-checks.
            return Ok(());
        }

        match self.attempt_capture(now) {
            Attempt::Captured(path) => {
                self.consecutive_failures = 0;
                self.captures_today += 1;
                self.last_capture = Some(format_timestamp(now));
                self.last_capture_success = Some(true);
                if self.config.logging.gap_tracking {
                    tracing::info!(
                        path = %path.display(),
                        captures_today = self.captures_today,
                        "captured image"
                    );
                } else {
                    tracing::debug!(
                        path = %path.display(),
                        captures_today = self.captures_today,
                        "captured image"
                    );
                }
            }
            Attempt::Skipped => {}
            Attempt::Failed(reason) => {
                self.last_capture = Some(format_timestamp(now));
                self.last_capture_success = Some(false);
                self.recover(reason);
            }
        }

        self.run_cleanup(now);
        Ok(())
    }

    /// Derive the target path, take the inter-process lock, and run one
    /// bounded capture. The lock is released unconditionally, including
    /// on failure.
    fn attempt_capture(&mut self, now: NaiveDateTime) -> Attempt {
        let output_path = match self.storage.image_path(now) {
            Ok(path) => path,
            Err(e) => {
                tracing::error!("failed to derive image path: {e}");
                return Attempt::Failed("image path unavailable");
            }
        };
        if output_path.exists() {
            tracing::debug!(
                path = %output_path.display(),
                "image already exists for this second, skipping"
            );
            return Attempt::Skipped;
        }

        let lock = match CameraLock::acquire(&self.lock_path, true) {
            Ok(lock) => lock,
            Err(e) => {
                tracing::error!("camera lock unavailable: {e}");
                return Attempt::Failed("camera lock unavailable");
            }
        };
        let captured = camera::capture_with_timeout(
            &self.camera,
            &output_path,
            self.config.capture.jpeg_quality,
            camera::CAPTURE_TIMEOUT,
        );
        drop(lock);

        if captured {
            Attempt::Captured(output_path)
        } else {
            Attempt::Failed("capture failed or timed out")
        }
    }

    /// The sole fault-recovery mechanism: count the failure, close the
    /// backend, wait out the backoff, reopen. Unbounded in retries,
    /// bounded in delay.
    fn recover(&mut self, reason: &'static str) {
        self.consecutive_failures += 1;
        self.recover_with_delay(reason, backoff_delay(self.consecutive_failures));
    }

    fn recover_with_delay(&mut self, reason: &'static str, delay: Duration) {
        tracing::warn!(
            reason,
            consecutive_failures = self.consecutive_failures,
            backoff_secs = format_args!("{:.1}", delay.as_secs_f64()),
            "capture failed, backing off before reopen"
        );
        self.close_camera();
        if !self.idle_for(delay) {
            return;
        }
        self.reopen_camera();
    }

    /// Best-effort close. Uses try_lock: an abandoned capture worker may
    /// still hold the backend, and the loop must never block on it.
    fn close_camera(&self) {
        if self.with_backend(|backend| backend.close()).is_none() {
            tracing::warn!("camera held by an abandoned capture, skipping close");
        }
    }

    fn reopen_camera(&self) {
        match self.with_backend(|backend| backend.open()) {
            Some(Ok(())) => {
                tracing::info!(
                    camera = self.camera_name,
                    consecutive_failures = self.consecutive_failures,
                    "camera reopened"
                );
            }
            Some(Err(e)) => {
                tracing::warn!("camera reopen failed, will retry next cycle: {e}");
            }
            None => {
                tracing::warn!("camera held by an abandoned capture, skipping reopen");
            }
        }
    }

    fn with_backend<R>(&self, f: impl FnOnce(&mut dyn CameraBackend) -> R) -> Option<R> {
        match self.camera.try_lock() {
            Ok(mut backend) => Some(f(backend.as_mut())),
            Err(TryLockError::Poisoned(poisoned)) => Some(f(poisoned.into_inner().as_mut())),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    fn run_cleanup(&self, now: NaiveDateTime) {
        if !self.config.storage.cleanup_enabled {
            return;
        }
        match cleanup_old_days(
            self.storage.output_dir(),
            self.config.storage.retention_days,
            now,
        ) {
            Ok(0) => {}
            Ok(removed) => {
                tracing::info!(removed_days = removed, "retention cleanup removed old captures");
            }
            Err(e) => {
                tracing::warn!("retention cleanup failed: {e}");
            }
        }
    }

    /// Reload configuration from the startup path. A failed load keeps
    /// the previous config wholesale. Keys bound at backend-open time
    /// (source, resolution, output root) are warned about and pinned to
    /// their running values; everything else applies immediately.
    fn reload_config(&mut self) {
        let Some(path) = self.config_path.clone() else {
            tracing::warn!("reload requested but daemon is running on built-in defaults, ignoring");
            return;
        };
        tracing::info!(path = %path.display(), "reload requested, re-reading config");
        let mut incoming = match config::load(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!("config reload failed, keeping previous config: {e}");
                return;
            }
        };

        if incoming.capture.source != self.config.capture.source {
            tracing::warn!(
                old = %self.config.capture.source,
                new = %incoming.capture.source,
                "camera source changed, restart required to apply"
            );
            incoming.capture.source = self.config.capture.source;
        }
        if incoming.capture.resolution != self.config.capture.resolution {
            tracing::warn!(
                old = %self.config.capture.resolution,
                new = %incoming.capture.resolution,
                "resolution changed, restart required to apply"
            );
            incoming.capture.resolution = self.config.capture.resolution;
        }
        if incoming.storage.output_dir.as_path() != self.storage.output_dir() {
            tracing::warn!(
                old = %self.storage.output_dir().display(),
                new = %incoming.storage.output_dir.display(),
                "output directory changed, restart required to apply"
            );
            incoming.storage.output_dir = self.storage.output_dir().to_path_buf();
        }

        self.storage.set_thresholds(
            incoming.storage.stop_threshold,
            incoming.storage.warn_threshold,
        );
        self.config = incoming;
        tracing::info!("config reloaded");
    }

    fn publish_status(&self, state: DaemonState) {
        let snapshot = self.snapshot(state);
        let path = paths::status_path(self.storage.output_dir());
        if let Err(e) = status::write_status(&path, &snapshot) {
            tracing::warn!("status publish failed: {e}");
        }
    }

    fn snapshot(&self, state: DaemonState) -> StatusSnapshot {
        let disk_usage_percent = self
            .storage
            .disk_usage_percent()
            .map(status::round_tenth)
            .unwrap_or(-1.0);
        let disk_free_gb = self
            .storage
            .disk_free_gb()
            .map(status::round_hundredth)
            .unwrap_or(-1.0);
        StatusSnapshot {
            daemon: state,
            camera: self.camera_name.to_string(),
            last_capture: self.last_capture.clone(),
            last_capture_success: self.last_capture_success,
            consecutive_failures: self.consecutive_failures,
            captures_today: self.captures_today,
            disk_usage_percent,
            disk_free_gb,
            uptime_seconds: status::round_tenth(self.started.elapsed().as_secs_f64()),
            config_loaded: self
                .config_path
                .as_ref()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "defaults".to_string()),
        }
    }

    /// Drift-corrected wait: the configured interval is the period
    /// between cycle starts, so time spent capturing is subtracted.
    fn idle_until_next_cycle(&self, cycle_start: Instant) {
        let interval = Duration::from_secs(self.config.capture.interval_secs);
        let elapsed = cycle_start.elapsed();
        match interval.checked_sub(elapsed) {
            Some(remaining) => {
                self.idle_for(remaining);
            }
            None => {
                tracing::warn!(
                    elapsed = format_args!("{:.1}s", elapsed.as_secs_f64()),
                    interval_secs = self.config.capture.interval_secs,
                    "cycle overran the capture interval"
                );
            }
        }
    }

    /// Sleep in bounded slices, re-checking the shutdown flag each slice
    /// so a signal is honored with sub-second latency. Returns false if
    /// shutdown interrupted the wait.
    fn idle_for(&self, total: Duration) -> bool {
        let deadline = Instant::now().checked_add(total);
        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                return false;
            }
            let remaining = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return true;
                    }
                    deadline - now
                }
                None => WAIT_SLICE,
            };
            std::thread::sleep(remaining.min(WAIT_SLICE));
        }
    }

    #[cfg(test)]
    fn set_lock_path(&mut self, path: PathBuf) {
        self.lock_path = path;
    }
}

fn format_timestamp(now: NaiveDateTime) -> String {
    now.format("%Y-%m-%dT%H:%M:%S").to_string()
}

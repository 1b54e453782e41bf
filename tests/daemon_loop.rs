//! Integration tests for the capture loop: real control loop, stub camera
//!
//! These tests verify end-to-end daemon behavior:
//! - Captures land in the dated image tree and show up in status
//! - A shutdown request interrupts a long interval wait promptly
//! - Capture failures are counted and reported, and backoff does not
//!   delay shutdown
//!
//! The loop runs on its own thread and is observed only through the
//! published status file and the image tree, the way an operator would.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use timelapsed::status::{self, StatusSnapshot};
use timelapsed::{
    CameraBackend, CameraError, CaptureDaemon, Config, DaemonState, StorageManager, paths,
};

// =============================================================================
// Test Fixture
// =============================================================================

struct StubCamera {
    succeed: bool,
    attempts: Arc<AtomicU32>,
}

impl CameraBackend for StubCamera {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn open(&mut self) -> Result<(), CameraError> {
        Ok(())
    }

    fn capture(&mut self, output_path: &Path, _quality: u8) -> Result<bool, CameraError> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        if self.succeed {
            std::fs::write(output_path, b"jpeg")?;
        }
        Ok(self.succeed)
    }

    fn close(&mut self) {}

    fn is_available(&self) -> bool {
        true
    }
}

struct RunningDaemon {
    shutdown: Arc<AtomicBool>,
    attempts: Arc<AtomicU32>,
    handle: thread::JoinHandle<timelapsed::Result<()>>,
    status_file: PathBuf,
    output_dir: PathBuf,
}

fn spawn_daemon(root: &Path, interval_secs: u64, succeed: bool) -> RunningDaemon {
    let mut config = Config::default();
    config.capture.interval_secs = interval_secs;
    config.storage.output_dir = root.join("images");
    // The test machine's real disk usage must not short-circuit capture.
    config.storage.stop_threshold = 100.0;
    config.storage.warn_threshold = 100.0;

    let storage = StorageManager::new(&config.storage);
    storage.ensure_output_dir().expect("create output root");
    let output_dir = config.storage.output_dir.clone();
    let status_file = paths::status_path(&output_dir);

    let shutdown = Arc::new(AtomicBool::new(false));
    let attempts = Arc::new(AtomicU32::new(0));
    let mut daemon = CaptureDaemon::new(
        config,
        None,
        Box::new(StubCamera {
            succeed,
            attempts: attempts.clone(),
        }),
        storage,
        shutdown.clone(),
        Arc::new(AtomicBool::new(false)),
    );
    let handle = thread::spawn(move || daemon.run());

    RunningDaemon {
        shutdown,
        attempts,
        handle,
        status_file,
        output_dir,
    }
}

fn wait_for_status(
    path: &Path,
    what: &str,
    predicate: impl Fn(&StatusSnapshot) -> bool,
) -> StatusSnapshot {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        if let Some(snapshot) = status::read_status(path)
            && predicate(&snapshot)
        {
            return snapshot;
        }
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(50));
    }
}

fn captured_images(root: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.extension().is_some_and(|ext| ext == "jpg") {
                found.push(path);
            }
        }
    }
    found
}

// =============================================================================
// Tests
// =============================================================================

#[test]
fn captures_land_in_dated_tree_and_shutdown_interrupts_the_wait() {
    let dir = tempfile::tempdir().expect("tempdir");
    let daemon = spawn_daemon(dir.path(), 3600, true);

    let running = wait_for_status(&daemon.status_file, "first capture", |s| {
        s.daemon == DaemonState::Running
    });
    assert_eq!(running.camera, "stub");
    assert_eq!(running.captures_today, 1);
    assert_eq!(running.last_capture_success, Some(true));
    assert_eq!(running.consecutive_failures, 0);
    assert_eq!(running.config_loaded, "defaults");
    assert!(running.disk_usage_percent >= 0.0);

    let images = captured_images(&daemon.output_dir);
    assert_eq!(images.len(), 1);
    let relative = images[0]
        .strip_prefix(&daemon.output_dir)
        .expect("image inside output root");
    let components: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        components.len(),
        4,
        "expected YYYY/MM/DD/HHMMSS.jpg, got {relative:?}"
    );
    assert_eq!(components[0].len(), 4, "year directory");
    assert_eq!(components[1].len(), 2, "month directory");
    assert_eq!(components[2].len(), 2, "day directory");

    // The daemon is now an hour-long wait into its cycle; shutdown must
    // still land promptly.
    let asked = Instant::now();
    daemon.shutdown.store(true, Ordering::Relaxed);
    daemon
        .handle
        .join()
        .expect("daemon thread")
        .expect("clean run");
    assert!(asked.elapsed() < Duration::from_secs(2));

    let stopped = status::read_status(&daemon.status_file).expect("final status");
    assert_eq!(stopped.daemon, DaemonState::Stopped);
    assert_eq!(stopped.captures_today, 1);
}

#[test]
fn failed_captures_are_counted_and_backoff_yields_to_shutdown() {
    let dir = tempfile::tempdir().expect("tempdir");
    let daemon = spawn_daemon(dir.path(), 1, false);

    // Wait for the first attempt, which fails and puts the loop into a
    // ten-second backoff.
    let deadline = Instant::now() + Duration::from_secs(10);
    while daemon.attempts.load(Ordering::Relaxed) == 0 {
        assert!(
            Instant::now() < deadline,
            "timed out waiting for a capture attempt"
        );
        thread::sleep(Duration::from_millis(10));
    }

    let asked = Instant::now();
    daemon.shutdown.store(true, Ordering::Relaxed);
    daemon
        .handle
        .join()
        .expect("daemon thread")
        .expect("clean run");
    assert!(asked.elapsed() < Duration::from_secs(2), "backoff delayed shutdown");

    let stopped = status::read_status(&daemon.status_file).expect("final status");
    assert_eq!(stopped.daemon, DaemonState::Stopped);
    assert_eq!(stopped.consecutive_failures, 1);
    assert_eq!(stopped.last_capture_success, Some(false));
    assert_eq!(stopped.captures_today, 0);
    assert!(captured_images(&daemon.output_dir).is_empty());
}

//! Daemon bootstrap - config resolution, signal wiring, startup checks.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use crate::camera::detect_camera;
use crate::storage::StorageManager;
use crate::{Result, config, paths};

use super::CaptureDaemon;

/// Bring the daemon up and run it until a termination signal lands.
///
/// `config_path` comes from the command line. When it is absent the
/// well-known locations are searched, and when those are empty too the
/// daemon runs on built-in defaults rather than refusing to start.
pub fn run_daemon(config_path: Option<PathBuf>) -> Result<()> {
    let resolved = config_path.or_else(paths::find_config);
    let config = match &resolved {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading config");
            config::load(path)?
        }
        None => {
            tracing::warn!(
                searched = ?[paths::SYSTEM_CONFIG_PATH, paths::LOCAL_CONFIG_PATH],
                "no config file found, running on built-in defaults"
            );
            config::load_defaults()
        }
    };

    // Set up signal handling for graceful shutdown and live reload.
    let shutdown = Arc::new(AtomicBool::new(false));
    let reload = Arc::new(AtomicBool::new(false));
    let _ = signal_hook::flag::register(signal_hook::consts::SIGTERM, shutdown.clone());
    let _ = signal_hook::flag::register(signal_hook::consts::SIGINT, shutdown.clone());
    let _ = signal_hook::flag::register(signal_hook::consts::SIGHUP, reload.clone());

    // Startup faults are fatal: a daemon that cannot store images or see
    // a camera has nothing to retry against.
    let storage = StorageManager::new(&config.storage);
    storage.ensure_output_dir()?;

    let mut camera = detect_camera(&config.capture)?;
    camera.open()?;

    CaptureDaemon::new(config, resolved, camera, storage, shutdown, reload).run()
}

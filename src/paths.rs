//! Well-known filesystem locations for config, lock, and status artifacts.

use std::path::{Path, PathBuf};

/// System-wide config path, used when no `--config` override is given.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/timelapsed/timelapsed.toml";

/// Repo-local config path, checked after the system path.
pub const LOCAL_CONFIG_PATH: &str = "config/timelapsed.toml";

/// Advisory lock file guarding exclusive camera access across processes.
///
/// Any process that wants the physical camera (the daemon, a future
/// live-view reader) must flock this path first. The file itself is
/// never deleted; only the kernel lock state matters.
pub const CAMERA_LOCK_PATH: &str = "/tmp/timelapse-camera.lock";

/// Status artifact name, placed directly under the output root.
pub const STATUS_FILE_NAME: &str = ".status.json";

/// Locate a config file by the default search order.
///
/// Checks [`SYSTEM_CONFIG_PATH`] then [`LOCAL_CONFIG_PATH`]; `None` if
/// neither exists.
pub fn find_config() -> Option<PathBuf> {
    let system = PathBuf::from(SYSTEM_CONFIG_PATH);
    if system.exists() {
        return Some(system);
    }
    let local = PathBuf::from(LOCAL_CONFIG_PATH);
    if local.exists() {
        return Some(local);
    }
    None
}

/// Expand a leading `~` component to the user's home directory.
///
/// Paths without a leading `~` are returned unchanged.
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/tmp"));
    if rest.as_os_str().is_empty() {
        home
    } else {
        home.join(rest)
    }
}

/// Status file path for a given output root.
pub fn status_path(output_dir: &Path) -> PathBuf {
    output_dir.join(STATUS_FILE_NAME)
}

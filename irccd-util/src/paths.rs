//! XDG-compliant path helpers.
//!
//! Every path here is a default; the daemon and CLI both accept overrides
//! (spec §6.4 `--config`/`--path`), so nothing in this module is load-bearing
//! for correctness, only for convenience.

use directories::ProjectDirs;
use std::path::PathBuf;

const APP_NAME: &str = "irccd";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", APP_NAME)
}

/// Default TOML configuration file location.
pub fn config_file() -> PathBuf {
    project_dirs()
        .map(|p| p.config_dir().join("irccd.toml"))
        .unwrap_or_else(|| PathBuf::from("irccd.toml"))
}

/// Default runtime directory for the daemon's Unix socket and pid file.
pub fn runtime_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(dir).join(APP_NAME);
    }
    std::env::temp_dir().join(format!("{APP_NAME}-{}", unix_uid()))
}

/// Default Unix-domain control socket path.
pub fn default_unix_socket_path() -> PathBuf {
    runtime_dir().join("irccd.sock")
}

/// Default log directory.
pub fn log_dir() -> PathBuf {
    project_dirs()
        .map(|p| p.state_dir().map(PathBuf::from).unwrap_or_else(|| p.cache_dir().to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Default pid file location.
pub fn pid_file() -> PathBuf {
    runtime_dir().join("irccd.pid")
}

#[cfg(unix)]
fn unix_uid() -> u32 {
    // SAFETY: getuid() has no preconditions and never fails.
    unsafe { libc::getuid() }
}

#[cfg(not(unix))]
fn unix_uid() -> u32 {
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_path_lives_under_runtime_dir() {
        assert!(default_unix_socket_path().starts_with(runtime_dir()));
    }

    #[test]
    fn config_file_has_toml_extension() {
        assert_eq!(config_file().extension().unwrap(), "toml");
    }
}

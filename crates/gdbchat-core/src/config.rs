//! Shared configuration for GDB Chat.
//!
//! Provides functions to locate the state directory and the files that live
//! outside of it.
//!
//! # Storage Structure
//!
//! ```text
//! ~/.gdbchat_settings.json   # {provider, model, apiKey}, mode 0600
//! ~/.gdbchat/
//! ├── logs/                  # One session log per uploaded executable
//! └── uploads/               # Uploaded executables
//! ```
//!
//! # Environment Variables
//!
//! - `GDBCHAT_STATE_DIR`: Override the base state directory
//! - `GDBCHAT_LOG_DIR`: Override the session log directory
//! - `GDBCHAT_UPLOAD_DIR`: Override the upload directory
//! - `GDBCHAT_SETTINGS_FILE`: Override the settings file path

use std::path::{Path, PathBuf};

use tracing::debug;

/// Environment variable for custom state directory.
pub const STATE_DIR_ENV: &str = "GDBCHAT_STATE_DIR";

/// Environment variable for custom log directory.
pub const LOG_DIR_ENV: &str = "GDBCHAT_LOG_DIR";

/// Environment variable for custom upload directory.
pub const UPLOAD_DIR_ENV: &str = "GDBCHAT_UPLOAD_DIR";

/// Environment variable for custom settings file.
pub const SETTINGS_FILE_ENV: &str = "GDBCHAT_SETTINGS_FILE";

/// Default state directory name under home.
const DEFAULT_STATE_DIR: &str = ".gdbchat";

/// Default settings file name under home.
const DEFAULT_SETTINGS_FILE: &str = ".gdbchat_settings.json";

const LOGS_SUBDIR: &str = "logs";
const UPLOADS_SUBDIR: &str = "uploads";

/// Expand `~` and `$VARS` in a user supplied path.
///
/// Falls back to the literal input when expansion fails.
pub fn expand_path(raw: &str) -> PathBuf {
    match shellexpand::full(raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(e) => {
            debug!(path = %raw, error = %e, "path expansion failed, using literal");
            PathBuf::from(raw)
        }
    }
}

fn env_path(var: &str) -> Option<PathBuf> {
    std::env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(|v| expand_path(&v))
}

fn home_or_cwd(name: &str) -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(name))
        .unwrap_or_else(|| PathBuf::from(name))
}

/// Get the GDB Chat state directory.
///
/// The state directory is determined by:
/// 1. `GDBCHAT_STATE_DIR` environment variable if set
/// 2. `~/.gdbchat` if home directory is available
/// 3. `.gdbchat` in current directory as fallback
pub fn state_dir() -> PathBuf {
    env_path(STATE_DIR_ENV).unwrap_or_else(|| home_or_cwd(DEFAULT_STATE_DIR))
}

/// Get the session logs directory.
///
/// Defaults to `~/.gdbchat/logs/` or `GDBCHAT_LOG_DIR` env var.
pub fn logs_dir() -> PathBuf {
    env_path(LOG_DIR_ENV).unwrap_or_else(|| state_dir().join(LOGS_SUBDIR))
}

/// Get the uploads directory.
///
/// Defaults to `~/.gdbchat/uploads/` or `GDBCHAT_UPLOAD_DIR` env var.
pub fn uploads_dir() -> PathBuf {
    env_path(UPLOAD_DIR_ENV).unwrap_or_else(|| state_dir().join(UPLOADS_SUBDIR))
}

/// Get the settings file path.
///
/// Lives directly in the home directory, not under the state directory.
pub fn settings_file() -> PathBuf {
    env_path(SETTINGS_FILE_ENV).unwrap_or_else(|| home_or_cwd(DEFAULT_SETTINGS_FILE))
}

/// Ensure the state, logs and uploads directories exist.
///
/// # Errors
/// Returns an error if any directory cannot be created.
pub fn ensure_all_dirs() -> std::io::Result<()> {
    std::fs::create_dir_all(state_dir())?;
    std::fs::create_dir_all(logs_dir())?;
    std::fs::create_dir_all(uploads_dir())?;
    Ok(())
}

/// Load `.env.local` from the state directory, then `.env.local` or `.env`
/// from the working directory. Existing environment variables win.
///
/// Returns the files that were loaded.
pub fn load_env_files() -> Vec<PathBuf> {
    let mut loaded = Vec::new();

    let state_env = state_dir().join(".env.local");
    if state_env.exists() && dotenvy::from_path(&state_env).is_ok() {
        loaded.push(state_env);
    }

    for name in [".env.local", ".env"] {
        let path = Path::new(name);
        if path.exists() && dotenvy::from_path(path).is_ok() {
            loaded.push(path.to_path_buf());
            break;
        }
    }

    loaded
}

#[cfg(test)]
mod tests {
    use super::*;

    // These tests avoid mutating environment variables, which are shared
    // across parallel tests. Path shapes are checked instead.

    #[test]
    fn test_state_dir_shape() {
        let dir = state_dir();
        assert!(dir.is_absolute() || dir.ends_with(".gdbchat"));
    }

    #[test]
    fn test_logs_dir_name() {
        let dir = logs_dir();
        assert!(dir.ends_with("logs") || dir.to_string_lossy().contains("logs"));
    }

    #[test]
    fn test_uploads_dir_name() {
        let dir = uploads_dir();
        assert!(dir.ends_with("uploads") || dir.to_string_lossy().contains("uploads"));
    }

    #[test]
    fn test_settings_file_name() {
        let file = settings_file();
        assert!(file.to_string_lossy().contains("settings"));
    }

    #[test]
    fn test_expand_path_literal() {
        assert_eq!(expand_path("/tmp/x"), PathBuf::from("/tmp/x"));
    }

    #[test]
    fn test_expand_path_home() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_path("~/bin"), home.join("bin"));
        }
    }
}

//! Persisted session settings.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::{debug, info, warn};

use gdbchat_models::Settings;

use crate::atomic::{atomic_write_json, read_json_optional};
use crate::error::Result;

/// Permission bits for the settings file; it holds a credential.
pub const SETTINGS_FILE_MODE: u32 = 0o600;

/// Settings backed by a single JSON file.
///
/// Reads take a shared lock and clone the snapshot. Updates write the file
/// atomically, re-read it, and swap the in-memory value under the write lock.
pub struct SettingsStore {
    path: PathBuf,
    current: RwLock<Settings>,
}

impl SettingsStore {
    /// Opens the store, loading the file if it exists.
    ///
    /// A missing file yields default settings; an unreadable one is an error.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let settings = match read_json_optional::<Settings>(&path)? {
            Some(s) => {
                debug!(path = %path.display(), provider = %s.provider, "loaded settings");
                s
            }
            None => {
                info!(path = %path.display(), "no settings file, using defaults");
                Settings::default()
            }
        };

        Ok(Self {
            path,
            current: RwLock::new(settings),
        })
    }

    /// Creates a store with an initial value and no file read.
    pub fn with_settings(path: impl AsRef<Path>, settings: Settings) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            current: RwLock::new(settings),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns a copy of the current settings.
    pub fn snapshot(&self) -> Settings {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Persists new settings, re-reads the file, and swaps the snapshot.
    pub fn update(&self, settings: Settings) -> Result<Settings> {
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        atomic_write_json(&self.path, &settings, Some(SETTINGS_FILE_MODE))?;

        let reread = match read_json_optional::<Settings>(&self.path)? {
            Some(s) => s,
            None => {
                warn!(path = %self.path.display(), "settings file vanished after write");
                settings
            }
        };

        info!(provider = %reread.provider, model = %reread.model, "settings updated");
        *guard = reread.clone();
        Ok(reread)
    }

    /// Re-reads the file, keeping the current value if it is missing.
    pub fn reload(&self) -> Result<Settings> {
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(s) = read_json_optional::<Settings>(&self.path)? {
            *guard = s;
        }
        Ok(guard.clone())
    }
}

impl std::fmt::Debug for SettingsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsStore")
            .field("path", &self.path)
            .field("current", &self.snapshot())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gdbchat_models::ProviderId;
    use tempfile::tempdir;

    #[test]
    fn test_open_missing_uses_defaults() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::open(dir.path().join("settings.json")).unwrap();
        assert_eq!(store.snapshot(), Settings::default());
    }

    #[test]
    fn test_update_persists_and_swaps() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::open(&path).unwrap();

        let new = Settings::for_provider(ProviderId::OpenRouter)
            .with_model("openai/gpt-4o")
            .with_api_key("or-key");
        let saved = store.update(new.clone()).unwrap();

        assert_eq!(saved, new);
        assert_eq!(store.snapshot(), new);

        let reopened = SettingsStore::open(&path).unwrap();
        assert_eq!(reopened.snapshot(), new);
    }

    #[cfg(unix)]
    #[test]
    fn test_update_writes_private_file() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::open(&path).unwrap();
        store.update(Settings::default().with_api_key("k")).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_open_corrupt_file_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(SettingsStore::open(&path).is_err());
    }

    #[test]
    fn test_reload_picks_up_external_edit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::open(&path).unwrap();

        std::fs::write(
            &path,
            r#"{"provider":"openai","model":"gpt-4o","apiKey":"x"}"#,
        )
        .unwrap();

        let reloaded = store.reload().unwrap();
        assert_eq!(reloaded.provider, ProviderId::OpenAi);
        assert_eq!(store.snapshot().provider, ProviderId::OpenAi);
    }
}

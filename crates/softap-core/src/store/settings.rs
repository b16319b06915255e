// ── Persisted runtime settings ──
//
// Small TOML file holding the settings that survive restarts: whether every
// device may join, and the auto-disable duration.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::fsutil::{atomic_write, read_optional};
use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub all_devices_allowed: bool,
    /// Seconds; 0 means never.
    pub auto_disable_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            all_devices_allowed: true,
            auto_disable_secs: 0,
        }
    }
}

impl Settings {
    pub fn auto_disable(&self) -> Duration {
        Duration::from_secs(self.auto_disable_secs)
    }
}

/// Lazily loaded settings file. A missing or unreadable file yields defaults.
pub struct SettingsStore {
    path: PathBuf,
    defaults: Settings,
    cache: Mutex<Option<Settings>>,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_defaults(path, Settings::default())
    }

    pub fn with_defaults(path: impl Into<PathBuf>, defaults: Settings) -> Self {
        Self {
            path: path.into(),
            defaults,
            cache: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn loaded(&self) -> MutexGuard<'_, Option<Settings>> {
        let mut guard = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.is_none() {
            *guard = Some(self.load());
        }
        guard
    }

    fn load(&self) -> Settings {
        let text = match read_optional(&self.path) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "cannot read settings, using defaults");
                return self.defaults;
            }
        };
        if text.trim().is_empty() {
            return self.defaults;
        }
        toml::from_str(&text).unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "malformed settings, using defaults");
            self.defaults
        })
    }

    pub fn get(&self) -> Settings {
        self.loaded().unwrap_or(self.defaults)
    }

    /// Apply `f` and persist. The cached value keeps the change even if the
    /// write fails.
    pub fn update(&self, f: impl FnOnce(&mut Settings)) -> Result<Settings, CoreError> {
        let mut guard = self.loaded();
        let mut settings = guard.unwrap_or(self.defaults);
        f(&mut settings);
        *guard = Some(settings);
        let text = toml::to_string(&settings).map_err(|e| CoreError::Settings {
            message: e.to_string(),
        })?;
        atomic_write(&self.path, text.as_bytes(), None)?;
        Ok(settings)
    }

    pub fn all_devices_allowed(&self) -> bool {
        self.get().all_devices_allowed
    }

    pub fn set_all_devices_allowed(&self, enabled: bool) -> Result<(), CoreError> {
        self.update(|s| s.all_devices_allowed = enabled).map(|_| ())
    }

    pub fn auto_disable(&self) -> Duration {
        self.get().auto_disable()
    }

    pub fn set_auto_disable(&self, duration: Duration) -> Result<(), CoreError> {
        self.update(|s| s.auto_disable_secs = duration.as_secs()).map(|_| ())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_allow_everyone() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.toml"));
        assert!(store.all_devices_allowed());
        assert_eq!(store.auto_disable(), Duration::ZERO);
    }

    #[test]
    fn updates_persist_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        let store = SettingsStore::new(&path);
        store.set_all_devices_allowed(false).unwrap();
        store.set_auto_disable(Duration::from_secs(600)).unwrap();

        let reloaded = SettingsStore::new(&path);
        assert!(!reloaded.all_devices_allowed());
        assert_eq!(reloaded.auto_disable(), Duration::from_secs(600));
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "all_devices_allowed = \"maybe\"").unwrap();
        assert!(SettingsStore::new(&path).all_devices_allowed());
    }
}

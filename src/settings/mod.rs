//! Persistent user settings backed by a JSON file.
//!
//! The document is read lazily on first access, merged over built-in defaults,
//! and rewritten atomically (temp file + rename) after every mutation. Read and
//! write failures are logged and never reach the caller.

pub mod model;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde_json::{Map, Value};

use crate::error::AppError;

pub use model::{IpListSetting, OverlayPosition, Settings, Update};

/// Thread-safe owner of the settings document.
pub struct SettingsStore {
    path: PathBuf,
    /// `None` until the first access reads the file.
    state: Mutex<Option<Settings>>,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of the document, reading the file on first call only.
    pub fn load(&self) -> Settings {
        self.loaded().as_ref().cloned().unwrap_or_default()
    }

    /// Value stored under `key`, or `default` if absent.
    pub fn get(&self, key: &str, default: Value) -> Value {
        self.with_settings(|s| s.field(key)).unwrap_or(default)
    }

    /// Replace `key` with `value` and persist the whole document.
    ///
    /// Known keys are type-checked; a mismatch is rejected without touching
    /// the document. Persistence failures are logged only.
    pub fn set(&self, key: &str, value: Value) -> Result<(), AppError> {
        let mut guard = self.loaded();
        let settings = guard.get_or_insert_with(Settings::default);
        let mut updated = settings.clone();
        updated.apply(key, value, Update::Replace)?;
        *settings = updated;
        tracing::debug!("Setting '{key}' updated");
        self.persist(settings);
        Ok(())
    }

    /// Write the current document to disk. No-op before the first load.
    pub fn save(&self) {
        let guard = self.lock();
        if let Some(settings) = guard.as_ref() {
            self.persist(settings);
        }
    }

    /// Blocked addresses, normalized and never empty.
    pub fn blocked_ips(&self) -> Vec<String> {
        self.with_settings(|s| s.blocked_ips.normalized())
    }

    /// Hotkey slots with a non-blank combo.
    pub fn hotkeys(&self) -> BTreeMap<String, String> {
        self.with_settings(|s| {
            s.hotkeys
                .iter()
                .filter(|(_, combo)| !combo.trim().is_empty())
                .map(|(slot, combo)| (slot.clone(), combo.clone()))
                .collect()
        })
    }

    pub fn sound_enabled(&self) -> bool {
        self.with_settings(|s| s.sound_enabled)
    }

    pub fn overlay_visible(&self) -> bool {
        self.with_settings(|s| s.overlay_visible)
    }

    pub fn auto_cleanup_on_exit(&self) -> bool {
        self.with_settings(|s| s.auto_cleanup_on_exit)
    }

    fn with_settings<R>(&self, f: impl FnOnce(&Settings) -> R) -> R {
        let mut guard = self.loaded();
        f(guard.get_or_insert_with(Settings::default))
    }

    fn lock(&self) -> MutexGuard<'_, Option<Settings>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Lock the state, reading the file if this is the first access.
    fn loaded(&self) -> MutexGuard<'_, Option<Settings>> {
        let mut guard = self.lock();
        if guard.is_none() {
            let mut settings = Settings::default();
            match read_document(&self.path) {
                Ok(Some(doc)) => settings.merge_document(doc),
                Ok(None) => tracing::debug!("No settings file at {}, using defaults", self.path.display()),
                Err(e) => tracing::warn!(
                    "Failed to load settings from {}: {e}. Using defaults.",
                    self.path.display()
                ),
            }
            tracing::debug!("Settings loaded from {}", self.path.display());
            *guard = Some(settings);
        }
        guard
    }

    fn persist(&self, settings: &Settings) {
        match write_atomic(&self.path, settings) {
            Ok(()) => tracing::debug!("Settings saved to {}", self.path.display()),
            Err(e) => tracing::error!("Failed to persist settings to {}: {e}", self.path.display()),
        }
    }
}

/// Read the settings file. `Ok(None)` when it does not exist.
fn read_document(path: &Path) -> Result<Option<Map<String, Value>>, AppError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(AppError::Config(format!("unreadable: {e}"))),
    };
    match serde_json::from_str::<Value>(&contents)? {
        Value::Object(map) => Ok(Some(map)),
        _ => Err(AppError::Config("expected a JSON object".into())),
    }
}

/// Serialize to a sibling `.tmp` file, then rename it over the target.
fn write_atomic(path: &Path, settings: &Settings) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Persist(e.to_string()))?;
        }
    }
    let json =
        serde_json::to_string_pretty(settings).map_err(|e| AppError::Persist(e.to_string()))?;
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, json).map_err(|e| AppError::Persist(e.to_string()))?;
    std::fs::rename(&tmp, path).map_err(|e| AppError::Persist(e.to_string()))?;
    Ok(())
}

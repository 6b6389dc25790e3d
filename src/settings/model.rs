//! Typed settings document and its per-field merge rules.
//!
//! The on-disk form is a flat JSON object. Known keys map onto typed fields;
//! anything else is carried verbatim in `extra` so a rewrite never drops keys
//! written by a newer or older build.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config;
use crate::error::AppError;

pub const KEY_HOTKEYS: &str = "hotkeys";
pub const KEY_BLOCKED_IPS: &str = "blocked_ips";
pub const KEY_SOUND_ENABLED: &str = "sound_enabled";
pub const KEY_OVERLAY_VISIBLE: &str = "overlay_visible";
pub const KEY_OVERLAY_POSITION: &str = "overlay_position";
pub const KEY_AUTO_CLEANUP: &str = "auto_cleanup_on_exit";

/// Screen position of the status overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayPosition {
    pub x: i64,
    pub y: i64,
}

impl Default for OverlayPosition {
    fn default() -> Self {
        Self { x: 10, y: 10 }
    }
}

/// Blocked addresses as written by the user: a list or a comma-separated string.
///
/// The raw form is kept so the file round-trips untouched; callers read the
/// cleaned-up list through [`IpListSetting::normalized`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IpListSetting {
    List(Vec<String>),
    Csv(String),
}

impl Default for IpListSetting {
    fn default() -> Self {
        IpListSetting::List(vec![config::DEFAULT_IP.to_string()])
    }
}

impl IpListSetting {
    /// Trimmed, non-empty entries. Never empty: falls back to the default address.
    pub fn normalized(&self) -> Vec<String> {
        let ips: Vec<String> = match self {
            IpListSetting::List(items) => items
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            IpListSetting::Csv(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        };
        if ips.is_empty() {
            vec![config::DEFAULT_IP.to_string()]
        } else {
            ips
        }
    }
}

/// The full settings document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settings {
    pub hotkeys: BTreeMap<String, String>,
    pub blocked_ips: IpListSetting,
    pub sound_enabled: bool,
    pub overlay_visible: bool,
    pub overlay_position: OverlayPosition,
    pub auto_cleanup_on_exit: bool,
    /// Keys this build does not know about.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Settings {
    fn default() -> Self {
        let mut hotkeys = BTreeMap::new();
        hotkeys.insert("primary".to_string(), "f9".to_string());
        hotkeys.insert("secondary".to_string(), "ctrl+alt+s".to_string());
        Self {
            hotkeys,
            blocked_ips: IpListSetting::default(),
            sound_enabled: true,
            overlay_visible: true,
            overlay_position: OverlayPosition::default(),
            auto_cleanup_on_exit: true,
            extra: Map::new(),
        }
    }
}

/// How a field update combines with the value already present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Update {
    /// Nested maps are merged entry by entry (file loaded over defaults).
    Merge,
    /// The value replaces the field wholesale (explicit `set`).
    Replace,
}

impl Settings {
    /// Merge a parsed document over `self`. Fields with the wrong shape are
    /// skipped with a warning and keep their current value.
    pub fn merge_document(&mut self, doc: Map<String, Value>) {
        for (key, value) in doc {
            if let Err(e) = self.apply(&key, value, Update::Merge) {
                tracing::warn!("Ignoring settings key '{key}': {e}");
            }
        }
    }

    /// Apply one key. Unknown keys are stored as-is.
    pub fn apply(&mut self, key: &str, value: Value, mode: Update) -> Result<(), AppError> {
        match key {
            KEY_HOTKEYS => {
                let Value::Object(map) = value else {
                    return Err(invalid(key, "an object of slot -> combo"));
                };
                if mode == Update::Replace {
                    self.hotkeys.clear();
                }
                for (slot, combo) in map {
                    match combo {
                        Value::String(s) => {
                            self.hotkeys.insert(slot, s);
                        }
                        other => {
                            tracing::warn!("Ignoring hotkey '{slot}': expected string, got {other}")
                        }
                    }
                }
            }
            KEY_BLOCKED_IPS => {
                self.blocked_ips = match value {
                    Value::String(s) => IpListSetting::Csv(s),
                    Value::Array(items) => IpListSetting::List(
                        items
                            .into_iter()
                            .filter_map(|item| match item {
                                Value::String(s) => Some(s),
                                Value::Number(n) => Some(n.to_string()),
                                _ => None,
                            })
                            .collect(),
                    ),
                    _ => return Err(invalid(key, "a list or comma-separated string")),
                };
            }
            KEY_SOUND_ENABLED => self.sound_enabled = expect_bool(key, &value)?,
            KEY_OVERLAY_VISIBLE => self.overlay_visible = expect_bool(key, &value)?,
            KEY_AUTO_CLEANUP => self.auto_cleanup_on_exit = expect_bool(key, &value)?,
            KEY_OVERLAY_POSITION => {
                let Value::Object(map) = value else {
                    return Err(invalid(key, "an object with integer x and y"));
                };
                let x = map.get("x").and_then(Value::as_i64);
                let y = map.get("y").and_then(Value::as_i64);
                match (mode, x, y) {
                    (_, Some(x), Some(y)) => self.overlay_position = OverlayPosition { x, y },
                    (Update::Merge, x, y) => {
                        if let Some(x) = x {
                            self.overlay_position.x = x;
                        }
                        if let Some(y) = y {
                            self.overlay_position.y = y;
                        }
                    }
                    (Update::Replace, _, _) => {
                        return Err(invalid(key, "an object with integer x and y"))
                    }
                }
            }
            _ => {
                let merged = match (mode, self.extra.remove(key), value) {
                    (Update::Merge, Some(Value::Object(base)), Value::Object(upd)) => {
                        Value::Object(merge_maps(base, upd))
                    }
                    (_, _, value) => value,
                };
                self.extra.insert(key.to_string(), merged);
            }
        }
        Ok(())
    }

    /// Current JSON value of a key, if present.
    pub fn field(&self, key: &str) -> Option<Value> {
        match key {
            KEY_HOTKEYS => serde_json::to_value(&self.hotkeys).ok(),
            KEY_BLOCKED_IPS => serde_json::to_value(&self.blocked_ips).ok(),
            KEY_SOUND_ENABLED => Some(Value::Bool(self.sound_enabled)),
            KEY_OVERLAY_VISIBLE => Some(Value::Bool(self.overlay_visible)),
            KEY_OVERLAY_POSITION => serde_json::to_value(self.overlay_position).ok(),
            KEY_AUTO_CLEANUP => Some(Value::Bool(self.auto_cleanup_on_exit)),
            _ => self.extra.get(key).cloned(),
        }
    }
}

/// Untyped recursive merge, used only for keys this build does not model.
fn merge_maps(mut base: Map<String, Value>, updates: Map<String, Value>) -> Map<String, Value> {
    for (key, value) in updates {
        let merged = match (base.remove(&key), value) {
            (Some(Value::Object(b)), Value::Object(u)) => Value::Object(merge_maps(b, u)),
            (_, v) => v,
        };
        base.insert(key, merged);
    }
    base
}

fn expect_bool(key: &str, value: &Value) -> Result<bool, AppError> {
    value.as_bool().ok_or_else(|| invalid(key, "a boolean"))
}

fn invalid(key: &str, expected: &str) -> AppError {
    AppError::InvalidInput(format!("'{key}' must be {expected}"))
}

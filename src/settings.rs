use std::mem::discriminant;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StorageError;
use crate::storage::KvStore;

/// User-facing flags persisted across sessions.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Echo render results to the console as well as the page.
    pub echo_to_console: bool,
    /// Input and output areas side by side instead of stacked.
    pub side_by_side: bool,
    /// Output before input.
    pub swap_in_out: bool,
    /// Let the SVG scale to its container instead of sizing the container
    /// to the SVG.
    pub render_auto_scale: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            echo_to_console: false,
            side_by_side: true,
            swap_in_out: true,
            render_auto_scale: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettingFlag {
    EchoToConsole,
    SideBySide,
    SwapInOut,
    RenderAutoScale,
}

impl SettingFlag {
    pub const ALL: [SettingFlag; 4] = [
        SettingFlag::SideBySide,
        SettingFlag::SwapInOut,
        SettingFlag::RenderAutoScale,
        SettingFlag::EchoToConsole,
    ];

    pub fn key(self) -> &'static str {
        match self {
            SettingFlag::EchoToConsole => "echoToConsole",
            SettingFlag::SideBySide => "sideBySide",
            SettingFlag::SwapInOut => "swapInOut",
            SettingFlag::RenderAutoScale => "renderAutoScale",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SettingFlag::EchoToConsole => "Echo results to console",
            SettingFlag::SideBySide => "Side-by-side",
            SettingFlag::SwapInOut => "Swap in/out",
            SettingFlag::RenderAutoScale => "Auto-scale SVG",
        }
    }
}

impl Settings {
    pub fn flag(&self, flag: SettingFlag) -> bool {
        match flag {
            SettingFlag::EchoToConsole => self.echo_to_console,
            SettingFlag::SideBySide => self.side_by_side,
            SettingFlag::SwapInOut => self.swap_in_out,
            SettingFlag::RenderAutoScale => self.render_auto_scale,
        }
    }

    pub fn set_flag(&mut self, flag: SettingFlag, value: bool) {
        let slot = match flag {
            SettingFlag::EchoToConsole => &mut self.echo_to_console,
            SettingFlag::SideBySide => &mut self.side_by_side,
            SettingFlag::SwapInOut => &mut self.swap_in_out,
            SettingFlag::RenderAutoScale => &mut self.render_auto_scale,
        };
        *slot = value;
    }

    /// Copies values from a persisted object for keys these settings already
    /// have, when the JSON type matches. Everything else is ignored.
    pub fn merge_persisted(&mut self, persisted: &Value) {
        let Value::Object(incoming) = persisted else {
            return;
        };
        let Ok(Value::Object(mut current)) = serde_json::to_value(&*self) else {
            return;
        };
        for (key, slot) in current.iter_mut() {
            if let Some(value) = incoming.get(key) {
                if discriminant(slot) == discriminant(value) {
                    *slot = value.clone();
                }
            }
        }
        if let Ok(merged) = serde_json::from_value(Value::Object(current)) {
            *self = merged;
        }
    }
}

/// Persists [`Settings`] as one JSON object under a single key.
pub struct SettingsStore {
    kv: KvStore,
    key: String,
}

impl SettingsStore {
    pub fn new(kv: KvStore, key: &str) -> Self {
        Self {
            kv,
            key: key.to_string(),
        }
    }

    pub fn load(&self) -> Settings {
        let mut settings = Settings::default();
        settings.merge_persisted(&self.kv.get_json(&self.key, Value::Null));
        settings
    }

    pub fn save(&self, settings: &Settings) -> Result<(), StorageError> {
        self.kv.set_json(&self.key, settings)
    }

    pub fn kv(&self) -> &KvStore {
        &self.kv
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use serde_json::json;

    #[test]
    fn merge_ignores_unknown_and_mistyped_keys() {
        let mut settings = Settings::default();
        settings.merge_persisted(&json!({
            "renderAutoScale": true,
            "sideBySide": "no",
            "removedLongAgo": 3
        }));
        assert!(settings.render_auto_scale);
        assert!(settings.side_by_side);
        assert!(!settings.echo_to_console);
    }

    #[test]
    fn merge_of_non_object_is_noop() {
        let mut settings = Settings::default();
        settings.merge_persisted(&json!([true, false]));
        settings.merge_persisted(&Value::Null);
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn flags_map_to_fields() {
        let mut settings = Settings::default();
        for flag in SettingFlag::ALL {
            let before = settings.flag(flag);
            settings.set_flag(flag, !before);
            assert_eq!(settings.flag(flag), !before);
        }
        let encoded = serde_json::to_value(&settings).unwrap();
        for flag in SettingFlag::ALL {
            assert_eq!(encoded[flag.key()], json!(settings.flag(flag)));
        }
    }

    #[test]
    fn store_round_trip() {
        let backend = MemoryStorage::new();
        let store = SettingsStore::new(KvStore::new(Box::new(backend.clone()), "/fiddle"), "config");
        assert_eq!(store.load(), Settings::default());

        let mut settings = store.load();
        settings.swap_in_out = false;
        store.save(&settings).unwrap();

        let reopened =
            SettingsStore::new(KvStore::new(Box::new(backend), "/fiddle"), "config");
        assert!(!reopened.load().swap_in_out);
        assert!(reopened.kv().contains("config"));
    }
}

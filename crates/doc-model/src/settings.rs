//! Open, string-keyed settings map with typed accessors for the known keys.
//!
//! The persisted shape is a single JSON object. Keys this build does not
//! know about are carried through untouched so older and newer app versions
//! can share the same settings entry.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const DARK_MODE: &str = "darkMode";
pub const AUTO_OCR: &str = "autoOCR";
pub const OCR_LANGUAGE: &str = "ocrLanguage";
pub const NOTIFICATIONS: &str = "notifications";
pub const AUTO_SAVE: &str = "autoSave";
pub const OFFLINE_MODE: &str = "offlineMode";

const DEFAULT_OCR_LANGUAGE: &str = "eng";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings {
    values: BTreeMap<String, Value>,
}

impl Default for Settings {
    fn default() -> Self {
        let values = BTreeMap::from([
            (DARK_MODE.to_owned(), Value::Bool(false)),
            (AUTO_OCR.to_owned(), Value::Bool(false)),
            (OCR_LANGUAGE.to_owned(), Value::String(DEFAULT_OCR_LANGUAGE.to_owned())),
            (NOTIFICATIONS.to_owned(), Value::Bool(true)),
            (AUTO_SAVE.to_owned(), Value::Bool(true)),
            (OFFLINE_MODE.to_owned(), Value::Bool(false)),
        ]);
        Self { values }
    }
}

impl Settings {
    /// A map with no keys at all, not even defaults.
    pub fn empty() -> Self {
        Self { values: BTreeMap::new() }
    }

    /// Defaults with `stored` laid over them.
    pub fn with_overrides(stored: Settings) -> Self {
        let mut settings = Self::default();
        settings.values.extend(stored.values);
        settings
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Boolean value of `key`, or `default` when missing or not a boolean.
    pub fn bool_or(&self, key: &str, default: bool) -> bool {
        self.values.get(key).and_then(Value::as_bool).unwrap_or(default)
    }

    /// String value of `key`, or `default` when missing or not a string.
    pub fn str_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.values.get(key).and_then(Value::as_str).unwrap_or(default)
    }

    pub fn dark_mode(&self) -> bool {
        self.bool_or(DARK_MODE, false)
    }

    pub fn auto_ocr(&self) -> bool {
        self.bool_or(AUTO_OCR, false)
    }

    pub fn ocr_language(&self) -> &str {
        self.str_or(OCR_LANGUAGE, DEFAULT_OCR_LANGUAGE)
    }

    pub fn notifications(&self) -> bool {
        self.bool_or(NOTIFICATIONS, true)
    }

    pub fn auto_save(&self) -> bool {
        self.bool_or(AUTO_SAVE, true)
    }

    pub fn offline_mode(&self) -> bool {
        self.bool_or(OFFLINE_MODE, false)
    }
}

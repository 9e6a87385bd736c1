//! Boundary to persisted user preferences.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;

/// Preference key holding the reader-mode style dictionary
pub const READER_MODE_STYLE_KEY: &str = "readermode.style";

/// Read access to the user's preferences
pub trait Preferences: Send + Sync {
    /// Raw reader-mode style dictionary, if the user ever saved one
    fn reader_mode_style(&self) -> Option<Value>;
}

/// In-process preference store
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    values: RwLock<HashMap<String, Value>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: &str, value: Value) {
        if let Ok(mut values) = self.values.write() {
            values.insert(key.to_string(), value);
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.read().ok()?.get(key).cloned()
    }
}

impl Preferences for MemoryPreferences {
    fn reader_mode_style(&self) -> Option<Value> {
        self.get(READER_MODE_STYLE_KEY)
    }
}

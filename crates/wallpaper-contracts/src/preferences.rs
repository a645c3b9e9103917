use serde_json::Value;

use crate::settings::Language;
use crate::store::KeyValueStore;

pub const LANGUAGE_KEY: &str = "language";

/// Stored language preference; missing or unrecognized values read as `None`.
pub fn load_language(store: &dyn KeyValueStore) -> Option<Language> {
    store
        .get(LANGUAGE_KEY)
        .as_ref()
        .and_then(Value::as_str)
        .and_then(|code| code.parse().ok())
}

pub fn save_language(store: &dyn KeyValueStore, language: Language) {
    if let Err(err) = store.set(LANGUAGE_KEY, Value::String(language.code().to_string())) {
        tracing::warn!(error = %err, "failed to persist language preference");
    }
}

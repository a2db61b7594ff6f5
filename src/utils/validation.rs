// Validation utilities over loose step configs
// Author: Gabriel Demetrios Lafis

use serde_json::Value as JsonValue;

/// Config keys that hold a single input record-set name
const SOURCE_KEYS: &[&str] = &["source", "left", "right", "from"];

/// Required keys missing from `config` (absent or null)
pub fn missing_fields<'a>(config: &JsonValue, required: &[&'a str]) -> Vec<&'a str> {
    required
        .iter()
        .copied()
        .filter(|key| config.get(key).map_or(true, JsonValue::is_null))
        .collect()
}

/// A string-valued config entry
pub fn config_str<'a>(config: &'a JsonValue, key: &str) -> Option<&'a str> {
    config.get(key).and_then(JsonValue::as_str)
}

/// Input record-set names referenced by a loose config
pub fn referenced_sources(config: &JsonValue) -> Vec<String> {
    let mut names: Vec<String> = SOURCE_KEYS
        .iter()
        .filter_map(|key| config_str(config, key))
        .map(str::to_string)
        .collect();

    if let Some(sources) = config.get("sources").and_then(JsonValue::as_array) {
        names.extend(sources.iter().filter_map(JsonValue::as_str).map(str::to_string));
    }

    names
}

/// Validate that a string is not empty or whitespace
pub fn validate_not_blank(value: &str, name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("'{}' cannot be empty", name))
    } else {
        Ok(())
    }
}

//! Default value functions for configuration.
//!
//! Free functions used as `#[serde(default = "crate::defaults::...")]`
//! attributes on settings and script fields.

/// Generic `true` default for boolean fields.
pub fn bool_true() -> bool {
    true
}

/// Default runner program for sandboxed scripts.
pub fn sandbox_program() -> String {
    "python3".to_string()
}

/// Chat-scope variable poll period in milliseconds.
pub fn poll_interval_ms() -> u64 {
    2000
}

/// Window during which a UI-originated chat variable write suppresses its
/// own poll-detected change, in milliseconds.
pub fn processed_suppression_ms() -> u64 {
    3000
}

/// Minimum interval between garbage-collection passes over expired
/// processed-name records, in milliseconds.
pub fn processed_gc_ms() -> u64 {
    30_000
}

/// Empty JSON object for variable documents.
pub fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

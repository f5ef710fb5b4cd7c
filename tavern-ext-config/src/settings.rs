//! Extension-wide persisted settings.
//!
//! This is the document the host stores under the extension's settings key.
//! It carries the global script list, the per-character allow-list, both
//! master enable flags, the sandbox runner command, variable-sync tuning,
//! and the global-scope variable document.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::script::Script;

/// Command used to execute a synthesized script document.
///
/// The document path is appended after `args`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxRunner {
    /// Runner program (default: python3)
    #[serde(default = "crate::defaults::sandbox_program")]
    pub program: String,

    /// Arguments placed before the document path.
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for SandboxRunner {
    fn default() -> Self {
        Self {
            program: crate::defaults::sandbox_program(),
            args: Vec::new(),
        }
    }
}

/// Tuning for the variable sync service.
///
/// The chat scope has no host change event, so it is polled; these values
/// were tuned against observed host event latency and are persisted rather
/// than hardcoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncTuning {
    /// Chat-scope poll period in milliseconds.
    #[serde(default = "crate::defaults::poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Self-write suppression window in milliseconds.
    #[serde(default = "crate::defaults::processed_suppression_ms")]
    pub processed_suppression_ms: u64,

    /// Minimum interval between processed-record GC passes, in milliseconds.
    #[serde(default = "crate::defaults::processed_gc_ms")]
    pub processed_gc_ms: u64,
}

impl Default for SyncTuning {
    fn default() -> Self {
        Self {
            poll_interval_ms: crate::defaults::poll_interval_ms(),
            processed_suppression_ms: crate::defaults::processed_suppression_ms(),
            processed_gc_ms: crate::defaults::processed_gc_ms(),
        }
    }
}

impl SyncTuning {
    /// Poll period as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Suppression window as a [`Duration`].
    pub fn processed_suppression(&self) -> Duration {
        Duration::from_millis(self.processed_suppression_ms)
    }

    /// GC interval as a [`Duration`].
    pub fn processed_gc(&self) -> Duration {
        Duration::from_millis(self.processed_gc_ms)
    }
}

/// The persisted settings document for the extension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtensionSettings {
    /// Extension-wide kill switch; when false nothing runs.
    #[serde(default = "crate::defaults::bool_true")]
    pub enabled: bool,

    /// Master flag gating every global-scope script.
    #[serde(default = "crate::defaults::bool_true")]
    pub global_scripts_enabled: bool,

    /// Global script records.
    #[serde(default)]
    pub global_scripts: Vec<Script>,

    /// Character identifiers whose embedded scripts are allowed to run.
    #[serde(default)]
    pub characters_with_scripts: Vec<String>,

    /// Sandbox runner command.
    #[serde(default)]
    pub runner: SandboxRunner,

    /// Variable sync tuning.
    #[serde(default)]
    pub sync: SyncTuning,

    /// Global-scope variable document (always a JSON object).
    #[serde(default = "crate::defaults::empty_object")]
    pub variables: serde_json::Value,
}

impl Default for ExtensionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            global_scripts_enabled: true,
            global_scripts: Vec::new(),
            characters_with_scripts: Vec::new(),
            runner: SandboxRunner::default(),
            sync: SyncTuning::default(),
            variables: crate::defaults::empty_object(),
        }
    }
}

impl ExtensionSettings {
    /// Whether the given character's embedded scripts are allowed to run.
    pub fn character_allowed(&self, character_id: &str) -> bool {
        self.characters_with_scripts.iter().any(|c| c == character_id)
    }

    /// Add or remove a character from the scripts allow-list.
    ///
    /// Returns whether the list changed.
    pub fn set_character_allowed(&mut self, character_id: &str, allowed: bool) -> bool {
        let present = self.character_allowed(character_id);
        if allowed && !present {
            self.characters_with_scripts.push(character_id.to_string());
            true
        } else if !allowed && present {
            self.characters_with_scripts.retain(|c| c != character_id);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_round_trip_from_empty_document() {
        let settings: ExtensionSettings = serde_json::from_str("{}").unwrap();
        assert!(settings.enabled);
        assert!(settings.global_scripts_enabled);
        assert!(settings.global_scripts.is_empty());
        assert_eq!(settings.runner.program, "python3");
        assert_eq!(settings.sync.poll_interval_ms, 2000);
        assert_eq!(settings.sync.processed_suppression_ms, 3000);
        assert_eq!(settings.sync.processed_gc_ms, 30_000);
        assert!(settings.variables.is_object());
    }

    #[test]
    fn test_allow_list_add_remove() {
        let mut settings = ExtensionSettings::default();
        assert!(!settings.character_allowed("alice.png"));

        assert!(settings.set_character_allowed("alice.png", true));
        assert!(settings.character_allowed("alice.png"));
        // Second add is a no-op, no duplicates.
        assert!(!settings.set_character_allowed("alice.png", true));
        assert_eq!(settings.characters_with_scripts.len(), 1);

        assert!(settings.set_character_allowed("alice.png", false));
        assert!(!settings.character_allowed("alice.png"));
    }
}

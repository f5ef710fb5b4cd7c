//! JSON bridge protocol between the extension and script subprocesses.
//!
//! Scripts read [`BridgeEvent`] objects from stdin (one JSON object per
//! line) and write [`BridgeCommand`] objects to stdout (one JSON object per
//! line). Both unions carry a discriminant field so script-side dispatch is
//! a single dictionary lookup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An event sent from the extension to a script subprocess (via stdin).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind")]
pub enum BridgeEvent {
    /// One of the script's declared UI buttons was clicked.
    ButtonClicked {
        /// Button name as declared in the script record.
        button: String,
    },

    /// The active chat switched.
    ChatChanged {
        /// Identifier of the now-active character.
        character_id: Option<String>,
    },

    /// A variable scope's document changed.
    VariablesChanged {
        /// Scope name ("global", "character", "chat", "message").
        scope: String,
        /// The fresh document.
        variables: serde_json::Value,
    },

    /// Extension-level event forwarded by name, including the
    /// `{script_id}_{button}` events scripts exchange with the UI.
    Custom {
        /// Event name.
        name: String,
        /// Arbitrary event fields.
        #[serde(default)]
        fields: HashMap<String, serde_json::Value>,
    },
}

/// A command sent from a script subprocess to the extension (via stdout).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum BridgeCommand {
    /// Log a message through the extension's logger.
    Log {
        /// Log level ("trace", "debug", "info", "warn", "error").
        level: String,
        /// Log message.
        message: String,
    },

    /// Show a notification toast.
    Notify {
        /// Toast level ("info", "success", "warning", "error").
        level: String,
        /// Toast body.
        message: String,
    },

    /// Merge a single variable into a scope.
    SetVariable {
        /// Target scope name.
        scope: String,
        /// Variable name.
        name: String,
        /// Variable value.
        value: serde_json::Value,
    },

    /// Emit a named event on the extension bus.
    EmitEvent {
        /// Event name.
        name: String,
        /// Arbitrary event fields.
        #[serde(default)]
        fields: HashMap<String, serde_json::Value>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_shape() {
        let event = BridgeEvent::ButtonClicked {
            button: "roll".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"kind":"ButtonClicked","button":"roll"}"#);
    }

    #[test]
    fn test_event_round_trip() {
        let event = BridgeEvent::VariablesChanged {
            scope: "chat".to_string(),
            variables: serde_json::json!({"counter": 1}),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: BridgeEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_command_parses_from_script_output() {
        let line = r#"{"type":"SetVariable","scope":"chat","name":"hp","value":10}"#;
        let cmd: BridgeCommand = serde_json::from_str(line).unwrap();
        assert_eq!(
            cmd,
            BridgeCommand::SetVariable {
                scope: "chat".to_string(),
                name: "hp".to_string(),
                value: serde_json::json!(10),
            }
        );
    }

    #[test]
    fn test_emit_event_fields_default_empty() {
        let line = r#"{"type":"EmitEvent","name":"abc_roll"}"#;
        let cmd: BridgeCommand = serde_json::from_str(line).unwrap();
        match cmd {
            BridgeCommand::EmitEvent { name, fields } => {
                assert_eq!(name, "abc_roll");
                assert!(fields.is_empty());
            }
            other => panic!("expected EmitEvent, got: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_command_type_is_rejected() {
        let line = r#"{"type":"FormatDisk"}"#;
        assert!(serde_json::from_str::<BridgeCommand>(line).is_err());
    }
}

//! Built-in script catalog.
//!
//! Unlike user scripts (random ids), catalog entries carry deterministic
//! ids so re-instantiating the library upserts instead of duplicating.

use crate::script::{Script, ScriptButton};

/// Catalog id for the variable inspector script.
pub const VARIABLE_INSPECTOR_ID: &str = "6f1c2a54-9c1e-4f0b-8d2a-0f3b5f8f0001";

/// Catalog id for the greeting responder script.
pub const GREETING_RESPONDER_ID: &str = "6f1c2a54-9c1e-4f0b-8d2a-0f3b5f8f0002";

/// The default script library shipped with the extension.
///
/// Entries come back disabled; enabling is always a user decision.
pub fn builtin_scripts() -> Vec<Script> {
    vec![
        Script {
            id: VARIABLE_INSPECTOR_ID.to_string(),
            name: "Variable Inspector".to_string(),
            content: r#"def _dump(event):
    log("info", "variables changed in scope " + event["scope"])

on_event("VariablesChanged", _dump)

def _show(event):
    notify("info", "inspector ready")

on_button("Inspect", _show)
"#
            .to_string(),
            info: "https://example.com/tavern-ext/docs/variable-inspector".to_string(),
            enabled: false,
            buttons: vec![ScriptButton {
                name: "Inspect".to_string(),
                visible: true,
            }],
        },
        Script {
            id: GREETING_RESPONDER_ID.to_string(),
            name: "Greeting Responder".to_string(),
            content: r#"def _greet(event):
    set_variable("chat", "greeted", True)
    log("info", "greeted " + str(event.get("character_id")))

on_event("ChatChanged", _greet)
"#
            .to_string(),
            info: "Marks the chat as greeted whenever it is switched to.".to_string(),
            enabled: false,
            buttons: Vec::new(),
        },
    ]
}

//! Extension event bus.
//!
//! A typed broadcast channel decoupling the UI layer from the orchestrator:
//! user actions go on the bus as events, the orchestrator reacts, and
//! `UiRefresh` notifications flow back. Script-authored events (including
//! button clicks, keyed `{script_id}_{button}`) travel as [`ExtEvent::Custom`].

use std::collections::HashMap;

use tavern_ext_config::{Script, ScriptScope};
use tokio::sync::broadcast;

/// What a `UiRefresh` notification is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiRefreshAction {
    /// A script was toggled on or off.
    ScriptToggled,
    /// A scope master flag was toggled.
    TypeToggled,
    /// A script was imported.
    ScriptImported,
    /// A script was created or edited.
    ScriptSaved,
    /// A script was deleted.
    ScriptDeleted,
    /// A script moved between scopes.
    ScriptMoved,
    /// Scripts were reordered within a scope.
    ScriptsReordered,
    /// The character's script list must be re-read.
    RefreshCharacterScripts,
    /// The built-in catalog was instantiated.
    LoadDefaultScripts,
}

/// Events on the extension bus.
#[derive(Debug, Clone)]
pub enum ExtEvent {
    /// Request: toggle one script.
    ScriptToggle {
        /// The script being toggled.
        script: Script,
        /// Which collection owns it.
        scope: ScriptScope,
        /// Desired enablement.
        enable: bool,
        /// Whether this came from a user action (persists the flag).
        user_input: bool,
    },

    /// Request: toggle a scope's master flag.
    TypeToggle {
        /// Affected scope.
        scope: ScriptScope,
        /// Desired state.
        enable: bool,
        /// Whether this came from a user action.
        user_input: bool,
    },

    /// Request: import a script file.
    ScriptImport {
        /// Original file name, for messages.
        file_name: String,
        /// Raw file text.
        content: String,
        /// Target collection.
        scope: ScriptScope,
    },

    /// Request: delete a script (with confirmation).
    ScriptDelete {
        /// Script id.
        script_id: String,
        /// Owning collection.
        scope: ScriptScope,
    },

    /// Request: create or update a script.
    ScriptSave {
        /// The record to upsert.
        script: Script,
        /// Owning collection.
        scope: ScriptScope,
    },

    /// Request: move a script to the other collection.
    ScriptMove {
        /// The script to move.
        script: Script,
        /// The collection it currently lives in.
        from_scope: ScriptScope,
    },

    /// Notification: render this script's buttons.
    ButtonAdd {
        /// The script whose buttons to render.
        script: Script,
    },

    /// Notification: remove this script's buttons.
    ButtonRemove {
        /// Script id.
        script_id: String,
    },

    /// Notification: re-render after a state change.
    UiRefresh {
        /// What changed.
        action: UiRefreshAction,
    },

    /// Fired once after the initial render; triggers the first auto-run
    /// pass over already-enabled scripts.
    UiLoaded,

    /// A dynamically named event: button clicks (named
    /// [`button_event_key`]) and script-emitted events.
    Custom {
        /// Event name.
        name: String,
        /// Arbitrary fields.
        fields: HashMap<String, serde_json::Value>,
    },
}

/// Bus event name for a script button: `{script_id}_{button}`.
pub fn button_event_key(script_id: &str, button: &str) -> String {
    format!("{script_id}_{button}")
}

/// Typed broadcast bus.
///
/// Lossy by design: a lagging receiver drops old events rather than
/// blocking emitters.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ExtEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

impl EventBus {
    /// Create a bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit an event; never blocks.
    pub fn emit(&self, event: ExtEvent) {
        if self.tx.send(event).is_err() {
            log::trace!("bus event dropped: no subscribers");
        }
    }

    /// Subscribe to all subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ExtEvent> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_button_event_key_format() {
        assert_eq!(button_event_key("abc", "roll"), "abc_roll");
    }

    #[test]
    fn test_emit_reaches_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        bus.emit(ExtEvent::UiLoaded);
        assert!(matches!(rx.try_recv(), Ok(ExtEvent::UiLoaded)));
    }

    #[test]
    fn test_emit_without_subscribers_is_silent() {
        let bus = EventBus::default();
        bus.emit(ExtEvent::UiLoaded);
    }
}

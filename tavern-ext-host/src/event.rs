//! Host event vocabulary.
//!
//! These are the change notifications the host already emits for its own
//! purposes; the extension subscribes rather than asking the host for new
//! hooks. Note the absence of a chat-metadata change event — that store is
//! polled by the sync service.

/// Severity of a notification toast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyLevel {
    /// Informational.
    Info,
    /// Operation completed.
    Success,
    /// Something degraded but recoverable.
    Warning,
    /// Operation failed.
    Error,
}

impl std::fmt::Display for NotifyLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotifyLevel::Info => write!(f, "info"),
            NotifyLevel::Success => write!(f, "success"),
            NotifyLevel::Warning => write!(f, "warning"),
            NotifyLevel::Error => write!(f, "error"),
        }
    }
}

/// A lifecycle or change notification from the host.
#[derive(Debug, Clone)]
pub enum HostEvent {
    /// The active chat switched (possibly to no chat at all).
    ChatChanged {
        /// Identifier of the now-active character.
        character_id: Option<String>,
    },

    /// A character was deleted from the host's roster.
    CharacterDeleted {
        /// Identifier of the deleted character.
        character_id: String,
    },

    /// The extension settings document was overwritten.
    ///
    /// Also covers global-scope variable changes, which live inside that
    /// document.
    SettingsUpdated,

    /// The character-scope variable document changed.
    CharacterVariablesChanged {
        /// Fresh document when the emitter had it on hand; subscribers
        /// re-fetch otherwise.
        variables: Option<serde_json::Value>,
    },

    /// A message's variable payload changed.
    MessageVariablesChanged {
        /// Index of the affected message.
        message_index: usize,
        /// Fresh document when the emitter had it on hand.
        variables: Option<serde_json::Value>,
    },
}

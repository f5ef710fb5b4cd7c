//! Variable scope identity.

use serde::{Deserialize, Serialize};

/// One of the four variable scopes, each backed by a distinct host store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VarScope {
    /// Extension-wide settings document.
    Global,
    /// The active character's record.
    Character,
    /// The active chat's metadata (poll-monitored; no host change event).
    Chat,
    /// A payload on one message, addressed by index.
    Message,
}

impl VarScope {
    /// All scopes, in UI tab order.
    pub const ALL: [VarScope; 4] = [
        VarScope::Global,
        VarScope::Character,
        VarScope::Chat,
        VarScope::Message,
    ];

    /// Stable lowercase name, as used in the bridge protocol.
    pub fn name(self) -> &'static str {
        match self {
            VarScope::Global => "global",
            VarScope::Character => "character",
            VarScope::Chat => "chat",
            VarScope::Message => "message",
        }
    }

    /// Parse a scope name; `None` for anything unknown.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "global" => Some(VarScope::Global),
            "character" => Some(VarScope::Character),
            "chat" => Some(VarScope::Chat),
            "message" => Some(VarScope::Message),
            _ => None,
        }
    }
}

impl std::fmt::Display for VarScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

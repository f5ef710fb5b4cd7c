//! Host contract for the tavern-ext automation layer.
//!
//! The extension has no storage or UI of its own: everything persisted goes
//! through the embedding chat host, and every background change arrives as a
//! host event. This crate defines that seam — the [`TavernHost`] trait, the
//! [`HostEvent`] vocabulary — plus [`MemoryHost`], a complete in-memory
//! implementation used by tests and by embedders that manage persistence
//! themselves.

pub mod debounce;
pub mod error;
pub mod event;
pub mod memory;

pub use debounce::SaveDebouncer;
pub use error::HostError;
pub use event::{HostEvent, NotifyLevel};
pub use memory::MemoryHost;

use std::sync::Arc;

use tavern_ext_config::{ExtensionSettings, Script};
use tokio::sync::broadcast;

/// The narrow surface the extension needs from the chat host.
///
/// All persistence methods are synchronous from the caller's point of view;
/// an implementation is free to debounce the actual disk/network write (see
/// [`SaveDebouncer`]) as long as subsequent reads observe the update.
pub trait TavernHost: Send + Sync {
    /// Load the extension's persisted settings document.
    fn extension_settings(&self) -> Result<ExtensionSettings, HostError>;

    /// Persist the extension settings document.
    ///
    /// Emits [`HostEvent::SettingsUpdated`] to subscribers.
    fn save_extension_settings(&self, settings: &ExtensionSettings) -> Result<(), HostError>;

    /// Identifier (avatar key) of the active character, if a chat is open.
    fn active_character_id(&self) -> Option<String>;

    /// Scripts embedded in the active character's record.
    fn character_scripts(&self) -> Result<Vec<Script>, HostError>;

    /// Replace the active character's embedded scripts.
    fn save_character_scripts(&self, scripts: &[Script]) -> Result<(), HostError>;

    /// Character-scope variable document of the active character.
    fn character_variables(&self) -> Result<serde_json::Value, HostError>;

    /// Replace the character-scope variable document.
    ///
    /// Emits [`HostEvent::CharacterVariablesChanged`] with the fresh document.
    fn set_character_variables(&self, variables: serde_json::Value) -> Result<(), HostError>;

    /// Chat-metadata variable document of the active chat.
    ///
    /// There is deliberately no change event for this store; outside code
    /// can mutate it too, which is why the sync service polls it.
    fn chat_variables(&self) -> Result<serde_json::Value, HostError>;

    /// Replace the chat-metadata variable document and save the chat.
    fn set_chat_variables(&self, variables: serde_json::Value) -> Result<(), HostError>;

    /// Number of messages in the active chat.
    fn message_count(&self) -> usize;

    /// Variable payload attached to the message at `index`.
    fn message_variables(&self, index: usize) -> Result<serde_json::Value, HostError>;

    /// Replace the variable payload of the message at `index`.
    ///
    /// Emits [`HostEvent::MessageVariablesChanged`] with the fresh document.
    fn set_message_variables(
        &self,
        index: usize,
        variables: serde_json::Value,
    ) -> Result<(), HostError>;

    /// Show a transient notification toast.
    fn notify(&self, level: NotifyLevel, message: &str);

    /// Emit a host lifecycle/change event to subscribers.
    fn emit(&self, event: HostEvent);

    /// Subscribe to host events.
    fn subscribe(&self) -> broadcast::Receiver<HostEvent>;
}

/// Shared host handle used throughout the workspace.
pub type SharedHost = Arc<dyn TavernHost>;

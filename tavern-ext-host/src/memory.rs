//! In-memory reference implementation of [`TavernHost`].
//!
//! Used by the test suites and by embedders that manage persistence
//! themselves. Persists synchronously and emits the same change events the
//! real host does, including the deliberate *absence* of a chat-metadata
//! change event.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde_json::Value;
use tavern_ext_config::{ExtensionSettings, Script};
use tokio::sync::broadcast;

use crate::error::HostError;
use crate::event::{HostEvent, NotifyLevel};
use crate::TavernHost;

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// A character's host-side record, as far as the extension can see it.
#[derive(Debug, Clone, Default)]
struct CharacterRecord {
    /// Scripts embedded in the character's extension data.
    scripts: Vec<Script>,
    /// Character-scope variable document.
    variables: Option<Value>,
}

/// One chat message's extension payload.
///
/// Variables live per swipe; the extension only ever addresses the active
/// swipe, so swipes stay invisible above this struct.
#[derive(Debug, Clone)]
struct MessageRecord {
    swipes: Vec<Value>,
    active_swipe: usize,
}

impl MessageRecord {
    fn new() -> Self {
        Self {
            swipes: vec![empty_object()],
            active_swipe: 0,
        }
    }

    fn active(&self) -> &Value {
        &self.swipes[self.active_swipe]
    }

    fn active_mut(&mut self) -> &mut Value {
        &mut self.swipes[self.active_swipe]
    }
}

/// Complete in-memory [`TavernHost`].
pub struct MemoryHost {
    settings: RwLock<ExtensionSettings>,
    characters: RwLock<HashMap<String, CharacterRecord>>,
    active_character: RwLock<Option<String>>,
    chat_variables: RwLock<Value>,
    messages: RwLock<Vec<MessageRecord>>,
    toasts: RwLock<Vec<(NotifyLevel, String)>>,
    events: broadcast::Sender<HostEvent>,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHost {
    /// Create an empty host with default settings and no open chat.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            settings: RwLock::new(ExtensionSettings::default()),
            characters: RwLock::new(HashMap::new()),
            active_character: RwLock::new(None),
            chat_variables: RwLock::new(empty_object()),
            messages: RwLock::new(Vec::new()),
            toasts: RwLock::new(Vec::new()),
            events,
        }
    }

    /// Register a character in the roster.
    pub fn insert_character(&self, character_id: &str) {
        self.characters
            .write()
            .entry(character_id.to_string())
            .or_default();
    }

    /// Switch the active chat to `character_id` (or close the chat).
    ///
    /// Starts a fresh chat: chat variables and messages are reset, then
    /// [`HostEvent::ChatChanged`] fires.
    pub fn switch_chat(&self, character_id: Option<&str>) {
        if let Some(id) = character_id {
            self.insert_character(id);
        }
        *self.active_character.write() = character_id.map(str::to_string);
        *self.chat_variables.write() = empty_object();
        self.messages.write().clear();
        self.emit(HostEvent::ChatChanged {
            character_id: character_id.map(str::to_string),
        });
    }

    /// Delete a character from the roster, emitting
    /// [`HostEvent::CharacterDeleted`].
    pub fn delete_character(&self, character_id: &str) {
        self.characters.write().remove(character_id);
        let mut active = self.active_character.write();
        if active.as_deref() == Some(character_id) {
            *active = None;
        }
        drop(active);
        self.emit(HostEvent::CharacterDeleted {
            character_id: character_id.to_string(),
        });
    }

    /// Append a message to the active chat, returning its index.
    pub fn push_message(&self) -> usize {
        let mut messages = self.messages.write();
        messages.push(MessageRecord::new());
        messages.len() - 1
    }

    /// Add an alternate-response swipe to a message and make it active.
    pub fn add_swipe(&self, index: usize) -> Result<(), HostError> {
        let mut messages = self.messages.write();
        let len = messages.len();
        let record = messages
            .get_mut(index)
            .ok_or(HostError::MessageIndexOutOfRange { index, len })?;
        record.swipes.push(empty_object());
        record.active_swipe = record.swipes.len() - 1;
        Ok(())
    }

    /// Notifications shown so far, for test assertions.
    pub fn toasts(&self) -> Vec<(NotifyLevel, String)> {
        self.toasts.read().clone()
    }

    /// Mutate the chat-variable document *without* any event, simulating a
    /// write from code outside the extension's control.
    pub fn poke_chat_variables(&self, variables: Value) {
        *self.chat_variables.write() = variables;
    }

    fn active_record<R>(
        &self,
        f: impl FnOnce(&mut CharacterRecord) -> R,
    ) -> Result<R, HostError> {
        let active = self
            .active_character
            .read()
            .clone()
            .ok_or(HostError::NoActiveCharacter)?;
        let mut characters = self.characters.write();
        let record = characters.entry(active).or_default();
        Ok(f(record))
    }
}

impl TavernHost for MemoryHost {
    fn extension_settings(&self) -> Result<ExtensionSettings, HostError> {
        Ok(self.settings.read().clone())
    }

    fn save_extension_settings(&self, settings: &ExtensionSettings) -> Result<(), HostError> {
        *self.settings.write() = settings.clone();
        self.emit(HostEvent::SettingsUpdated);
        Ok(())
    }

    fn active_character_id(&self) -> Option<String> {
        self.active_character.read().clone()
    }

    fn character_scripts(&self) -> Result<Vec<Script>, HostError> {
        self.active_record(|record| record.scripts.clone())
    }

    fn save_character_scripts(&self, scripts: &[Script]) -> Result<(), HostError> {
        self.active_record(|record| record.scripts = scripts.to_vec())
    }

    fn character_variables(&self) -> Result<Value, HostError> {
        self.active_record(|record| record.variables.clone().unwrap_or_else(empty_object))
    }

    fn set_character_variables(&self, variables: Value) -> Result<(), HostError> {
        self.active_record(|record| record.variables = Some(variables.clone()))?;
        self.emit(HostEvent::CharacterVariablesChanged {
            variables: Some(variables),
        });
        Ok(())
    }

    fn chat_variables(&self) -> Result<Value, HostError> {
        Ok(self.chat_variables.read().clone())
    }

    fn set_chat_variables(&self, variables: Value) -> Result<(), HostError> {
        // No change event on purpose: the real host has none for chat
        // metadata, which is why the sync service polls this scope.
        *self.chat_variables.write() = variables;
        Ok(())
    }

    fn message_count(&self) -> usize {
        self.messages.read().len()
    }

    fn message_variables(&self, index: usize) -> Result<Value, HostError> {
        let messages = self.messages.read();
        let len = messages.len();
        messages
            .get(index)
            .map(|record| record.active().clone())
            .ok_or(HostError::MessageIndexOutOfRange { index, len })
    }

    fn set_message_variables(&self, index: usize, variables: Value) -> Result<(), HostError> {
        {
            let mut messages = self.messages.write();
            let len = messages.len();
            let record = messages
                .get_mut(index)
                .ok_or(HostError::MessageIndexOutOfRange { index, len })?;
            *record.active_mut() = variables.clone();
        }
        self.emit(HostEvent::MessageVariablesChanged {
            message_index: index,
            variables: Some(variables),
        });
        Ok(())
    }

    fn notify(&self, level: NotifyLevel, message: &str) {
        log::debug!("toast [{level}] {message}");
        self.toasts.write().push((level, message.to_string()));
    }

    fn emit(&self, event: HostEvent) {
        // Send fails only when nobody is subscribed, which is fine.
        let _ = self.events.send(event);
    }

    fn subscribe(&self) -> broadcast::Receiver<HostEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_character_ops_require_active_chat() {
        let host = MemoryHost::new();
        assert!(matches!(
            host.character_scripts(),
            Err(HostError::NoActiveCharacter)
        ));

        host.switch_chat(Some("alice.png"));
        assert!(host.character_scripts().unwrap().is_empty());
    }

    #[test]
    fn test_message_swipes_share_an_index() {
        let host = MemoryHost::new();
        host.switch_chat(Some("alice.png"));
        let idx = host.push_message();

        host.set_message_variables(idx, serde_json::json!({"a": 1})).unwrap();
        host.add_swipe(idx).unwrap();
        // The new swipe starts empty; the old payload is parked on swipe 0.
        assert_eq!(host.message_variables(idx).unwrap(), empty_object());

        host.set_message_variables(idx, serde_json::json!({"b": 2})).unwrap();
        assert_eq!(host.message_variables(idx).unwrap(), serde_json::json!({"b": 2}));
    }

    #[test]
    fn test_out_of_range_message_index() {
        let host = MemoryHost::new();
        host.switch_chat(Some("alice.png"));
        assert!(matches!(
            host.message_variables(3),
            Err(HostError::MessageIndexOutOfRange { index: 3, len: 0 })
        ));
    }

    #[test]
    fn test_settings_save_emits_event() {
        let host = MemoryHost::new();
        let mut rx = host.subscribe();
        host.save_extension_settings(&ExtensionSettings::default()).unwrap();
        assert!(matches!(rx.try_recv(), Ok(HostEvent::SettingsUpdated)));
    }

    #[test]
    fn test_chat_variable_write_emits_nothing() {
        let host = MemoryHost::new();
        let mut rx = host.subscribe();
        host.set_chat_variables(serde_json::json!({"k": 1})).unwrap();
        assert!(rx.try_recv().is_err(), "chat store must stay event-silent");
    }
}

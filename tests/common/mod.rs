//! Shared fixtures for the integration suites.

#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tavern_ext::collision::{CollisionChoice, CollisionPrompt, SweepChoice};
use tavern_ext::session::ExtensionSession;
use tavern_ext_config::Script;
use tavern_ext_host::MemoryHost;
use tavern_ext_vars::VariableView;

/// Dialog double that answers from pre-loaded queues.
///
/// Queues empty? `Cancel` / `KeepGlobal` / deny — the safest defaults for a
/// test that didn't expect a prompt.
#[derive(Default)]
pub struct ScriptedPrompt {
    collision_answers: Mutex<VecDeque<CollisionChoice>>,
    sweep_answers: Mutex<VecDeque<SweepChoice>>,
    confirm_all: Mutex<bool>,
    pub collision_asked: Mutex<usize>,
    pub sweep_asked: Mutex<usize>,
}

impl ScriptedPrompt {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_collision(&self, choice: CollisionChoice) {
        self.collision_answers.lock().push_back(choice);
    }

    pub fn push_sweep(&self, choice: SweepChoice) {
        self.sweep_answers.lock().push_back(choice);
    }

    pub fn confirm_everything(&self) {
        *self.confirm_all.lock() = true;
    }

    pub fn collision_prompts(&self) -> usize {
        *self.collision_asked.lock()
    }

    pub fn sweep_prompts(&self) -> usize {
        *self.sweep_asked.lock()
    }
}

impl CollisionPrompt for ScriptedPrompt {
    fn resolve_collision(
        &self,
        _incoming: &Script,
        _existing: &Script,
        _existing_scope: tavern_ext_config::ScriptScope,
    ) -> CollisionChoice {
        *self.collision_asked.lock() += 1;
        self.collision_answers
            .lock()
            .pop_front()
            .unwrap_or(CollisionChoice::Cancel)
    }

    fn resolve_scope_conflict(&self, _global: &Script, _character: &Script) -> SweepChoice {
        *self.sweep_asked.lock() += 1;
        self.sweep_answers
            .lock()
            .pop_front()
            .unwrap_or(SweepChoice::KeepGlobal)
    }

    fn confirm(&self, _prompt: &str) -> bool {
        *self.confirm_all.lock()
    }
}

/// A session over a fresh in-memory host.
pub fn memory_session() -> (Arc<MemoryHost>, Arc<ScriptedPrompt>, ExtensionSession) {
    let host = Arc::new(MemoryHost::new());
    let prompt = ScriptedPrompt::new();
    let session = ExtensionSession::new(host.clone(), prompt.clone())
        .expect("session construction failed");
    (host, prompt, session)
}

/// A script whose sandbox stays alive until stopped (the bridge main loop
/// blocks on stdin).
pub fn idle_script(name: &str) -> Script {
    Script::new(name, "pass")
}

/// One view callback, recorded for assertions.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewCall {
    Add(String, Value),
    Remove(String),
    Update(String, Value, Value),
}

/// View double that records every card operation.
#[derive(Default)]
pub struct RecordingView {
    pub calls: Mutex<Vec<ViewCall>>,
    pub cards: Mutex<HashSet<String>>,
    pub animations_suppressed: Mutex<bool>,
}

impl RecordingView {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<ViewCall> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn added_names(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ViewCall::Add(name, _) => Some(name),
                _ => None,
            })
            .collect()
    }
}

impl VariableView for RecordingView {
    fn add_card(&self, name: &str, value: &Value) {
        self.cards.lock().insert(name.to_string());
        self.calls
            .lock()
            .push(ViewCall::Add(name.to_string(), value.clone()));
    }

    fn remove_card(&self, name: &str) {
        self.cards.lock().remove(name);
        self.calls.lock().push(ViewCall::Remove(name.to_string()));
    }

    fn update_card(&self, name: &str, old: &Value, new: &Value) {
        self.calls.lock().push(ViewCall::Update(
            name.to_string(),
            old.clone(),
            new.clone(),
        ));
    }

    fn has_card(&self, name: &str) -> bool {
        self.cards.lock().contains(name)
    }

    fn set_animations_suppressed(&self, suppressed: bool) {
        *self.animations_suppressed.lock() = suppressed;
    }
}

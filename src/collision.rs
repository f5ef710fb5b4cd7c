//! Interactive resolution contracts.
//!
//! Identifier collisions and the chat-switch conflict sweep are resolved by
//! asking the user. The orchestrator only sees these traits; the real UI
//! renders popups, tests supply scripted answers.

use tavern_ext_config::{Script, ScriptScope};

/// The three-way choice when an incoming script's id already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionChoice {
    /// Regenerate a fresh id for the incoming script; keep both.
    New,
    /// Delete the pre-existing script, then save the incoming one.
    Override,
    /// Abort with no mutation.
    Cancel,
}

/// The binary choice when a global and a character script share an enabled id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepChoice {
    /// Keep the global script running; disable the conflicting local one.
    KeepGlobal,
    /// Keep the local script running; disable the global one.
    KeepLocal,
}

/// Dialog provider for the orchestrator's interactive protocols.
pub trait CollisionPrompt: Send + Sync {
    /// An import or move found `existing` already holding the incoming id.
    fn resolve_collision(
        &self,
        incoming: &Script,
        existing: &Script,
        existing_scope: ScriptScope,
    ) -> CollisionChoice;

    /// The chat-switch sweep found the same id enabled in both scopes.
    ///
    /// Asked once per conflicting id.
    fn resolve_scope_conflict(&self, global: &Script, character: &Script) -> SweepChoice;

    /// A yes/no confirmation (delete, clear-all).
    fn confirm(&self, prompt: &str) -> bool;
}

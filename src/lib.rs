//! Scriptable automation layer for tavern chat hosts.
//!
//! `tavern-ext` embeds in a chat host (the "tavern") and adds two things:
//! user-authored scripts running in isolated per-script contexts, and a
//! four-scope variable store kept in sync with the host's persisted state.
//! The host itself is reached only through the narrow
//! [`tavern_ext_host::TavernHost`] contract, so the whole extension can run
//! against the in-memory host in tests.
//!
//! The pieces, bottom up:
//!
//! - [`tavern_ext_config`] — persisted shapes and validation
//! - [`tavern_ext_host`] — the host seam and its in-memory implementation
//! - [`tavern_ext_sandbox`] — one subprocess per running script, JSON bridge
//! - [`tavern_ext_vars`] — variable store accessors and the sync service
//! - this crate — the event bus, script repository, and orchestrator façade

pub mod collision;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod repository;
pub mod session;

pub use collision::{CollisionChoice, CollisionPrompt, SweepChoice};
pub use error::ExtError;
pub use events::{EventBus, ExtEvent, UiRefreshAction, button_event_key};
pub use orchestrator::ScriptOrchestrator;
pub use repository::ScriptRepository;
pub use session::ExtensionSession;

// Re-export the member crates under their concern names.
pub use tavern_ext_config as config;
pub use tavern_ext_host as host;
pub use tavern_ext_sandbox as sandbox;
pub use tavern_ext_vars as vars;

//! Configuration types for the tavern-ext automation layer.
//!
//! This crate provides the persisted data shapes shared by the rest of the
//! workspace. It includes:
//!
//! - Script records, buttons, and scope ownership
//! - Import/export records for sharing scripts as JSON files
//! - Extension-wide settings (script lists, enable flags, allow-list)
//! - Sandbox runner and variable-sync tuning parameters
//! - The built-in script catalog with deterministic ids

pub mod builtin;
pub mod defaults;
pub mod error;
pub mod script;
pub mod settings;

// Re-export main types for convenience
pub use builtin::builtin_scripts;
pub use error::ConfigError;
pub use script::{Script, ScriptButton, ScriptExport, ScriptScope};
pub use settings::{ExtensionSettings, SandboxRunner, SyncTuning};

//! Cross-scope variable subsystem for the tavern-ext automation layer.
//!
//! Four variable scopes (global, character, chat, message) are backed by
//! distinct host-persisted stores. [`VariableStore`] gives uniform
//! read/transform/write access; [`VariableSyncService`] keeps a UI's view
//! of the active scope eventually consistent using host change events where
//! they exist and a poll where they don't (chat metadata).

pub mod error;
pub mod merge;
pub mod scope;
pub mod store;
pub mod sync;

pub use error::VarError;
pub use scope::VarScope;
pub use store::VariableStore;
pub use sync::{
    InternalOpGuard, InternalOps, VariableDiff, VariableSyncService, VariableView,
    diff_documents,
};

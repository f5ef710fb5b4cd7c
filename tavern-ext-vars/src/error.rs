//! Typed error types for the variable subsystem.

use tavern_ext_host::HostError;
use thiserror::Error;

/// Failures from the variable store and sync service.
#[derive(Debug, Error)]
pub enum VarError {
    /// A scope document must be a JSON object.
    #[error("{scope} variables must be a JSON object, got {got}")]
    NotAMapping {
        /// Scope name.
        scope: &'static str,
        /// JSON type actually supplied.
        got: &'static str,
    },

    /// A message index was outside the active chat.
    #[error("message index {index} out of range (chat has {len} messages)")]
    MessageIndexOutOfRange {
        /// The requested index.
        index: usize,
        /// Number of messages in the chat.
        len: usize,
    },

    /// A rename referenced a variable that does not exist.
    #[error("variable '{0}' not found")]
    KeyNotFound(String),

    /// The host's persistence layer failed.
    #[error(transparent)]
    Host(#[from] HostError),
}

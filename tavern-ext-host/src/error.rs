//! Typed error variants for host persistence calls.

use std::fmt;

/// Errors surfaced by [`crate::TavernHost`] implementations.
#[derive(Debug)]
pub enum HostError {
    /// The underlying persistence call failed.
    ///
    /// The inner string names the store and the failure.
    Storage(String),

    /// An operation needed an active character but no chat is open.
    NoActiveCharacter,

    /// A message index was outside the active chat.
    MessageIndexOutOfRange {
        /// The requested index.
        index: usize,
        /// Number of messages in the chat.
        len: usize,
    },
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostError::Storage(msg) => write!(f, "host storage error: {msg}"),
            HostError::NoActiveCharacter => write!(f, "no active character"),
            HostError::MessageIndexOutOfRange { index, len } => {
                write!(f, "message index {index} out of range (chat has {len} messages)")
            }
        }
    }
}

impl std::error::Error for HostError {}

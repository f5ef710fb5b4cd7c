//! Typed error variants for the tavern-ext-config crate.
//!
//! Produced by the script and settings parsing helpers. Exposed so library
//! consumers can match on specific failure modes instead of opaque strings.

use std::fmt;

/// Errors that can occur when parsing or validating persisted shapes.
#[derive(Debug)]
pub enum ConfigError {
    /// The input contained invalid JSON that could not be parsed.
    Parse(serde_json::Error),

    /// A field value failed semantic validation.
    ///
    /// The inner string describes which field is invalid and why.
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Parse(e) => write!(f, "JSON parse error: {e}"),
            ConfigError::Validation(msg) => write!(f, "validation error: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Parse(e) => Some(e),
            ConfigError::Validation(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e)
    }
}

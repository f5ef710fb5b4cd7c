//! Top-level error taxonomy for the extension façade.
//!
//! Store-layer failures (validation, not-found) propagate to the caller and
//! abort batches; sandbox failures are caught per script at the
//! orchestrator so one broken script never blocks the rest.

use tavern_ext_config::ConfigError;
use tavern_ext_host::HostError;
use tavern_ext_sandbox::SandboxError;
use tavern_ext_vars::VarError;
use thiserror::Error;

/// Errors surfaced by the repository and orchestrator.
#[derive(Debug, Error)]
pub enum ExtError {
    /// User-supplied data failed a precondition; nothing was persisted.
    #[error("validation failed: {0}")]
    Validation(String),

    /// An operation referenced a script that is not in the expected
    /// collection; nothing was mutated.
    #[error("script not found: {0}")]
    NotFound(String),

    /// The user cancelled an interactive resolution; state is unchanged.
    #[error("operation cancelled")]
    Cancelled,

    /// A record could not be serialized for export.
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Sandbox construction or delivery failed.
    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    /// The host's persistence layer failed.
    #[error(transparent)]
    Host(#[from] HostError),

    /// A variable operation failed.
    #[error(transparent)]
    Var(#[from] VarError),
}

impl From<ConfigError> for ExtError {
    fn from(e: ConfigError) -> Self {
        // Both parse and semantic failures of user-supplied records are
        // validation errors at this boundary.
        ExtError::Validation(e.to_string())
    }
}

//! Typed error types for the sandbox crate.
//!
//! Callers at the orchestrator boundary match on these to decide whether a
//! failure is per-script (notify and continue the batch) or structural.

use thiserror::Error;

/// Failures while constructing, addressing, or feeding a script context.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// The execution document could not be written to the work directory.
    #[error("failed to write execution document for '{script}': {source}")]
    Document {
        /// Script name.
        script: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The runner subprocess could not be spawned.
    #[error("failed to spawn sandbox for '{script}' via '{program}': {source}")]
    Spawn {
        /// Script name.
        script: String,
        /// Runner program.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A stdio pipe was missing after spawn.
    #[error("sandbox for '{script}' has no {stream} pipe")]
    Stdio {
        /// Script name.
        script: String,
        /// Which pipe was missing ("stdin", "stdout", "stderr").
        stream: &'static str,
    },

    /// No live context exists for the given script id.
    #[error("no running context for script id {0}")]
    UnknownContext(String),

    /// A bridge event could not be serialized or written to the context.
    #[error("failed to deliver event to script id {script_id}: {message}")]
    Send {
        /// Target context.
        script_id: String,
        /// What went wrong.
        message: String,
    },
}

//! Isolated script host for the tavern-ext automation layer.
//!
//! Each enabled script runs in its own subprocess, built from a synthesized
//! execution document (bridge prelude + the script's own source). Events
//! flow down to the script as JSON lines on stdin; commands flow back up as
//! JSON lines on stdout. The host guarantees at most one live context per
//! script id, destroying any stale context before starting a new one.

pub mod document;
pub mod error;
pub mod host;
pub mod process;
pub mod protocol;

pub use error::SandboxError;
pub use host::SandboxHost;
pub use process::SandboxProcess;
pub use protocol::{BridgeCommand, BridgeEvent};

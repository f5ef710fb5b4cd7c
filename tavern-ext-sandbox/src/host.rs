//! Multi-context sandbox host.
//!
//! [`SandboxHost`] tracks every live script context keyed by script id and
//! enforces the lifecycle invariants: at most one context per id (a run
//! destroys any stale context first) and teardown that never fails.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use tavern_ext_config::{SandboxRunner, Script, ScriptScope};
use uuid::Uuid;

use crate::document::synthesize_document;
use crate::error::SandboxError;
use crate::process::SandboxProcess;
use crate::protocol::{BridgeCommand, BridgeEvent};

/// A live execution context and what we know about its script.
struct SandboxContext {
    process: SandboxProcess,
    document_path: PathBuf,
    scope: ScriptScope,
    script_name: String,
    button_names: Vec<String>,
}

/// Owns all running script contexts.
pub struct SandboxHost {
    runner: SandboxRunner,
    work_dir: PathBuf,
    contexts: HashMap<String, SandboxContext>,
}

impl SandboxHost {
    /// Create a host that executes documents with `runner`.
    ///
    /// Documents are written to a unique directory under the system temp
    /// dir, removed again as contexts are destroyed.
    pub fn new(runner: SandboxRunner) -> Self {
        let work_dir = std::env::temp_dir().join(format!("tavern-ext-{}", Uuid::new_v4()));
        Self {
            runner,
            work_dir,
            contexts: HashMap::new(),
        }
    }

    fn document_path(&self, script_id: &str) -> PathBuf {
        let safe: String = script_id
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.work_dir.join(format!("{safe}.py"))
    }

    /// Start a context for `script`, destroying any stale one with the same
    /// id first (idempotent restart).
    pub fn run(&mut self, script: &Script, scope: ScriptScope) -> Result<(), SandboxError> {
        self.stop(&script.id);

        fs::create_dir_all(&self.work_dir).map_err(|source| SandboxError::Document {
            script: script.name.clone(),
            source,
        })?;
        let document_path = self.document_path(&script.id);
        fs::write(&document_path, synthesize_document(script)).map_err(|source| {
            SandboxError::Document {
                script: script.name.clone(),
                source,
            }
        })?;

        let mut args = self.runner.args.clone();
        args.push(document_path.to_string_lossy().into_owned());
        let process = match SandboxProcess::spawn(&script.name, &self.runner.program, &args) {
            Ok(process) => process,
            Err(e) => {
                // Failed starts must not leave documents behind.
                if let Err(rm) = fs::remove_file(&document_path) {
                    log::debug!("orphan document cleanup: {rm}");
                }
                return Err(e);
            }
        };

        log::info!("sandbox started for '{}' ({scope})", script.name);
        self.contexts.insert(
            script.id.clone(),
            SandboxContext {
                process,
                document_path,
                scope,
                script_name: script.name.clone(),
                button_names: script.buttons.iter().map(|b| b.name.clone()).collect(),
            },
        );
        Ok(())
    }

    /// Destroy the context for `script_id`, if one exists.
    ///
    /// Returns whether a context was actually torn down. Never fails.
    pub fn stop(&mut self, script_id: &str) -> bool {
        match self.contexts.remove(script_id) {
            Some(mut context) => {
                context.process.stop();
                if let Err(e) = fs::remove_file(&context.document_path) {
                    log::debug!("document cleanup for '{}': {e}", context.script_name);
                }
                log::info!("sandbox stopped for '{}'", context.script_name);
                true
            }
            None => false,
        }
    }

    /// Run every `enabled` script in the slice (callers gate on the scope's
    /// master flag). Per-script failures are collected, not propagated, so
    /// one broken script never blocks the rest of the batch.
    pub fn run_by_scope(
        &mut self,
        scripts: &[Script],
        scope: ScriptScope,
    ) -> Vec<(String, SandboxError)> {
        let mut failures = Vec::new();
        for script in scripts.iter().filter(|s| s.enabled) {
            if let Err(e) = self.run(script, scope) {
                failures.push((script.name.clone(), e));
            }
        }
        failures
    }

    /// Stop every `enabled` script in the slice.
    pub fn stop_by_scope(&mut self, scripts: &[Script]) {
        for script in scripts.iter().filter(|s| s.enabled) {
            self.stop(&script.id);
        }
    }

    /// Stop every context tagged with `scope` (used when the chat switches
    /// and the previous character's contexts go stale).
    ///
    /// Returns the ids that were actually torn down.
    pub fn stop_scope(&mut self, scope: ScriptScope) -> Vec<String> {
        let ids: Vec<String> = self
            .contexts
            .iter()
            .filter(|(_, c)| c.scope == scope)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &ids {
            self.stop(id);
        }
        ids
    }

    /// Whether a context exists for `script_id` (dead or alive).
    pub fn has_context(&self, script_id: &str) -> bool {
        self.contexts.contains_key(script_id)
    }

    /// Whether the context for `script_id` exists and its process is alive.
    pub fn is_running(&mut self, script_id: &str) -> bool {
        self.contexts
            .get_mut(script_id)
            .is_some_and(|c| c.process.is_running())
    }

    /// Ids of all tracked contexts.
    pub fn context_ids(&self) -> Vec<String> {
        self.contexts.keys().cloned().collect()
    }

    /// Declared button names of a running context, if any.
    pub fn context_buttons(&self, script_id: &str) -> Option<&[String]> {
        self.contexts
            .get(script_id)
            .map(|c| c.button_names.as_slice())
    }

    /// Deliver an event to one context.
    pub fn send_event(
        &mut self,
        script_id: &str,
        event: &BridgeEvent,
    ) -> Result<(), SandboxError> {
        let context = self
            .contexts
            .get_mut(script_id)
            .ok_or_else(|| SandboxError::UnknownContext(script_id.to_string()))?;
        context.process.send_event(script_id, event)
    }

    /// Deliver an event to every context, best effort.
    pub fn broadcast(&mut self, event: &BridgeEvent) {
        for (id, context) in &mut self.contexts {
            if let Err(e) = context.process.send_event(id, event) {
                log::debug!("broadcast to '{}' skipped: {e}", context.script_name);
            }
        }
    }

    /// Drain pending commands from every context as `(script_id, command)`.
    pub fn drain_commands(&mut self) -> Vec<(String, BridgeCommand)> {
        let mut out = Vec::new();
        for (id, context) in &self.contexts {
            for cmd in context.process.drain_commands() {
                out.push((id.clone(), cmd));
            }
        }
        out
    }

    /// Drain stderr lines from every context as `(script_name, line)`.
    pub fn drain_errors(&mut self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        for context in self.contexts.values() {
            for line in context.process.drain_errors() {
                out.push((context.script_name.clone(), line));
            }
        }
        out
    }

    /// Destroy every tracked context.
    pub fn clear_all(&mut self) {
        let ids: Vec<String> = self.contexts.keys().cloned().collect();
        for id in ids {
            self.stop(&id);
        }
        if self.work_dir.exists() {
            if let Err(e) = fs::remove_dir_all(&self.work_dir) {
                log::debug!("work dir cleanup: {e}");
            }
        }
    }
}

impl Drop for SandboxHost {
    fn drop(&mut self) {
        self.clear_all();
    }
}

//! Per-session wiring.
//!
//! One [`ExtensionSession`] per host document: every service is constructed
//! here and handed its dependencies explicitly, so tests can stand up any
//! number of independent sessions against separate in-memory hosts.

use std::sync::Arc;

use tavern_ext_config::SyncTuning;
use tavern_ext_host::{SharedHost, TavernHost};
use tavern_ext_vars::{VariableStore, VariableSyncService, VariableView};

use crate::collision::CollisionPrompt;
use crate::error::ExtError;
use crate::events::EventBus;
use crate::orchestrator::ScriptOrchestrator;

/// Everything one embedding needs, constructed once.
pub struct ExtensionSession {
    /// The host this session runs against.
    pub host: SharedHost,
    /// The extension event bus.
    pub bus: EventBus,
    /// Script lifecycle façade.
    pub orchestrator: Arc<ScriptOrchestrator>,
    /// Variable accessors.
    pub variables: VariableStore,
}

impl ExtensionSession {
    /// Wire a session over `host` with `prompt` answering dialogs.
    pub fn new(host: SharedHost, prompt: Arc<dyn CollisionPrompt>) -> Result<Self, ExtError> {
        let bus = EventBus::default();
        let orchestrator = Arc::new(ScriptOrchestrator::new(
            Arc::clone(&host),
            bus.clone(),
            prompt,
        )?);
        let variables = VariableStore::new(Arc::clone(&host));
        Ok(Self {
            host,
            bus,
            orchestrator,
            variables,
        })
    }

    /// Build a sync service for a variable panel over this session's store.
    ///
    /// The tuning comes from persisted settings so embedders can adjust the
    /// poll cadence without a rebuild.
    pub fn sync_service(
        &self,
        view: Arc<dyn VariableView>,
    ) -> Result<VariableSyncService, ExtError> {
        let tuning: SyncTuning = self.host.extension_settings()?.sync;
        Ok(VariableSyncService::new(
            self.variables.clone(),
            view,
            tuning,
        ))
    }
}

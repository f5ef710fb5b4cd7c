//! Script orchestrator: the façade over the repository and the sandbox.
//!
//! Coordinates toggles and scope cascades, import/export, identifier
//! collision resolution, the chat-switch conflict sweep, and host lifecycle
//! hooks. Error policy: store failures propagate (an inconsistent save must
//! stop a batch); sandbox failures are logged and toasted per script, and
//! never roll back the persisted `enabled` flag — the flag records user
//! intent, not runtime success.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tavern_ext_config::{Script, ScriptExport, ScriptScope};
use tavern_ext_host::{NotifyLevel, SharedHost, TavernHost};
use tavern_ext_sandbox::{BridgeCommand, BridgeEvent, SandboxError, SandboxHost};
use tavern_ext_vars::{VarScope, VariableStore};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::collision::{CollisionChoice, CollisionPrompt, SweepChoice};
use crate::error::ExtError;
use crate::events::{EventBus, ExtEvent, UiRefreshAction};
use crate::repository::ScriptRepository;

/// How often the bridge-command pump drains script output.
const COMMAND_PUMP_PERIOD: Duration = Duration::from_millis(250);

/// The extension façade.
pub struct ScriptOrchestrator {
    host: SharedHost,
    repo: ScriptRepository,
    sandbox: Mutex<SandboxHost>,
    variables: VariableStore,
    bus: EventBus,
    prompt: Arc<dyn CollisionPrompt>,
    monitors: Mutex<Vec<JoinHandle<()>>>,
}

impl ScriptOrchestrator {
    /// Build the orchestrator over a host, bus, and dialog provider.
    pub fn new(
        host: SharedHost,
        bus: EventBus,
        prompt: Arc<dyn CollisionPrompt>,
    ) -> Result<Self, ExtError> {
        let runner = host.extension_settings()?.runner;
        Ok(Self {
            repo: ScriptRepository::new(Arc::clone(&host))?,
            sandbox: Mutex::new(SandboxHost::new(runner)),
            variables: VariableStore::new(Arc::clone(&host)),
            bus: bus.clone(),
            prompt,
            monitors: Mutex::new(Vec::new()),
            host,
        })
    }

    /// The script repository.
    pub fn repository(&self) -> &ScriptRepository {
        &self.repo
    }

    /// The extension bus.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Whether a live context exists for a script id.
    pub fn has_context(&self, script_id: &str) -> bool {
        self.sandbox.lock().has_context(script_id)
    }

    /// Ids of every tracked context.
    pub fn context_ids(&self) -> Vec<String> {
        self.sandbox.lock().context_ids()
    }

    fn scope_active(&self, scope: ScriptScope) -> Result<bool, ExtError> {
        Ok(self.repo.extension_enabled()? && self.repo.type_enabled(scope)?)
    }

    fn notify_sandbox_failure(&self, script: &str, scope: ScriptScope, error: &SandboxError) {
        log::error!("sandbox failure for '{script}' ({scope}): {error}");
        self.host.notify(
            NotifyLevel::Error,
            &format!("Script '{script}' ({scope}) failed to start: {error}"),
        );
    }

    fn start_context(&self, script: &Script, scope: ScriptScope) {
        let started = {
            let mut sandbox = self.sandbox.lock();
            sandbox.run(script, scope)
        };
        match started {
            Ok(()) => {
                if !script.buttons.is_empty() {
                    self.bus.emit(ExtEvent::ButtonAdd {
                        script: script.clone(),
                    });
                }
            }
            Err(e) => self.notify_sandbox_failure(&script.name, scope, &e),
        }
    }

    fn stop_context(&self, script_id: &str) {
        if self.sandbox.lock().stop(script_id) {
            self.bus.emit(ExtEvent::ButtonRemove {
                script_id: script_id.to_string(),
            });
        }
    }

    /// Toggle one script.
    ///
    /// User-initiated toggles persist the new `enabled` value first. The
    /// sandbox only starts or stops when the scope's master flag (and the
    /// extension) is on; otherwise the flag is saved and takes effect on
    /// the next master-flag flip or chat reload. A `UiRefresh` fires either
    /// way.
    pub fn toggle_script(
        &self,
        script: &Script,
        scope: ScriptScope,
        enable: bool,
        user_input: bool,
    ) -> Result<(), ExtError> {
        let mut script = script.clone();
        script.enabled = enable;
        if user_input {
            self.repo.save_script(&script, scope)?;
        }

        if self.scope_active(scope)? {
            if enable {
                self.start_context(&script, scope);
            } else {
                self.stop_context(&script.id);
            }
        }

        self.bus.emit(ExtEvent::UiRefresh {
            action: UiRefreshAction::ScriptToggled,
        });
        Ok(())
    }

    /// Toggle a scope's master flag, cascading to every enabled script in
    /// that scope.
    pub fn toggle_type(
        &self,
        scope: ScriptScope,
        enable: bool,
        user_input: bool,
    ) -> Result<(), ExtError> {
        if user_input {
            self.repo.update_type_enabled(scope, enable)?;
        }

        if self.repo.extension_enabled()? {
            if enable {
                self.run_scope(scope)?;
            } else {
                self.stop_scope_scripts(scope)?;
            }
        }

        self.bus.emit(ExtEvent::UiRefresh {
            action: UiRefreshAction::TypeToggled,
        });
        Ok(())
    }

    /// Start every enabled script of a scope, if the scope is active.
    ///
    /// A no-op when the scope's master flag or the extension is off.
    /// Per-script sandbox failures are toasted and do not stop the batch.
    pub fn run_scope(&self, scope: ScriptScope) -> Result<(), ExtError> {
        if !self.scope_active(scope)? {
            return Ok(());
        }
        let scripts = self.repo.scripts(scope)?;
        let failures = self.sandbox.lock().run_by_scope(&scripts, scope);
        for script in scripts.iter().filter(|s| s.enabled && !s.buttons.is_empty()) {
            if failures.iter().all(|(name, _)| name != &script.name) {
                self.bus.emit(ExtEvent::ButtonAdd {
                    script: script.clone(),
                });
            }
        }
        for (name, error) in &failures {
            self.notify_sandbox_failure(name, scope, error);
        }
        Ok(())
    }

    /// Stop every enabled script of a scope.
    pub fn stop_scope_scripts(&self, scope: ScriptScope) -> Result<(), ExtError> {
        let scripts = match scope {
            ScriptScope::Global => self.repo.global_scripts(),
            ScriptScope::Character => self.repo.character_scripts_or_empty()?,
        };
        for script in scripts.iter().filter(|s| s.enabled) {
            self.stop_context(&script.id);
        }
        Ok(())
    }

    /// Save a script from the editor, restarting its context when it is
    /// already running so edits take effect immediately.
    pub fn save_script(&self, script: &Script, scope: ScriptScope) -> Result<(), ExtError> {
        self.repo.save_script(script, scope)?;
        if script.enabled && self.scope_active(scope)? {
            self.start_context(script, scope);
        }
        self.bus.emit(ExtEvent::UiRefresh {
            action: UiRefreshAction::ScriptSaved,
        });
        Ok(())
    }

    /// Delete a script after user confirmation.
    pub fn delete_script(&self, script_id: &str, scope: ScriptScope) -> Result<(), ExtError> {
        let script = self
            .repo
            .find_in_scope(script_id, scope)?
            .ok_or_else(|| ExtError::NotFound(format!("id {script_id} in {scope} scripts")))?;
        if !self.prompt.confirm(&format!("Delete script '{}'?", script.name)) {
            return Err(ExtError::Cancelled);
        }
        self.stop_context(script_id);
        self.repo.delete_script(script_id, scope)?;
        self.bus.emit(ExtEvent::UiRefresh {
            action: UiRefreshAction::ScriptDeleted,
        });
        Ok(())
    }

    /// Import a script from raw file text into `target`.
    ///
    /// Parse failures and missing name/content are validation errors;
    /// imports always land disabled. When the record carries an id that
    /// already exists in either scope, the collision is resolved
    /// interactively before anything is saved.
    pub fn import_script(
        &self,
        raw: &str,
        file_name: &str,
        target: ScriptScope,
    ) -> Result<Script, ExtError> {
        let record = ScriptExport::parse(raw).map_err(|e| {
            ExtError::Validation(format!("import of '{file_name}' failed: {e}"))
        })?;
        let mut incoming = record.into_script();

        if let Some((existing, existing_scope)) = self.repo.find_script(&incoming.id)? {
            match self
                .prompt
                .resolve_collision(&incoming, &existing, existing_scope)
            {
                CollisionChoice::Cancel => return Err(ExtError::Cancelled),
                CollisionChoice::New => {
                    incoming.regenerate_id();
                }
                CollisionChoice::Override => {
                    // The old context must be gone before the replacement
                    // record lands under the same id.
                    self.stop_context(&existing.id);
                    self.repo.delete_script(&existing.id, existing_scope)?;
                }
            }
        }

        self.repo.save_script(&incoming, target)?;
        self.bus.emit(ExtEvent::UiRefresh {
            action: UiRefreshAction::ScriptImported,
        });
        Ok(incoming)
    }

    /// Export a script as `(file_name, json)`, with `enabled` and `id`
    /// stripped from the record.
    pub fn export_script(&self, script_id: &str) -> Result<(String, String), ExtError> {
        let (script, _) = self
            .repo
            .find_script(script_id)?
            .ok_or_else(|| ExtError::NotFound(format!("id {script_id}")))?;
        let json = serde_json::to_string_pretty(&ScriptExport::from(&script))?;
        Ok((format!("{}.json", script.export_file_stem()), json))
    }

    /// Move a script to the other scope, resolving id collisions with the
    /// destination interactively. Membership is re-verified afterwards
    /// because the move is two separate persists.
    pub fn move_script(&self, script: &Script, from: ScriptScope) -> Result<Script, ExtError> {
        let target = from.other();
        let moved = match self.repo.find_in_scope(&script.id, target)? {
            None => {
                self.repo.move_script_to_other_scope(script, from)?;
                script.clone()
            }
            Some(existing) => match self.prompt.resolve_collision(script, &existing, target) {
                CollisionChoice::Cancel => return Err(ExtError::Cancelled),
                CollisionChoice::New => {
                    let mut moved = self.repo.delete_script(&script.id, from)?;
                    moved.regenerate_id();
                    self.repo.save_script(&moved, target)?;
                    moved
                }
                CollisionChoice::Override => {
                    self.stop_context(&existing.id);
                    self.repo.delete_script(&existing.id, target)?;
                    self.repo.move_script_to_other_scope(script, from)?;
                    script.clone()
                }
            },
        };

        if self.repo.find_in_scope(&moved.id, target)?.is_none() {
            return Err(ExtError::NotFound(format!(
                "id {} missing from {target} scripts after move",
                moved.id
            )));
        }

        // A running context keeps the old scope tag; restart it under the
        // new one so chat-switch teardown sees it correctly.
        if moved.enabled && self.has_context(&moved.id) && self.scope_active(target)? {
            self.start_context(&moved, target);
        }

        self.bus.emit(ExtEvent::UiRefresh {
            action: UiRefreshAction::ScriptMoved,
        });
        Ok(moved)
    }

    /// Chat-switch hook.
    ///
    /// Tears down the previous character's contexts, sweeps enabled-id
    /// conflicts between the scopes, then restarts global scripts (their
    /// old contexts are stale) and runs the new character's scripts,
    /// gated on the respective master flags.
    pub fn on_chat_changed(&self) -> Result<(), ExtError> {
        for id in self.sandbox.lock().stop_scope(ScriptScope::Character) {
            self.bus.emit(ExtEvent::ButtonRemove { script_id: id });
        }
        self.repo.refresh()?;
        self.sweep_conflicts()?;
        self.run_scope(ScriptScope::Global)?;
        self.run_scope(ScriptScope::Character)?;
        self.bus.emit(ExtEvent::UiRefresh {
            action: UiRefreshAction::RefreshCharacterScripts,
        });
        Ok(())
    }

    /// Character-deleted hook: purge the identifier from the allow-list.
    pub fn on_character_deleted(&self, character_id: &str) -> Result<(), ExtError> {
        self.repo.purge_character(character_id)
    }

    /// First auto-run pass after the initial render.
    pub fn on_ui_loaded(&self) -> Result<(), ExtError> {
        self.run_scope(ScriptScope::Global)?;
        self.run_scope(ScriptScope::Character)
    }

    /// Persist a new display order for a scope's scripts.
    pub fn reorder_scripts(&self, scope: ScriptScope, ids: &[String]) -> Result<(), ExtError> {
        self.repo.reorder_scripts(scope, ids)?;
        self.bus.emit(ExtEvent::UiRefresh {
            action: UiRefreshAction::ScriptsReordered,
        });
        Ok(())
    }

    /// Instantiate the built-in catalog.
    pub fn load_builtin_scripts(&self) -> Result<usize, ExtError> {
        let added = self.repo.load_builtin_scripts()?;
        self.bus.emit(ExtEvent::UiRefresh {
            action: UiRefreshAction::LoadDefaultScripts,
        });
        Ok(added)
    }

    /// One sweep over ids enabled in both scopes at once.
    ///
    /// The user is prompted once per conflicting id. Regardless of the
    /// choice the local copy is re-identified with a fresh id so the pair
    /// can never collide again; then exactly one of the two is disabled and
    /// its context stopped.
    fn sweep_conflicts(&self) -> Result<(), ExtError> {
        let globals = self.repo.global_scripts();
        let characters = self.repo.character_scripts_or_empty()?;

        for global in globals.iter().filter(|s| s.enabled) {
            let Some(local) = characters.iter().find(|c| c.id == global.id && c.enabled) else {
                continue;
            };
            let choice = self.prompt.resolve_scope_conflict(global, local);

            let old_local_id = local.id.clone();
            let mut local = local.clone();
            local.regenerate_id();
            self.repo.delete_script(&old_local_id, ScriptScope::Character)?;

            match choice {
                SweepChoice::KeepGlobal => {
                    local.enabled = false;
                    self.stop_context(&old_local_id);
                }
                SweepChoice::KeepLocal => {
                    let mut global = global.clone();
                    global.enabled = false;
                    self.stop_context(&global.id);
                    self.repo.save_script(&global, ScriptScope::Global)?;
                }
            }
            self.repo.save_script(&local, ScriptScope::Character)?;
        }
        Ok(())
    }

    /// Resolve a script's `info` field, fetching it when it is a URL.
    ///
    /// Fetch failures are logged and the raw field returned; documentation
    /// is never worth an error toast.
    pub fn resolve_script_info(&self, script: &Script) -> String {
        let info = script.info.trim();
        if !(info.starts_with("http://") || info.starts_with("https://")) {
            return script.info.clone();
        }
        let fetched = ureq::get(info)
            .header("User-Agent", "tavern-ext")
            .call()
            .map_err(|e| e.to_string())
            .and_then(|response| {
                response
                    .into_body()
                    .read_to_string()
                    .map_err(|e| e.to_string())
            });
        match fetched {
            Ok(body) => body,
            Err(e) => {
                log::warn!("info fetch for '{}' failed: {e}", script.name);
                script.info.clone()
            }
        }
    }

    /// Drain pending bridge commands from every context and apply them.
    ///
    /// Returns how many commands were serviced. Also forwards script stderr
    /// lines to the log.
    pub fn pump_commands(&self) -> usize {
        let (commands, errors) = {
            let mut sandbox = self.sandbox.lock();
            (sandbox.drain_commands(), sandbox.drain_errors())
        };
        for (script, line) in errors {
            log::warn!("script '{script}' stderr: {line}");
        }

        let count = commands.len();
        for (script_id, command) in commands {
            self.apply_command(&script_id, command);
        }
        count
    }

    fn apply_command(&self, script_id: &str, command: BridgeCommand) {
        match command {
            BridgeCommand::Log { level, message } => {
                let level = match level.as_str() {
                    "trace" => log::Level::Trace,
                    "debug" => log::Level::Debug,
                    "warn" => log::Level::Warn,
                    "error" => log::Level::Error,
                    _ => log::Level::Info,
                };
                log::log!(level, "[script {script_id}] {message}");
            }
            BridgeCommand::Notify { level, message } => {
                let level = match level.as_str() {
                    "success" => NotifyLevel::Success,
                    "warning" => NotifyLevel::Warning,
                    "error" => NotifyLevel::Error,
                    _ => NotifyLevel::Info,
                };
                self.host.notify(level, &message);
            }
            BridgeCommand::SetVariable { scope, name, value } => {
                let Some(scope) = VarScope::parse(&scope) else {
                    log::warn!("script {script_id} wrote to unknown scope '{scope}'");
                    return;
                };
                let mut incoming = serde_json::Map::new();
                incoming.insert(name, value);
                if let Err(e) =
                    self.variables
                        .insert_or_assign(scope, &serde_json::Value::Object(incoming), None)
                {
                    log::warn!("script {script_id} variable write failed: {e}");
                }
            }
            BridgeCommand::EmitEvent { name, fields } => {
                self.bus.emit(ExtEvent::Custom { name, fields });
            }
        }
    }

    /// Deliver a dynamically named event: button events (named
    /// `{script_id}_{button}`) go to the owning context as
    /// [`BridgeEvent::ButtonClicked`]; anything else is broadcast to every
    /// context as [`BridgeEvent::Custom`].
    fn forward_custom_event(&self, name: &str, fields: &HashMap<String, serde_json::Value>) {
        let mut sandbox = self.sandbox.lock();
        let mut matched_button = false;
        for id in sandbox.context_ids() {
            let buttons = sandbox
                .context_buttons(&id)
                .map(<[String]>::to_vec)
                .unwrap_or_default();
            for button in buttons {
                if name == crate::events::button_event_key(&id, &button) {
                    if let Err(e) =
                        sandbox.send_event(&id, &BridgeEvent::ButtonClicked { button })
                    {
                        log::debug!("button event delivery failed: {e}");
                    }
                    matched_button = true;
                    break;
                }
            }
        }
        if !matched_button {
            sandbox.broadcast(&BridgeEvent::Custom {
                name: name.to_string(),
                fields: fields.clone(),
            });
        }
    }

    /// Bus entry point: dispatch one event, absorbing errors.
    ///
    /// Toggle/run paths are best-effort operations driven by UI events;
    /// failures are logged and toasted here rather than thrown at the bus.
    pub fn handle_event(&self, event: ExtEvent) {
        let outcome = match event {
            ExtEvent::ScriptToggle {
                script,
                scope,
                enable,
                user_input,
            } => self.toggle_script(&script, scope, enable, user_input),
            ExtEvent::TypeToggle {
                scope,
                enable,
                user_input,
            } => self.toggle_type(scope, enable, user_input),
            ExtEvent::ScriptImport {
                file_name,
                content,
                scope,
            } => self.import_script(&content, &file_name, scope).map(|_| ()),
            ExtEvent::ScriptDelete { script_id, scope } => self.delete_script(&script_id, scope),
            ExtEvent::ScriptSave { script, scope } => self.save_script(&script, scope),
            ExtEvent::ScriptMove { script, from_scope } => {
                self.move_script(&script, from_scope).map(|_| ())
            }
            ExtEvent::UiLoaded => self.on_ui_loaded(),
            ExtEvent::Custom { name, fields } => {
                self.forward_custom_event(&name, &fields);
                Ok(())
            }
            // UI-bound notifications; nothing to do here.
            ExtEvent::ButtonAdd { .. }
            | ExtEvent::ButtonRemove { .. }
            | ExtEvent::UiRefresh { .. } => Ok(()),
        };

        match outcome {
            Ok(()) => {}
            Err(ExtError::Cancelled) => log::debug!("operation cancelled by user"),
            Err(e) => {
                log::error!("bus operation failed: {e}");
                self.host.notify(NotifyLevel::Error, &e.to_string());
            }
        }
    }

    /// Spawn the background monitors: a bus subscriber feeding
    /// [`handle_event`](Self::handle_event) and a periodic bridge-command
    /// pump. Requires a tokio runtime context.
    pub fn spawn_monitors(self: &Arc<Self>) {
        let orchestrator = Arc::clone(self);
        let mut events = orchestrator.bus.subscribe();
        let bus_task = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => orchestrator.handle_event(event),
                    Err(RecvError::Lagged(skipped)) => {
                        log::warn!("bus lagged, skipped {skipped} events");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        let orchestrator = Arc::clone(self);
        let pump_task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(COMMAND_PUMP_PERIOD);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                orchestrator.pump_commands();
            }
        });

        self.monitors.lock().extend([bus_task, pump_task]);
    }

    /// Full teardown: stop monitors and destroy every context.
    pub fn shutdown(&self) {
        for task in self.monitors.lock().drain(..) {
            task.abort();
        }
        let ids = self.sandbox.lock().context_ids();
        for id in ids {
            self.stop_context(&id);
        }
        self.sandbox.lock().clear_all();
    }
}

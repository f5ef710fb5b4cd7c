//! Keeps a UI's view of the active variable scope eventually consistent.
//!
//! Global, character, and message scopes have host change events; chat
//! metadata does not and can be mutated by code outside the extension, so
//! it is polled on a fixed period. Writes the UI itself makes are kept from
//! echoing back through either path: event/poll handlers are no-ops while
//! the internal-operation counter is raised, and poll-detected changes to
//! names recently marked as processed are skipped for a suppression window.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::Value;
use tavern_ext_config::SyncTuning;
use tavern_ext_host::{HostEvent, TavernHost};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::error::VarError;
use crate::scope::VarScope;
use crate::store::VariableStore;

/// Card operations the sync service drives on the consuming view.
pub trait VariableView: Send + Sync {
    /// A variable appeared.
    fn add_card(&self, name: &str, value: &Value);

    /// A variable disappeared.
    fn remove_card(&self, name: &str);

    /// A variable's value changed.
    fn update_card(&self, name: &str, old: &Value, new: &Value);

    /// Whether a card for `name` is already rendered. Second guard against
    /// double-adding a card the UI just created itself.
    fn has_card(&self, name: &str) -> bool;

    /// Suppress change animations while a scope switch repaints everything.
    fn set_animations_suppressed(&self, suppressed: bool);
}

/// Reentrant internal-operation marker.
///
/// A counter rather than a boolean: multi-step saves nest, and a boolean
/// would unlock too early when they do. Raised around every UI-initiated
/// write sequence; while above zero, the sync service treats any change
/// notification as already reflected in the UI.
#[derive(Clone, Default)]
pub struct InternalOps {
    count: Arc<AtomicUsize>,
}

impl InternalOps {
    /// Raise the marker; it stays raised until the guard drops.
    pub fn begin(&self) -> InternalOpGuard {
        self.count.fetch_add(1, Ordering::SeqCst);
        InternalOpGuard {
            count: Arc::clone(&self.count),
        }
    }

    /// Whether any internal operation is in flight.
    pub fn active(&self) -> bool {
        self.count.load(Ordering::SeqCst) > 0
    }
}

/// RAII guard from [`InternalOps::begin`]; lowers the counter on drop, so
/// the marker is released even on early return or panic.
pub struct InternalOpGuard {
    count: Arc<AtomicUsize>,
}

impl Drop for InternalOpGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Names the UI recently wrote itself, with lazy expiry.
struct ProcessedRecords {
    entries: HashMap<String, Instant>,
    last_gc: Instant,
    suppression: Duration,
    gc_interval: Duration,
}

impl ProcessedRecords {
    fn new(tuning: &SyncTuning) -> Self {
        Self {
            entries: HashMap::new(),
            last_gc: Instant::now(),
            suppression: tuning.processed_suppression(),
            gc_interval: tuning.processed_gc(),
        }
    }

    fn mark(&mut self, name: &str) {
        self.entries.insert(name.to_string(), Instant::now());
    }

    fn is_suppressed(&self, name: &str) -> bool {
        self.entries
            .get(name)
            .is_some_and(|stamp| stamp.elapsed() < self.suppression)
    }

    /// Drop expired records, at most once per GC interval.
    fn maybe_gc(&mut self) {
        if self.last_gc.elapsed() < self.gc_interval {
            return;
        }
        let suppression = self.suppression;
        self.entries.retain(|_, stamp| stamp.elapsed() < suppression);
        self.last_gc = Instant::now();
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Result of comparing a fresh snapshot against the cache.
#[derive(Debug, Default, PartialEq)]
pub struct VariableDiff {
    /// Keys in fresh but not in cache.
    pub added: Vec<(String, Value)>,
    /// Keys in cache but not in fresh.
    pub removed: Vec<String>,
    /// Keys in both with deep-unequal values: `(name, old, new)`.
    pub updated: Vec<(String, Value, Value)>,
}

impl VariableDiff {
    /// Whether there is nothing to dispatch.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.updated.is_empty()
    }
}

/// Top-level key diff between two variable documents.
///
/// Non-object documents are treated as empty.
pub fn diff_documents(cached: &Value, fresh: &Value) -> VariableDiff {
    let empty = serde_json::Map::new();
    let cached_map = cached.as_object().unwrap_or(&empty);
    let fresh_map = fresh.as_object().unwrap_or(&empty);

    let mut diff = VariableDiff::default();
    for (name, value) in fresh_map {
        match cached_map.get(name) {
            None => diff.added.push((name.clone(), value.clone())),
            Some(old) if old != value => {
                diff.updated.push((name.clone(), old.clone(), value.clone()));
            }
            Some(_) => {}
        }
    }
    for name in cached_map.keys() {
        if !fresh_map.contains_key(name) {
            diff.removed.push(name.clone());
        }
    }
    diff
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

struct SyncState {
    current_scope: Option<VarScope>,
    active: bool,
    switching: bool,
    /// Event-driven scopes with a bound handler.
    bound: HashSet<VarScope>,
    /// Whether the chat poll is monitoring.
    polling: bool,
    cache: HashMap<VarScope, Value>,
    processed: ProcessedRecords,
}

/// The sync service itself. One instance per variable panel.
pub struct VariableSyncService {
    store: VariableStore,
    view: Arc<dyn VariableView>,
    tuning: SyncTuning,
    internal_ops: InternalOps,
    state: Mutex<SyncState>,
    monitors: Mutex<Vec<JoinHandle<()>>>,
}

impl VariableSyncService {
    /// Create a service over `store`, driving `view`.
    pub fn new(store: VariableStore, view: Arc<dyn VariableView>, tuning: SyncTuning) -> Self {
        let processed = ProcessedRecords::new(&tuning);
        Self {
            store,
            view,
            tuning,
            internal_ops: InternalOps::default(),
            state: Mutex::new(SyncState {
                current_scope: None,
                active: false,
                switching: false,
                bound: HashSet::new(),
                polling: false,
                cache: HashMap::new(),
                processed,
            }),
            monitors: Mutex::new(Vec::new()),
        }
    }

    /// Shared handle to the internal-operation marker, for the UI layer to
    /// raise around its own save sequences.
    pub fn internal_ops(&self) -> InternalOps {
        self.internal_ops.clone()
    }

    /// The scope currently displayed, if any.
    pub fn current_scope(&self) -> Option<VarScope> {
        self.state.lock().current_scope
    }

    /// Cached snapshot for a scope, for diagnostics and tests.
    pub fn cached(&self, scope: VarScope) -> Option<Value> {
        self.state.lock().cache.get(&scope).cloned()
    }

    fn bind(state: &mut SyncState, scope: VarScope) {
        match scope {
            VarScope::Chat => state.polling = true,
            _ => {
                state.bound.insert(scope);
            }
        }
    }

    fn unbind(state: &mut SyncState, scope: VarScope) {
        match scope {
            VarScope::Chat => state.polling = false,
            _ => {
                state.bound.remove(&scope);
            }
        }
    }

    /// Switch the displayed scope.
    ///
    /// No-op when unchanged. Otherwise tears down the old scope's
    /// monitoring, fetches a fresh snapshot into the cache, re-establishes
    /// monitoring if the service is active, and returns the snapshot so the
    /// caller can render immediately. Stale notifications arriving during
    /// the switch are discarded by the switching guard.
    pub fn set_scope(&self, scope: VarScope) -> Result<Value, VarError> {
        {
            let mut state = self.state.lock();
            if state.current_scope == Some(scope) {
                return Ok(state.cache.get(&scope).cloned().unwrap_or_else(empty_object));
            }
            state.switching = true;
            if let Some(old) = state.current_scope {
                Self::unbind(&mut state, old);
            }
        }
        self.view.set_animations_suppressed(true);

        let fetched = self.store.get(scope, None);
        let result = {
            let mut state = self.state.lock();
            let result = match fetched {
                Ok(snapshot) => {
                    state.cache.insert(scope, snapshot.clone());
                    state.current_scope = Some(scope);
                    if state.active {
                        Self::bind(&mut state, scope);
                    }
                    Ok(snapshot)
                }
                Err(e) => {
                    log::warn!("scope switch to {scope} failed to fetch: {e}");
                    Err(e)
                }
            };
            state.switching = false;
            result
        };
        self.view.set_animations_suppressed(false);
        result
    }

    /// Start monitoring the current scope (panel became visible).
    pub fn activate(&self) {
        let mut state = self.state.lock();
        state.active = true;
        if let Some(scope) = state.current_scope {
            Self::bind(&mut state, scope);
        }
    }

    /// Stop monitoring without touching scope or cache (panel hidden).
    pub fn deactivate(&self) {
        let mut state = self.state.lock();
        state.active = false;
        if let Some(scope) = state.current_scope {
            Self::unbind(&mut state, scope);
        }
    }

    /// Record that the UI itself just wrote a chat variable, so the next
    /// poll ticks don't report it back as an external change.
    pub fn mark_processed(&self, name: &str) {
        self.state.lock().processed.mark(name);
    }

    /// Feed one host event through the sync pipeline.
    ///
    /// Called by the spawned monitor, or directly by tests.
    pub fn handle_host_event(&self, event: &HostEvent) {
        let (scope, payload) = match event {
            HostEvent::SettingsUpdated => (VarScope::Global, None),
            HostEvent::CharacterVariablesChanged { variables } => {
                (VarScope::Character, variables.clone())
            }
            HostEvent::MessageVariablesChanged {
                message_index,
                variables,
            } => {
                // The panel shows the latest message's payload.
                let latest = self.store.host().message_count().checked_sub(1);
                if Some(*message_index) != latest {
                    return;
                }
                (VarScope::Message, variables.clone())
            }
            _ => return,
        };

        {
            let state = self.state.lock();
            if self.internal_ops.active() || state.switching {
                return;
            }
            if state.current_scope != Some(scope) || !state.bound.contains(&scope) {
                return;
            }
        }

        let fresh = match payload {
            Some(variables) => variables,
            None => match self.store.get(scope, None) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    log::debug!("refetch for {scope} change skipped: {e}");
                    return;
                }
            },
        };

        // Re-check after the fetch: a switch may have started meanwhile,
        // and a stale notification must not corrupt the new scope's cache.
        let diff = {
            let mut state = self.state.lock();
            if self.internal_ops.active()
                || state.switching
                || state.current_scope != Some(scope)
                || !state.bound.contains(&scope)
            {
                return;
            }
            let cached = state.cache.get(&scope).cloned().unwrap_or_else(empty_object);
            let diff = diff_documents(&cached, &fresh);
            state.cache.insert(scope, fresh);
            diff
        };
        self.dispatch(&diff);
    }

    /// One chat-scope poll pass.
    ///
    /// Called by the spawned monitor on the configured period, or directly
    /// by tests.
    pub fn poll_tick(&self) {
        {
            let state = self.state.lock();
            if self.internal_ops.active() || state.switching {
                return;
            }
            if state.current_scope != Some(VarScope::Chat) || !state.polling {
                return;
            }
        }

        let fresh = match self.store.get(VarScope::Chat, None) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::debug!("chat poll fetch skipped: {e}");
                return;
            }
        };

        let diff = {
            let mut state = self.state.lock();
            if self.internal_ops.active()
                || state.switching
                || state.current_scope != Some(VarScope::Chat)
                || !state.polling
            {
                return;
            }
            state.processed.maybe_gc();
            let cached = state
                .cache
                .get(&VarScope::Chat)
                .cloned()
                .unwrap_or_else(empty_object);
            let mut diff = diff_documents(&cached, &fresh);
            // Skip changes the UI caused itself: suppression window first,
            // then the card-existence guard for adds.
            diff.added.retain(|(name, _)| {
                !state.processed.is_suppressed(name) && !self.view.has_card(name)
            });
            diff.updated
                .retain(|(name, _, _)| !state.processed.is_suppressed(name));
            state.cache.insert(VarScope::Chat, fresh);
            diff
        };
        self.dispatch(&diff);
    }

    fn dispatch(&self, diff: &VariableDiff) {
        for (name, value) in &diff.added {
            self.view.add_card(name, value);
        }
        for name in &diff.removed {
            self.view.remove_card(name);
        }
        for (name, old, new) in &diff.updated {
            self.view.update_card(name, old, new);
        }
    }

    /// Spawn the background monitors: one forwarding host events, one
    /// ticking the chat poll. Requires a tokio runtime context. The tasks
    /// are cheap no-ops while the service is inactive or on another scope.
    pub fn spawn_monitors(self: &Arc<Self>) {
        let service = Arc::clone(self);
        let mut events = service.store.host().subscribe();
        let event_task = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => service.handle_host_event(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        log::warn!("host event stream lagged, skipped {skipped}");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        let service = Arc::clone(self);
        let period = service.tuning.poll_interval();
        let poll_task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                service.poll_tick();
            }
        });

        self.monitors.lock().extend([event_task, poll_task]);
    }

    /// Tear everything down: monitors, bindings, cache, processed records.
    pub fn cleanup(&self) {
        for task in self.monitors.lock().drain(..) {
            task.abort();
        }
        let mut state = self.state.lock();
        state.bound.clear();
        state.polling = false;
        state.active = false;
        state.switching = false;
        state.current_scope = None;
        state.cache.clear();
        state.processed.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_diff_added_removed_updated() {
        let cached = json!({"keep": 1, "change": {"a": 1}, "drop": true});
        let fresh = json!({"keep": 1, "change": {"a": 2}, "new": "x"});
        let diff = diff_documents(&cached, &fresh);

        assert_eq!(diff.added, vec![("new".to_string(), json!("x"))]);
        assert_eq!(diff.removed, vec!["drop".to_string()]);
        assert_eq!(
            diff.updated,
            vec![("change".to_string(), json!({"a": 1}), json!({"a": 2}))]
        );
    }

    #[test]
    fn test_diff_deep_equal_values_are_not_updates() {
        let cached = json!({"obj": {"a": [1, 2]}});
        let fresh = json!({"obj": {"a": [1, 2]}});
        assert!(diff_documents(&cached, &fresh).is_empty());
    }

    #[test]
    fn test_diff_tolerates_non_object_documents() {
        let diff = diff_documents(&json!(null), &json!({"a": 1}));
        assert_eq!(diff.added.len(), 1);
        assert!(diff.removed.is_empty());
    }

    #[test]
    fn test_internal_ops_nesting() {
        let ops = InternalOps::default();
        assert!(!ops.active());
        let outer = ops.begin();
        {
            let _inner = ops.begin();
            assert!(ops.active());
        }
        // Inner guard dropped; outer still holds the marker.
        assert!(ops.active());
        drop(outer);
        assert!(!ops.active());
    }

    #[test]
    fn test_processed_records_suppress_then_expire() {
        let tuning = SyncTuning {
            poll_interval_ms: 10,
            processed_suppression_ms: 0,
            processed_gc_ms: 0,
        };
        let mut records = ProcessedRecords::new(&tuning);
        records.mark("counter");
        // Zero-length window: already expired.
        assert!(!records.is_suppressed("counter"));
        records.maybe_gc();
        assert!(records.entries.is_empty());
    }
}

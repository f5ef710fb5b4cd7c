//! Trailing-write debounce decorator around a persist call.
//!
//! The host's settings store is cheap to read but expensive to persist, and
//! UI interactions can request saves in rapid bursts. [`SaveDebouncer`]
//! wraps the persist closure: a request inside the quiet window is recorded
//! instead of executed, and [`flush`](SaveDebouncer::flush) (or the next
//! request outside the window) performs the pending write.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

struct DebounceState {
    last_persist: Option<Instant>,
    pending: bool,
}

/// Debounces calls to a persist closure.
pub struct SaveDebouncer {
    delay: Duration,
    persist: Box<dyn Fn() + Send + Sync>,
    state: Mutex<DebounceState>,
}

impl SaveDebouncer {
    /// Wrap `persist` with a quiet window of `delay`.
    pub fn new(delay: Duration, persist: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            delay,
            persist: Box::new(persist),
            state: Mutex::new(DebounceState {
                last_persist: None,
                pending: false,
            }),
        }
    }

    /// Request a persist.
    ///
    /// Executes immediately when outside the quiet window, otherwise marks
    /// the write pending for the next [`flush`](Self::flush) or request.
    pub fn request(&self) {
        let now = Instant::now();
        let run = {
            let mut state = self.state.lock();
            let quiet = state
                .last_persist
                .is_some_and(|last| now.duration_since(last) < self.delay);
            if quiet {
                log::trace!("debouncing persist request");
                state.pending = true;
                false
            } else {
                state.last_persist = Some(now);
                state.pending = false;
                true
            }
        };
        if run {
            (self.persist)();
        }
    }

    /// Perform any pending write immediately.
    pub fn flush(&self) {
        let run = {
            let mut state = self.state.lock();
            if state.pending {
                state.pending = false;
                state.last_persist = Some(Instant::now());
                true
            } else {
                false
            }
        };
        if run {
            (self.persist)();
        }
    }

    /// Whether a request is waiting for the quiet window to elapse.
    pub fn has_pending(&self) -> bool {
        self.state.lock().pending
    }
}

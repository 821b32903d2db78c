/// Aggregates per-process start/stop notifications into one running flag.
///
/// The tracker keeps the set of watched PIDs whose start was seen and whose
/// stop was not. Its listener is only called when that set crosses between
/// empty and non-empty: the first start fires `true`, the last stop fires
/// `false`, every other membership change is silent.
///
/// Duplicate starts and stops for unknown PIDs are ignored, so replayed or
/// out-of-order notifications from the event source cannot skew the count.
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::coordinator::RunningStateListener;

pub struct ProcessStateTracker {
    active: Mutex<HashSet<u32>>,
    listener: Arc<dyn RunningStateListener>,
}

impl ProcessStateTracker {
    pub fn new(listener: Arc<dyn RunningStateListener>) -> Self {
        Self {
            active: Mutex::new(HashSet::new()),
            listener,
        }
    }

    /// Initialization hook. Does not change state or notify the listener.
    pub fn on_startup(&self) {
        tracing::info!("Process state tracker ready");
    }

    pub fn on_process_started(&self, pid: u32, name: &str) {
        let mut active = self.lock();
        if !active.insert(pid) {
            tracing::debug!(pid, name, "Duplicate start notification ignored");
            return;
        }
        tracing::info!(pid, name, active = active.len(), "Watched process started");

        // The set is already updated; the listener runs under the lock so
        // transitions reach it in the order they happened.
        if active.len() == 1 {
            self.listener.update_running_state(true);
        }
    }

    pub fn on_process_stopped(&self, pid: u32, name: &str) {
        let mut active = self.lock();
        if !active.remove(&pid) {
            tracing::debug!(pid, name, "Stop for untracked process ignored");
            return;
        }
        tracing::info!(pid, name, active = active.len(), "Watched process stopped");

        if active.is_empty() {
            self.listener.update_running_state(false);
        }
    }

    pub fn is_running(&self) -> bool {
        !self.lock().is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<u32>> {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use sysinfo::{ProcessesToUpdate, System};
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::event::DaemonEvent;
use crate::process_name::{executable_match_key, ProcessName};
use crate::settings_change::SettingsChangeHandler;
use crate::validation::AppSettings;

/// Watched PIDs and their executable names as seen by one poll.
pub type Snapshot = HashMap<u32, String>;

/// The set of executable names that count as watched processes.
///
/// Lookups are case-insensitive and ignore the extension, so `CS2.EXE` in the
/// process list matches `cs2` in config. Replaced wholesale on every accepted
/// settings change.
#[derive(Default)]
pub struct ProcessWatcher {
    names: RwLock<HashSet<String>>,
}

impl ProcessWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_names(&self, names: &[ProcessName]) {
        let keys: HashSet<String> = names.iter().map(ProcessName::match_key).collect();
        tracing::info!(
            names = ?names.iter().map(ProcessName::as_str).collect::<Vec<_>>(),
            "Watched process names updated"
        );
        *self
            .names
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = keys;
    }

    #[cfg(test)]
    pub fn is_watched(&self, exe_name: &str) -> bool {
        self.names
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(&executable_match_key(exe_name))
    }

    pub fn watched_count(&self) -> usize {
        self.names
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Filters `(pid, exe name)` pairs down to watched processes.
    pub fn snapshot<'a, I>(&self, processes: I) -> Snapshot
    where
        I: IntoIterator<Item = (u32, &'a str)>,
    {
        let names = self
            .names
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        processes
            .into_iter()
            .filter(|(_, exe)| names.contains(&executable_match_key(exe)))
            .map(|(pid, exe)| (pid, exe.to_string()))
            .collect()
    }
}

impl SettingsChangeHandler for ProcessWatcher {
    fn on_settings_changed(&self, settings: &AppSettings) -> anyhow::Result<()> {
        self.set_names(&settings.process_names);
        Ok(())
    }
}

/// Start/stop events that turn `previous` into `current`.
///
/// A PID whose executable name changed between polls (PID reuse) yields a
/// stop for the old process followed by a start for the new one.
pub fn diff(previous: &Snapshot, current: &Snapshot) -> Vec<DaemonEvent> {
    let mut events = Vec::new();

    let mut stopped: Vec<_> = previous
        .iter()
        .filter(|(pid, name)| current.get(*pid) != Some(*name))
        .collect();
    stopped.sort_by_key(|(pid, _)| **pid);
    events.extend(stopped.into_iter().map(|(pid, name)| DaemonEvent::ProcessStopped {
        pid: *pid,
        name: name.clone(),
    }));

    let mut started: Vec<_> = current
        .iter()
        .filter(|(pid, name)| previous.get(*pid) != Some(*name))
        .collect();
    started.sort_by_key(|(pid, _)| **pid);
    events.extend(started.into_iter().map(|(pid, name)| DaemonEvent::ProcessStarted {
        pid: *pid,
        name: name.clone(),
    }));

    events
}

/// Polls the OS process list every `poll_interval` and emits
/// [`DaemonEvent::ProcessStarted`] / [`DaemonEvent::ProcessStopped`] for each
/// watched process instance that appears or disappears.
///
/// Every instance is reported; aggregation into a single running flag is the
/// tracker's job. Exits when the receiving side of `tx` is dropped.
pub async fn run(
    watcher: Arc<ProcessWatcher>,
    poll_interval: Duration,
    tx: mpsc::Sender<DaemonEvent>,
) {
    let mut sys = System::new();
    let mut previous = Snapshot::new();
    let mut ticker = interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::debug!(?poll_interval, "Process monitor started");

    loop {
        ticker.tick().await;

        sys.refresh_processes(ProcessesToUpdate::All, true);
        let current = watcher.snapshot(sys.processes().iter().filter_map(|(pid, p)| {
            p.name().to_str().map(|name| (pid.as_u32(), name))
        }));

        for event in diff(&previous, &current) {
            if tx.send(event).await.is_err() {
                tracing::debug!("Event channel closed; process monitor exiting");
                return;
            }
        }
        previous = current;
    }
}

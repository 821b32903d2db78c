/// One-shot bootstrap that primes the process watcher from the initial
/// settings, runs the tracker's startup hook, and subscribes the watcher to
/// later settings changes so config edits take effect without a restart.
use std::sync::Arc;

use anyhow::Result;

use crate::process_monitor::ProcessWatcher;
use crate::settings_change::{SettingsChangeCoordinator, SettingsChangeHandler};
use crate::tracker::ProcessStateTracker;
use crate::validation::AppSettings;

pub struct StartupTrigger {
    watcher: Arc<ProcessWatcher>,
    tracker: Arc<ProcessStateTracker>,
}

impl StartupTrigger {
    pub fn new(watcher: Arc<ProcessWatcher>, tracker: Arc<ProcessStateTracker>) -> Arc<Self> {
        Arc::new(Self { watcher, tracker })
    }

    pub fn fire(
        self: &Arc<Self>,
        current: &AppSettings,
        changes: &SettingsChangeCoordinator,
    ) -> Result<()> {
        self.watcher.on_settings_changed(current)?;
        self.tracker.on_startup();
        changes.register(Arc::clone(self) as Arc<dyn SettingsChangeHandler>);
        tracing::info!(
            watched = self.watcher.watched_count(),
            "Startup complete; listening for settings changes"
        );
        Ok(())
    }
}

impl SettingsChangeHandler for StartupTrigger {
    fn on_settings_changed(&self, settings: &AppSettings) -> Result<()> {
        self.watcher.on_settings_changed(settings)
    }
}

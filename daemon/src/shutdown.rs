use std::sync::atomic::{AtomicBool, Ordering};

use crate::coordinator::RunningStateListener;
use crate::settings_change::SettingsChangeHandler;
use crate::tracker::ProcessStateTracker;
use crate::validation::AppSettings;

/// Whether the daemon hands the keyboard back in the default profile when it
/// exits while fast mode is engaged. Follows `general.restore_on_exit` across
/// accepted reloads.
pub struct ExitRestore {
    enabled: AtomicBool,
}

impl ExitRestore {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Drives `listener` to Default if restoring is enabled and the tracker
    /// still sees a watched process. Returns true if it did.
    pub fn restore_default(
        &self,
        tracker: &ProcessStateTracker,
        listener: &dyn RunningStateListener,
    ) -> bool {
        if !self.is_enabled() || !tracker.is_running() {
            return false;
        }
        tracing::info!(
            active = tracker.active_count(),
            "Restoring default keyboard profile before exit"
        );
        listener.update_running_state(false);
        true
    }
}

impl SettingsChangeHandler for ExitRestore {
    fn on_settings_changed(&self, settings: &AppSettings) -> anyhow::Result<()> {
        self.enabled.store(settings.restore_on_exit, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, GeneralConfig, KeyRepeatConfig};
    use crate::coordinator::tests::RecordingApplier;
    use crate::coordinator::ModeCoordinator;
    use crate::key_repeat::{KeyRepeatSettings, KeyRepeatState};
    use crate::settings_change::SettingsChangeCoordinator;
    use crate::validation::ConfigValidator;
    use std::sync::Arc;

    const DEFAULT: KeyRepeatState = KeyRepeatState::new(20, 1000);
    const FAST: KeyRepeatState = KeyRepeatState::new(31, 250);

    fn wiring(applier: &RecordingApplier) -> (Arc<ModeCoordinator>, ProcessStateTracker) {
        let coordinator = Arc::new(ModeCoordinator::new(
            KeyRepeatSettings {
                default: DEFAULT,
                fast_mode: FAST,
            },
            Box::new(applier.clone()),
        ));
        let tracker = ProcessStateTracker::new(coordinator.clone());
        (coordinator, tracker)
    }

    #[test]
    fn restores_default_when_enabled_and_running() {
        let applier = RecordingApplier::default();
        let (coordinator, tracker) = wiring(&applier);
        tracker.on_process_started(1111, "cs2.exe");

        assert!(ExitRestore::new(true).restore_default(&tracker, &*coordinator));
        assert_eq!(applier.calls(), vec![FAST, DEFAULT]);
    }

    #[test]
    fn leaves_fast_mode_when_disabled() {
        let applier = RecordingApplier::default();
        let (coordinator, tracker) = wiring(&applier);
        tracker.on_process_started(1111, "cs2.exe");

        assert!(!ExitRestore::new(false).restore_default(&tracker, &*coordinator));
        assert_eq!(applier.calls(), vec![FAST]);
    }

    #[test]
    fn nothing_to_restore_when_not_running() {
        let applier = RecordingApplier::default();
        let (coordinator, tracker) = wiring(&applier);
        tracker.on_process_started(1111, "cs2.exe");
        tracker.on_process_stopped(1111, "cs2.exe");

        assert!(!ExitRestore::new(true).restore_default(&tracker, &*coordinator));
        assert_eq!(applier.calls(), vec![FAST, DEFAULT]);
    }

    #[test]
    fn accepted_reload_updates_flag_and_rejected_keeps_it() {
        let restore = Arc::new(ExitRestore::new(true));
        let changes = SettingsChangeCoordinator::new(Box::new(ConfigValidator));
        changes.register(restore.clone());

        let config = |restore_on_exit, fast| Config {
            process_names: vec!["cs2".to_string()],
            general: GeneralConfig {
                restore_on_exit,
                ..GeneralConfig::default()
            },
            key_repeat: KeyRepeatConfig {
                default: Some(DEFAULT),
                fast_mode: Some(fast),
            },
        };

        changes.handle_settings_change(&config(false, FAST));
        assert!(!restore.is_enabled());

        changes.handle_settings_change(&config(true, KeyRepeatState::new(32, 250)));
        assert!(!restore.is_enabled());

        changes.handle_settings_change(&config(true, FAST));
        assert!(restore.is_enabled());
    }
}

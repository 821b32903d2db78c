/// Bridges the aggregated running flag to an applied keyboard profile.
///
/// [`ModeCoordinator`] owns the current [`KeyRepeatSettings`] snapshot. A
/// settings change swaps the snapshot under the same lock that transitions
/// read it through, so a transition never sees a half-updated profile.
///
/// Applier failures are logged and swallowed. Nothing raised by the OS layer
/// reaches the tracker or the event loop that called in.
use std::sync::Mutex;

use crate::applier::SettingsApplier;
use crate::key_repeat::{KeyRepeatSettings, KeyRepeatState};
use crate::mode::{self, Mode};
use crate::settings_change::SettingsChangeHandler;
use crate::validation::AppSettings;

/// Receiver of edge-triggered running-state transitions.
pub trait RunningStateListener: Send + Sync {
    fn update_running_state(&self, is_running: bool);
}

struct CoordinatorState {
    settings: KeyRepeatSettings,
    apply_changes_immediately: bool,
    /// Mode of the most recent transition, whether or not the apply succeeded.
    last_mode: Option<Mode>,
}

pub struct ModeCoordinator {
    applier: Box<dyn SettingsApplier>,
    state: Mutex<CoordinatorState>,
}

impl ModeCoordinator {
    pub fn new(settings: KeyRepeatSettings, applier: Box<dyn SettingsApplier>) -> Self {
        Self {
            applier,
            state: Mutex::new(CoordinatorState {
                settings,
                apply_changes_immediately: false,
                last_mode: None,
            }),
        }
    }

    /// Re-apply the active mode whenever settings change, instead of waiting
    /// for the next transition.
    pub fn with_apply_changes_immediately(self, enabled: bool) -> Self {
        self.lock().apply_changes_immediately = enabled;
        self
    }

    #[cfg(test)]
    pub fn settings(&self) -> KeyRepeatSettings {
        self.lock().settings
    }

    #[cfg(test)]
    pub fn last_mode(&self) -> Option<Mode> {
        self.lock().last_mode
    }

    /// Replaces the cached settings used by later transitions.
    #[cfg(test)]
    pub fn replace_settings(&self, settings: KeyRepeatSettings) {
        let mut state = self.lock();
        self.swap_settings(&mut state, settings);
    }

    /// Swaps the profile pair under an already held guard and, when enabled,
    /// re-applies the mode of the last transition.
    fn swap_settings(&self, state: &mut CoordinatorState, settings: KeyRepeatSettings) {
        state.settings = settings;

        if !state.apply_changes_immediately {
            return;
        }
        if let Some(mode) = state.last_mode {
            let target = mode.profile(&state.settings);
            tracing::info!(%mode, "Re-applying active mode after settings change");
            self.apply_logged(mode, target);
        }
    }

    fn apply_logged(&self, mode: Mode, target: KeyRepeatState) {
        match self.applier.apply(target) {
            Ok(()) => tracing::info!(
                %mode,
                speed = target.repeat_speed,
                delay = target.repeat_delay,
                "Keyboard mode applied"
            ),
            Err(e) => tracing::error!(
                %mode,
                speed = target.repeat_speed,
                delay = target.repeat_delay,
                error = %e,
                "Failed to apply keyboard mode"
            ),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CoordinatorState> {
        // Settings are plain data; a panic elsewhere cannot leave them torn.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl RunningStateListener for ModeCoordinator {
    fn update_running_state(&self, is_running: bool) {
        let mut state = self.lock();
        let mode = Mode::for_running(is_running);
        let target = mode::target_state(is_running, &state.settings);
        state.last_mode = Some(mode);
        tracing::debug!(mode = mode::mode_name(is_running), "Running state changed");
        self.apply_logged(mode, target);
    }
}

impl SettingsChangeHandler for ModeCoordinator {
    fn on_settings_changed(&self, settings: &AppSettings) -> anyhow::Result<()> {
        let mut state = self.lock();
        state.apply_changes_immediately = settings.apply_changes_immediately;
        self.swap_settings(&mut state, settings.key_repeat);
        Ok(())
    }
}

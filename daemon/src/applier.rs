/// Applies a keyboard repeat profile to the OS.
///
/// The core only sees the [`SettingsApplier`] trait. [`SystemApplier`] is the
/// Windows implementation backed by `SystemParametersInfoW`; it retries a few
/// times with exponential backoff before giving up with an [`ApplyError`].
///
/// On non-Windows platforms the applier compiles and succeeds as a no-op.
use std::time::Duration;

use thiserror::Error;

use crate::key_repeat::{
    KeyRepeatState, MAX_REPEAT_DELAY_MS, MAX_REPEAT_SPEED, MIN_REPEAT_DELAY_MS, MIN_REPEAT_SPEED,
};

pub const DEFAULT_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(100);

/// OS delay index step; `SPI_SETKEYBOARDDELAY` takes 0..=3 for 250..=1000 ms.
const DELAY_STEP_MS: i32 = 250;

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("{call} failed: {message}")]
    Os { call: &'static str, message: String },
    #[error("giving up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<ApplyError>,
    },
}

pub trait SettingsApplier: Send + Sync {
    fn apply(&self, state: KeyRepeatState) -> Result<(), ApplyError>;
}

/// Bounded retry-with-backoff used by the OS applier.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Delay slept after the given failed attempt (1-based): base, 2x base, 4x base...
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }

    /// Runs `op` until it succeeds or `attempts` is reached.
    pub fn run<F>(&self, mut op: F) -> Result<(), ApplyError>
    where
        F: FnMut() -> Result<(), ApplyError>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match op() {
                Ok(()) => return Ok(()),
                Err(e) if attempt >= attempts => {
                    return Err(ApplyError::RetriesExhausted {
                        attempts,
                        last: Box::new(e),
                    });
                }
                Err(e) => {
                    let wait = self.backoff(attempt);
                    tracing::warn!(
                        attempt,
                        ?wait,
                        error = %e,
                        "Keyboard settings apply failed, retrying"
                    );
                    std::thread::sleep(wait);
                    attempt += 1;
                }
            }
        }
    }
}

/// Converts a delay in milliseconds to the nearest OS delay index (0..=3).
pub fn delay_index(delay_ms: i32) -> u32 {
    let clamped = delay_ms.clamp(MIN_REPEAT_DELAY_MS, MAX_REPEAT_DELAY_MS);
    ((clamped - MIN_REPEAT_DELAY_MS + DELAY_STEP_MS / 2) / DELAY_STEP_MS) as u32
}

/// Converts an OS delay index back to milliseconds.
#[cfg_attr(not(windows), allow(dead_code))]
pub fn delay_ms(index: u32) -> i32 {
    (index.min(3) as i32 + 1) * DELAY_STEP_MS
}

pub struct SystemApplier {
    retry: RetryPolicy,
}

impl SystemApplier {
    pub fn new(retry: RetryPolicy) -> Self {
        Self { retry }
    }

    /// Reads the profile currently active in the OS. `None` where unsupported.
    pub fn current(&self) -> Option<KeyRepeatState> {
        imp::read()
    }
}

impl Default for SystemApplier {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl SettingsApplier for SystemApplier {
    fn apply(&self, state: KeyRepeatState) -> Result<(), ApplyError> {
        let speed = state.repeat_speed.clamp(MIN_REPEAT_SPEED, MAX_REPEAT_SPEED) as u32;
        let delay = delay_index(state.repeat_delay);
        self.retry.run(|| imp::write(speed, delay))?;
        tracing::info!(speed, delay_index = delay, "Applied keyboard repeat settings");
        Ok(())
    }
}

// ── Windows implementation ─────────────────────────────────────────────────────

#[cfg(windows)]
mod imp {
    use super::{delay_ms, ApplyError};
    use crate::key_repeat::KeyRepeatState;
    use windows::Win32::UI::WindowsAndMessaging::{
        SystemParametersInfoW, SPIF_SENDCHANGE, SPIF_UPDATEINIFILE, SPI_GETKEYBOARDDELAY,
        SPI_GETKEYBOARDSPEED, SPI_SETKEYBOARDDELAY, SPI_SETKEYBOARDSPEED,
        SYSTEM_PARAMETERS_INFO_UPDATE_FLAGS,
    };

    pub fn write(speed: u32, delay_index: u32) -> Result<(), ApplyError> {
        let flags = SPIF_UPDATEINIFILE | SPIF_SENDCHANGE;
        unsafe { SystemParametersInfoW(SPI_SETKEYBOARDSPEED, speed, None, flags) }.map_err(|e| {
            ApplyError::Os {
                call: "SPI_SETKEYBOARDSPEED",
                message: e.to_string(),
            }
        })?;
        unsafe { SystemParametersInfoW(SPI_SETKEYBOARDDELAY, delay_index, None, flags) }.map_err(
            |e| ApplyError::Os {
                call: "SPI_SETKEYBOARDDELAY",
                message: e.to_string(),
            },
        )
    }

    pub fn read() -> Option<KeyRepeatState> {
        let mut speed: u32 = 0;
        let mut delay: u32 = 0;
        let none = SYSTEM_PARAMETERS_INFO_UPDATE_FLAGS(0);
        unsafe {
            SystemParametersInfoW(
                SPI_GETKEYBOARDSPEED,
                0,
                Some(&mut speed as *mut u32 as *mut _),
                none,
            )
            .ok()?;
            SystemParametersInfoW(
                SPI_GETKEYBOARDDELAY,
                0,
                Some(&mut delay as *mut u32 as *mut _),
                none,
            )
            .ok()?;
        }
        Some(KeyRepeatState::new(speed as i32, delay_ms(delay)))
    }
}

#[cfg(not(windows))]
mod imp {
    use super::ApplyError;
    use crate::key_repeat::KeyRepeatState;

    pub fn write(speed: u32, delay_index: u32) -> Result<(), ApplyError> {
        tracing::debug!(speed, delay_index, "Keyboard repeat settings are only applied on Windows");
        Ok(())
    }

    pub fn read() -> Option<KeyRepeatState> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn fast_policy(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            base_delay: Duration::from_millis(1),
        }
    }

    fn os_error() -> ApplyError {
        ApplyError::Os {
            call: "test",
            message: "denied".to_string(),
        }
    }

    // ── delay mapping ─────────────────────────────────────────────────────────

    #[test]
    fn delay_index_maps_exact_steps() {
        assert_eq!(delay_index(250), 0);
        assert_eq!(delay_index(500), 1);
        assert_eq!(delay_index(750), 2);
        assert_eq!(delay_index(1000), 3);
    }

    #[test]
    fn delay_index_rounds_to_nearest_step() {
        assert_eq!(delay_index(374), 0);
        assert_eq!(delay_index(375), 1);
        assert_eq!(delay_index(600), 1);
        assert_eq!(delay_index(900), 3);
    }

    #[test]
    fn delay_index_clamps_out_of_range() {
        assert_eq!(delay_index(0), 0);
        assert_eq!(delay_index(5000), 3);
    }

    #[test]
    fn delay_ms_inverts_index() {
        for index in 0..=3 {
            assert_eq!(delay_index(delay_ms(index)), index);
        }
        assert_eq!(delay_ms(9), 1000);
    }

    // ── RetryPolicy ───────────────────────────────────────────────────────────

    #[test]
    fn backoff_doubles_each_attempt() {
        let policy = RetryPolicy {
            attempts: 4,
            base_delay: Duration::from_millis(100),
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
    }

    #[test]
    fn retry_stops_on_first_success() {
        let calls = Cell::new(0);
        let result = fast_policy(3).run(|| {
            calls.set(calls.get() + 1);
            Ok(())
        });
        assert!(result.is_ok());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn retry_recovers_from_transient_failure() {
        let calls = Cell::new(0);
        let result = fast_policy(3).run(|| {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(os_error())
            } else {
                Ok(())
            }
        });
        assert!(result.is_ok());
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn retry_gives_up_after_configured_attempts() {
        let calls = Cell::new(0);
        let result = fast_policy(3).run(|| {
            calls.set(calls.get() + 1);
            Err(os_error())
        });
        assert_eq!(calls.get(), 3);
        match result {
            Err(ApplyError::RetriesExhausted { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
    }

    #[test]
    fn retry_with_zero_attempts_still_tries_once() {
        let calls = Cell::new(0);
        let _ = fast_policy(0).run(|| {
            calls.set(calls.get() + 1);
            Err(os_error())
        });
        assert_eq!(calls.get(), 1);
    }
}

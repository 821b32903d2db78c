use serde::{Deserialize, Serialize};

pub const MIN_REPEAT_SPEED: i32 = 0;
pub const MAX_REPEAT_SPEED: i32 = 31;
pub const MIN_REPEAT_DELAY_MS: i32 = 250;
pub const MAX_REPEAT_DELAY_MS: i32 = 1000;

/// One keyboard repeat profile.
///
/// Fields are signed so that out-of-range config values (e.g. `-1`) survive
/// parsing and are reported by validation instead of a serde error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRepeatState {
    /// Repeat rate, 0 (slowest) to 31 (fastest).
    pub repeat_speed: i32,
    /// Delay before repeating starts, in milliseconds (250 to 1000).
    pub repeat_delay: i32,
}

impl KeyRepeatState {
    pub const fn new(repeat_speed: i32, repeat_delay: i32) -> Self {
        Self { repeat_speed, repeat_delay }
    }
}

/// The two named profiles. Only ever built from validated config, so both are
/// always present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyRepeatSettings {
    pub default: KeyRepeatState,
    pub fast_mode: KeyRepeatState,
}

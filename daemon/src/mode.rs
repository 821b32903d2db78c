/// Maps the aggregated "any watched process running" flag to a repeat profile.
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::key_repeat::{KeyRepeatSettings, KeyRepeatState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Default,
    FastMode,
}

impl Mode {
    pub fn for_running(is_running: bool) -> Self {
        if is_running {
            Mode::FastMode
        } else {
            Mode::Default
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Default => "Default",
            Mode::FastMode => "FastMode",
        }
    }

    pub fn profile(self, settings: &KeyRepeatSettings) -> KeyRepeatState {
        match self {
            Mode::Default => settings.default,
            Mode::FastMode => settings.fast_mode,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn target_state(is_running: bool, settings: &KeyRepeatSettings) -> KeyRepeatState {
    Mode::for_running(is_running).profile(settings)
}

pub fn mode_name(is_running: bool) -> &'static str {
    Mode::for_running(is_running).as_str()
}

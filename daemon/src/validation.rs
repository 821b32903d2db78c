/// Turns a parsed [`Config`] into validated [`AppSettings`].
///
/// Every failure is collected rather than stopping at the first, so a bad
/// reload can be reported in one pass.
use std::collections::HashSet;
use std::time::Duration;

use thiserror::Error;

use crate::config::Config;
use crate::key_repeat::{
    KeyRepeatSettings, KeyRepeatState, MAX_REPEAT_DELAY_MS, MAX_REPEAT_SPEED,
    MIN_REPEAT_DELAY_MS, MIN_REPEAT_SPEED,
};
use crate::process_name::ProcessName;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{property}: {message}")]
pub struct ValidationFailure {
    pub property: String,
    pub message: String,
}

impl ValidationFailure {
    fn new(property: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            message: message.into(),
        }
    }
}

/// Settings that passed validation. Handlers only ever see this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppSettings {
    pub process_names: Vec<ProcessName>,
    pub key_repeat: KeyRepeatSettings,
    pub apply_changes_immediately: bool,
    pub restore_on_exit: bool,
    pub poll_interval: Duration,
}

pub trait SettingsValidator: Send + Sync {
    fn validate(&self, config: &Config) -> Result<AppSettings, Vec<ValidationFailure>>;
}

/// Range and shape checks for the on-disk config.
pub struct ConfigValidator;

impl SettingsValidator for ConfigValidator {
    fn validate(&self, config: &Config) -> Result<AppSettings, Vec<ValidationFailure>> {
        let mut failures = Vec::new();

        let mut seen = HashSet::new();
        let mut process_names = Vec::new();
        for (i, raw) in config.process_names.iter().enumerate() {
            match ProcessName::new(raw) {
                // Duplicates differing only in case or extension collapse to one.
                Ok(name) => {
                    if seen.insert(name.match_key()) {
                        process_names.push(name);
                    }
                }
                Err(e) => failures.push(ValidationFailure::new(
                    format!("process_names[{i}]"),
                    e.to_string(),
                )),
            }
        }

        let default = check_profile("key_repeat.default", config.key_repeat.default, &mut failures);
        let fast_mode =
            check_profile("key_repeat.fast_mode", config.key_repeat.fast_mode, &mut failures);

        match (default, fast_mode) {
            (Some(default), Some(fast_mode)) if failures.is_empty() => Ok(AppSettings {
                process_names,
                key_repeat: KeyRepeatSettings { default, fast_mode },
                apply_changes_immediately: config.general.apply_changes_immediately,
                restore_on_exit: config.general.restore_on_exit,
                poll_interval: config.general.effective_poll_interval(),
            }),
            _ => Err(failures),
        }
    }
}

fn check_profile(
    property: &str,
    state: Option<KeyRepeatState>,
    failures: &mut Vec<ValidationFailure>,
) -> Option<KeyRepeatState> {
    let Some(state) = state else {
        failures.push(ValidationFailure::new(property, "profile is required"));
        return None;
    };

    let before = failures.len();
    if !(MIN_REPEAT_SPEED..=MAX_REPEAT_SPEED).contains(&state.repeat_speed) {
        failures.push(ValidationFailure::new(
            format!("{property}.repeat_speed"),
            format!(
                "{} is outside {MIN_REPEAT_SPEED}..={MAX_REPEAT_SPEED}",
                state.repeat_speed
            ),
        ));
    }
    if !(MIN_REPEAT_DELAY_MS..=MAX_REPEAT_DELAY_MS).contains(&state.repeat_delay) {
        failures.push(ValidationFailure::new(
            format!("{property}.repeat_delay"),
            format!(
                "{} ms is outside {MIN_REPEAT_DELAY_MS}..={MAX_REPEAT_DELAY_MS} ms",
                state.repeat_delay
            ),
        ));
    }

    (failures.len() == before).then_some(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KeyRepeatConfig;

    fn config_with(default: KeyRepeatState, fast_mode: KeyRepeatState) -> Config {
        Config {
            process_names: vec!["game.exe".to_string()],
            key_repeat: KeyRepeatConfig {
                default: Some(default),
                fast_mode: Some(fast_mode),
            },
            ..Config::default()
        }
    }

    fn validate(config: &Config) -> Result<AppSettings, Vec<ValidationFailure>> {
        ConfigValidator.validate(config)
    }

    fn properties(failures: &[ValidationFailure]) -> Vec<&str> {
        failures.iter().map(|f| f.property.as_str()).collect()
    }

    #[test]
    fn valid_config_produces_settings() {
        let config = config_with(KeyRepeatState::new(20, 1000), KeyRepeatState::new(10, 500));
        let settings = validate(&config).unwrap();
        assert_eq!(settings.key_repeat.default, KeyRepeatState::new(20, 1000));
        assert_eq!(settings.key_repeat.fast_mode, KeyRepeatState::new(10, 500));
        assert_eq!(settings.process_names, vec![ProcessName::new("game").unwrap()]);
        assert!(!settings.apply_changes_immediately);
        assert!(settings.restore_on_exit);
    }

    #[test]
    fn inclusive_bounds_pass() {
        for (speed, delay) in [(0, 250), (31, 1000), (0, 1000), (31, 250)] {
            let state = KeyRepeatState::new(speed, delay);
            assert!(
                validate(&config_with(state, state)).is_ok(),
                "({speed}, {delay}) should pass"
            );
        }
    }

    #[test]
    fn speed_out_of_range_fails() {
        for speed in [-1, 32] {
            let bad = KeyRepeatState::new(speed, 500);
            let failures = validate(&config_with(KeyRepeatState::new(20, 500), bad)).unwrap_err();
            assert_eq!(properties(&failures), vec!["key_repeat.fast_mode.repeat_speed"]);
        }
    }

    #[test]
    fn delay_out_of_range_fails() {
        for delay in [200, 1050] {
            let bad = KeyRepeatState::new(20, delay);
            let failures = validate(&config_with(bad, KeyRepeatState::new(20, 500))).unwrap_err();
            assert_eq!(properties(&failures), vec!["key_repeat.default.repeat_delay"]);
        }
    }

    #[test]
    fn missing_profiles_are_reported_not_defaulted() {
        let config = Config {
            process_names: vec!["game".to_string()],
            ..Config::default()
        };
        let failures = validate(&config).unwrap_err();
        assert_eq!(
            properties(&failures),
            vec!["key_repeat.default", "key_repeat.fast_mode"]
        );
        assert!(failures.iter().all(|f| f.message == "profile is required"));
    }

    #[test]
    fn all_failures_are_collected() {
        let mut config = config_with(KeyRepeatState::new(-1, 200), KeyRepeatState::new(32, 1050));
        config.process_names = vec!["ok".to_string(), "bad name".to_string(), " ".to_string()];

        let failures = validate(&config).unwrap_err();

        assert_eq!(
            properties(&failures),
            vec![
                "process_names[1]",
                "process_names[2]",
                "key_repeat.default.repeat_speed",
                "key_repeat.default.repeat_delay",
                "key_repeat.fast_mode.repeat_speed",
                "key_repeat.fast_mode.repeat_delay",
            ]
        );
    }

    #[test]
    fn bad_process_name_alone_rejects_config() {
        let mut config = config_with(KeyRepeatState::new(20, 500), KeyRepeatState::new(31, 250));
        config.process_names.push("no/slashes".to_string());
        let failures = validate(&config).unwrap_err();
        assert_eq!(properties(&failures), vec!["process_names[1]"]);
    }

    #[test]
    fn duplicate_names_collapse() {
        let mut config = config_with(KeyRepeatState::new(20, 500), KeyRepeatState::new(31, 250));
        config.process_names = vec![
            "Game.exe".to_string(),
            "game".to_string(),
            "other".to_string(),
        ];
        let settings = validate(&config).unwrap();
        let names: Vec<_> = settings.process_names.iter().map(|n| n.as_str()).collect();
        assert_eq!(names, vec!["Game", "other"]);
    }

    #[test]
    fn empty_process_list_is_valid() {
        let mut config = config_with(KeyRepeatState::new(20, 500), KeyRepeatState::new(31, 250));
        config.process_names.clear();
        assert!(validate(&config).unwrap().process_names.is_empty());
    }

    #[test]
    fn failure_display_includes_property() {
        let failure = ValidationFailure::new("key_repeat.default", "profile is required");
        assert_eq!(failure.to_string(), "key_repeat.default: profile is required");
    }
}

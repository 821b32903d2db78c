/// Gate for live configuration changes.
///
/// A reloaded [`Config`] is validated first. Only a fully valid config is
/// turned into [`AppSettings`] and fanned out to every registered
/// [`SettingsChangeHandler`]; an invalid one is logged field-by-field and
/// dropped so the previous settings stay in effect.
use std::sync::{Arc, RwLock};

use crate::config::Config;
use crate::validation::{AppSettings, SettingsValidator};

pub trait SettingsChangeHandler: Send + Sync {
    fn on_settings_changed(&self, settings: &AppSettings) -> anyhow::Result<()>;

    /// Name used when logging a failure of this handler.
    fn handler_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Result of one [`SettingsChangeCoordinator::handle_settings_change`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOutcome {
    /// Validation failed; no handler was called.
    Rejected { failures: usize },
    /// Every handler was called; `handler_failures` of them returned an error.
    Applied { notified: usize, handler_failures: usize },
}

pub struct SettingsChangeCoordinator {
    validator: Box<dyn SettingsValidator>,
    handlers: RwLock<Vec<Arc<dyn SettingsChangeHandler>>>,
}

impl SettingsChangeCoordinator {
    pub fn new(validator: Box<dyn SettingsValidator>) -> Self {
        Self {
            validator,
            handlers: RwLock::new(Vec::new()),
        }
    }

    pub fn register(&self, handler: Arc<dyn SettingsChangeHandler>) {
        tracing::debug!(handler = handler.handler_name(), "Registered settings change handler");
        self.handlers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(handler);
    }

    #[cfg(test)]
    pub fn handler_count(&self) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn handle_settings_change(&self, config: &Config) -> ChangeOutcome {
        let settings = match self.validator.validate(config) {
            Ok(settings) => settings,
            Err(failures) => {
                for failure in &failures {
                    tracing::error!(
                        property = %failure.property,
                        message = %failure.message,
                        "Settings validation failed"
                    );
                }
                tracing::error!(
                    count = failures.len(),
                    "Rejected settings change; keeping previous settings"
                );
                return ChangeOutcome::Rejected {
                    failures: failures.len(),
                };
            }
        };

        // Snapshot so a handler may register further handlers without deadlocking.
        let handlers: Vec<_> = self
            .handlers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();

        let mut handler_failures = 0;
        for handler in &handlers {
            if let Err(e) = handler.on_settings_changed(&settings) {
                handler_failures += 1;
                tracing::error!(
                    handler = handler.handler_name(),
                    error = %format!("{e:#}"),
                    "Settings change handler failed"
                );
            }
        }

        tracing::info!(
            handlers = handlers.len(),
            failed = handler_failures,
            processes = settings.process_names.len(),
            "Settings change applied"
        );
        ChangeOutcome::Applied {
            notified: handlers.len(),
            handler_failures,
        }
    }
}

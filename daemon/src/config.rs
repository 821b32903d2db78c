use anyhow::{Context, Result};
use notify::{Config as NotifyConfig, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::event::DaemonEvent;
use crate::key_repeat::KeyRepeatState;

pub const MIN_POLL_INTERVAL_MS: u64 = 250;
pub const MAX_POLL_INTERVAL_MS: u64 = 60_000;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Root configuration structure. Deserialized from %APPDATA%\KeyRate\config.toml.
///
/// Parsed but not validated; see [`crate::validation`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Executables that engage fast mode while running (e.g. "cs2.exe").
    #[serde(default)]
    pub process_names: Vec<String>,
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub key_repeat: KeyRepeatConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    /// Process list polling interval. Clamped to [250, 60000].
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Default tracing filter when RUST_LOG is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Re-apply the active profile as soon as it changes on disk.
    #[serde(default)]
    pub apply_changes_immediately: bool,
    /// Switch back to the default profile when the daemon exits in fast mode.
    #[serde(default = "default_true")]
    pub restore_on_exit: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            apply_changes_immediately: false,
            restore_on_exit: true,
        }
    }
}

impl GeneralConfig {
    pub fn effective_poll_interval(&self) -> Duration {
        Duration::from_millis(
            self.poll_interval_ms
                .clamp(MIN_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS),
        )
    }
}

/// Both profiles are optional here so that a missing table is reported by
/// validation instead of failing the parse.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeyRepeatConfig {
    pub default: Option<KeyRepeatState>,
    pub fast_mode: Option<KeyRepeatState>,
}

/// Loads the config file at `path`, returning `Config::default()` if the file does not exist.
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Starter config written on first run. The default profile matches the
/// stock Windows keyboard settings.
pub const CONFIG_TEMPLATE: &str = r#"# Executables that switch the keyboard to fast mode while running.
process_names = []

[general]
poll_interval_ms = 2000
log_level = "info"
apply_changes_immediately = false
restore_on_exit = true

# repeat_speed: 0 (slowest) to 31 (fastest)
# repeat_delay: 250 to 1000 milliseconds
[key_repeat.default]
repeat_speed = 31
repeat_delay = 500

[key_repeat.fast_mode]
repeat_speed = 31
repeat_delay = 250
"#;

/// Writes [`CONFIG_TEMPLATE`] to `path` unless a file is already there.
/// Returns true if the template was written.
pub fn write_template_if_missing(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
    }
    std::fs::write(path, CONFIG_TEMPLATE)
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;
    Ok(true)
}

/// Spawns a file watcher on the parent directory of `path`. Whenever the config
/// file is created or modified, reparses it and sends a `ConfigReloaded` event.
/// Validation happens downstream.
pub async fn watch_config(path: PathBuf, tx: mpsc::Sender<DaemonEvent>) {
    let (watch_tx, mut watch_rx) = mpsc::channel::<notify::Event>(16);

    let mut watcher = match RecommendedWatcher::new(
        move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                let _ = watch_tx.blocking_send(event);
            }
        },
        NotifyConfig::default(),
    ) {
        Ok(w) => w,
        Err(e) => {
            tracing::error!(error = %e, "Failed to create config file watcher");
            return;
        }
    };

    // Editors save atomically (write-new + rename), so watch the directory.
    let Some(watch_dir) = path.parent().map(Path::to_path_buf) else {
        tracing::error!(path = %path.display(), "Config path has no parent directory");
        return;
    };

    if let Err(e) = watcher.watch(&watch_dir, RecursiveMode::NonRecursive) {
        tracing::error!(dir = %watch_dir.display(), error = %e, "Failed to watch config directory");
        return;
    }
    tracing::debug!(path = %path.display(), "Watching config file");

    while let Some(event) = watch_rx.recv().await {
        if !is_config_write(&event, &path) {
            continue;
        }
        match load_or_default(&path) {
            Ok(config) => {
                if tx.send(DaemonEvent::ConfigReloaded(config)).await.is_err() {
                    break;
                }
            }
            Err(e) => tracing::error!(error = %format!("{e:#}"), "Failed to reload config"),
        }
    }
}

fn is_config_write(event: &notify::Event, path: &Path) -> bool {
    let affects_config = event.paths.iter().any(|p| p == path);
    let is_write = matches!(
        event.kind,
        notify::EventKind::Create(_) | notify::EventKind::Modify(_)
    );
    affects_config && is_write
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_true() -> bool {
    true
}

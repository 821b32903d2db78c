use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::mode::Mode;

/// Runtime status written by the daemon to %APPDATA%\KeyRate\status.toml.
/// External tools (tray icon, scripts) read it to show the current mode.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DaemonStatus {
    /// Daemon binary version (set from Cargo.toml at compile time).
    pub version: String,
    /// Profile the daemon last switched to.
    pub mode: Mode,
    /// Number of watched process instances currently running.
    pub active_processes: usize,
    /// RFC 3339 timestamp of the last Default/FastMode switch, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition: Option<String>,
    /// Most recent non-fatal error (e.g. a rejected config reload).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DaemonStatus {
    /// Constructs the initial status on daemon startup.
    pub fn new() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            mode: Mode::Default,
            active_processes: 0,
            last_transition: None,
            error: None,
        }
    }

    /// Records the tracker's current view. Returns true if the mode flipped.
    pub fn observe(&mut self, is_running: bool, active_processes: usize) -> bool {
        self.active_processes = active_processes;
        let mode = Mode::for_running(is_running);
        if mode == self.mode {
            return false;
        }
        self.mode = mode;
        self.last_transition = Some(chrono::Local::now().to_rfc3339());
        true
    }
}

/// Serializes `status` to TOML and writes it to `path`.
/// Creates the parent directory if it does not exist.
/// A failed write is logged and otherwise ignored.
pub fn write_status(path: &Path, status: &DaemonStatus) {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            tracing::warn!(
                dir = %parent.display(),
                error = %e,
                "Failed to create status directory"
            );
            return;
        }
    }
    match toml::to_string_pretty(status) {
        Ok(content) => {
            if let Err(e) = std::fs::write(path, content) {
                tracing::warn!(error = %e, "Failed to write status file");
            }
        }
        Err(e) => tracing::warn!(error = %e, "Failed to serialize status"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── DaemonStatus ──────────────────────────────────────────────────────────

    #[test]
    fn new_starts_in_default_mode() {
        let s = DaemonStatus::new();
        assert_eq!(s.mode, Mode::Default);
        assert_eq!(s.active_processes, 0);
        assert!(s.last_transition.is_none());
        assert!(s.error.is_none());
        assert_eq!(s.version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn observe_flips_mode_and_stamps_transition() {
        let mut s = DaemonStatus::new();

        assert!(s.observe(true, 1));
        assert_eq!(s.mode, Mode::FastMode);
        assert!(s.last_transition.is_some());

        assert!(!s.observe(true, 2));
        assert_eq!(s.active_processes, 2);

        assert!(s.observe(false, 0));
        assert_eq!(s.mode, Mode::Default);
    }

    #[test]
    fn observe_without_flip_keeps_timestamp() {
        let mut s = DaemonStatus::new();
        assert!(!s.observe(false, 0));
        assert!(s.last_transition.is_none());
    }

    // ── write_status ──────────────────────────────────────────────────────────

    #[test]
    fn write_status_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("status.toml");
        write_status(&path, &DaemonStatus::new());
        assert!(path.exists());
    }

    #[test]
    fn write_status_content_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.toml");

        let mut original = DaemonStatus::new();
        original.observe(true, 3);
        original.error = Some("config rejected".to_string());
        write_status(&path, &original);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("mode = \"fastmode\""));
        let parsed: DaemonStatus = toml::from_str(&content).unwrap();
        assert_eq!(parsed.mode, Mode::FastMode);
        assert_eq!(parsed.active_processes, 3);
        assert_eq!(parsed.error.as_deref(), Some("config rejected"));
    }

    #[test]
    fn write_status_omits_none_optional_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.toml");
        write_status(&path, &DaemonStatus::new());

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("last_transition"));
        assert!(!content.contains("error"));
    }
}

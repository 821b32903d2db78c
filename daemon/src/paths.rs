/// Canonical file paths for KeyRate data files on Windows.
///
/// Everything lives under %APPDATA%\KeyRate\:
///   - config.toml  Edited by the user, watched by the daemon.
///   - status.toml  Written by the daemon after every event.
///   - logs\        Daily-rolling daemon logs.
use std::path::PathBuf;

const APP_DIR_NAME: &str = "KeyRate";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const STATUS_FILE_NAME: &str = "status.toml";
pub const LOG_DIR_NAME: &str = "logs";

/// Returns the KeyRate application data directory: %APPDATA%\KeyRate\
///
/// Falls back to the system temp directory when APPDATA is unset (non-Windows
/// development machines).
pub fn app_data_dir() -> PathBuf {
    std::env::var_os("APPDATA")
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR_NAME)
}

/// Returns the full path to the config file: %APPDATA%\KeyRate\config.toml
pub fn config_file_path() -> PathBuf {
    app_data_dir().join(CONFIG_FILE_NAME)
}

/// Returns the full path to the status file: %APPDATA%\KeyRate\status.toml
pub fn status_file_path() -> PathBuf {
    app_data_dir().join(STATUS_FILE_NAME)
}

/// Returns the log directory: %APPDATA%\KeyRate\logs\
pub fn log_dir() -> PathBuf {
    app_data_dir().join(LOG_DIR_NAME)
}

use crate::config::Config;

#[derive(Debug)]
pub enum DaemonEvent {
    /// A watched executable instance appeared in the process list.
    ProcessStarted { pid: u32, name: String },
    /// A previously reported watched instance exited.
    ProcessStopped { pid: u32, name: String },
    /// The config file changed on disk and was re-parsed (not yet validated).
    ConfigReloaded(Config),
    /// Ctrl+C received; restore the default profile if needed and exit.
    Shutdown,
}

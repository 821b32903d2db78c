mod applier;
mod config;
mod coordinator;
mod event;
mod key_repeat;
mod logging;
mod mode;
mod paths;
mod process_monitor;
mod process_name;
mod settings_change;
mod shutdown;
mod startup;
mod status;
mod tracker;
mod validation;

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::applier::SystemApplier;
use crate::coordinator::ModeCoordinator;
use crate::event::DaemonEvent;
use crate::process_monitor::ProcessWatcher;
use crate::settings_change::{ChangeOutcome, SettingsChangeCoordinator};
use crate::shutdown::ExitRestore;
use crate::startup::StartupTrigger;
use crate::tracker::ProcessStateTracker;
use crate::validation::{ConfigValidator, SettingsValidator};

#[tokio::main]
async fn main() {
    // ── App data directory ────────────────────────────────────────────────────
    let app_dir = paths::app_data_dir();
    if let Err(e) = std::fs::create_dir_all(&app_dir) {
        eprintln!("Failed to create app data directory {}: {e}", app_dir.display());
        std::process::exit(1);
    }

    // ── Configuration (read before logging so log_level applies) ──────────────
    let config_path = paths::config_file_path();
    let template_written = config::write_template_if_missing(&config_path);
    let initial_config = config::load_or_default(&config_path);
    let log_level = initial_config
        .as_ref()
        .map(|c| c.general.log_level.clone())
        .unwrap_or_else(|_| config::DEFAULT_LOG_LEVEL.to_string());

    // ── Logging ───────────────────────────────────────────────────────────────
    let log_guard = match logging::init(&paths::log_dir(), &log_level) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialise logging: {e:#}");
            std::process::exit(1);
        }
    };

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "keyrate-daemon starting");
    match template_written {
        Ok(true) => tracing::info!(path = %config_path.display(), "Wrote starter config"),
        Ok(false) => {}
        Err(e) => tracing::warn!(error = %format!("{e:#}"), "Could not write starter config"),
    }

    let result = match initial_config {
        Ok(config) => run(config, config_path).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        tracing::error!(error = %format!("{e:#}"), "keyrate-daemon exiting on fatal error");
        drop(log_guard);
        std::process::exit(1);
    }
}

async fn run(initial_config: config::Config, config_path: PathBuf) -> Result<()> {
    let initial = ConfigValidator
        .validate(&initial_config)
        .map_err(|failures| {
            for failure in &failures {
                tracing::error!(
                    property = %failure.property,
                    message = %failure.message,
                    "Invalid config"
                );
            }
            anyhow::anyhow!("config has {} validation error(s)", failures.len())
        })
        .context("Cannot start with the current config")?;

    // ── Core wiring ───────────────────────────────────────────────────────────
    let applier = SystemApplier::default();
    if let Some(current) = applier.current() {
        tracing::info!(
            speed = current.repeat_speed,
            delay = current.repeat_delay,
            "Current OS keyboard repeat settings"
        );
    }

    let coordinator = Arc::new(
        ModeCoordinator::new(initial.key_repeat, Box::new(applier))
            .with_apply_changes_immediately(initial.apply_changes_immediately),
    );
    let tracker = Arc::new(ProcessStateTracker::new(coordinator.clone()));
    let watcher = Arc::new(ProcessWatcher::new());
    let changes = SettingsChangeCoordinator::new(Box::new(ConfigValidator));
    let exit_restore = Arc::new(ExitRestore::new(initial.restore_on_exit));
    changes.register(coordinator.clone());
    changes.register(exit_restore.clone());

    StartupTrigger::new(watcher.clone(), tracker.clone()).fire(&initial, &changes)?;

    // ── Status ────────────────────────────────────────────────────────────────
    let status_path = paths::status_file_path();
    let mut current_status = status::DaemonStatus::new();
    status::write_status(&status_path, &current_status);

    // ── Background tasks ──────────────────────────────────────────────────────
    let (event_tx, mut event_rx) = mpsc::channel::<DaemonEvent>(64);

    tokio::spawn(config::watch_config(config_path, event_tx.clone()));
    tokio::spawn(process_monitor::run(
        watcher.clone(),
        initial.poll_interval,
        event_tx.clone(),
    ));

    // Graceful shutdown on Ctrl+C.
    {
        let tx = event_tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = tx.send(DaemonEvent::Shutdown).await;
            }
        });
    }
    drop(event_tx);

    let mut poll_interval = initial.poll_interval;

    // ── Event loop ────────────────────────────────────────────────────────────
    // The core is synchronous and the applier may sleep between retries, so
    // calls into it leave the async worker via block_in_place.
    while let Some(evt) = event_rx.recv().await {
        match evt {
            DaemonEvent::ProcessStarted { pid, name } => {
                tokio::task::block_in_place(|| tracker.on_process_started(pid, &name));
            }

            DaemonEvent::ProcessStopped { pid, name } => {
                tokio::task::block_in_place(|| tracker.on_process_stopped(pid, &name));
            }

            DaemonEvent::ConfigReloaded(new_config) => {
                match tokio::task::block_in_place(|| changes.handle_settings_change(&new_config)) {
                    ChangeOutcome::Rejected { failures } => {
                        current_status.error =
                            Some(format!("Config reload rejected: {failures} validation error(s)"));
                    }
                    ChangeOutcome::Applied { handler_failures, .. } => {
                        let new_interval = new_config.general.effective_poll_interval();
                        if new_interval != poll_interval {
                            tracing::warn!(
                                ?new_interval,
                                "poll_interval_ms changes take effect after restart"
                            );
                            poll_interval = new_interval;
                        }
                        current_status.error = (handler_failures > 0).then(|| {
                            format!("{handler_failures} settings handler(s) failed; see log")
                        });
                    }
                }
            }

            DaemonEvent::Shutdown => {
                tracing::info!("Shutting down");
                let restored = tokio::task::block_in_place(|| {
                    exit_restore.restore_default(&tracker, &*coordinator)
                });
                if restored {
                    current_status.observe(false, 0);
                } else {
                    current_status.observe(tracker.is_running(), tracker.active_count());
                }
                status::write_status(&status_path, &current_status);
                break;
            }
        }

        if current_status.observe(tracker.is_running(), tracker.active_count()) {
            tracing::info!(mode = %current_status.mode, "Mode changed");
        }
        status::write_status(&status_path, &current_status);
    }

    Ok(())
}

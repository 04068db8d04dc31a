//! hotkey-toggled: daemon hosting a hotkey controller
//!
//! Registers the bindings declared in the environment, starts their
//! listeners, and blocks on the stop chord. A control socket reports
//! status, fires chords through the in-memory backend, and accepts stop
//! requests. SIGINT/SIGTERM stop the controller the same way.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use hotkey_toggle::config::{BindingSpec, Config};
use hotkey_toggle::ipc::Server;
use hotkey_toggle::lifecycle::ShutdownSignal;
use hotkey_toggle::{Binding, Controller, ControllerBehavior, VirtualBackend};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "hotkey-toggled starting");

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(
        ?config.socket_path,
        stop_chord = %config.stop_chord,
        bindings = config.bindings.len(),
        "configuration loaded"
    );

    let backend = Arc::new(VirtualBackend::new());
    let controller = Controller::from_shared(
        backend,
        ControllerBehavior {
            allow_overwrite: false,
            log_debug: config.log_debug,
        },
    );

    for spec in &config.bindings {
        controller.register(logging_binding(spec)?, false)?;
    }
    if controller.is_empty() {
        warn!("no bindings configured, set HOTKEY_TOGGLE_BINDINGS");
    }
    controller.start_all_listeners()?;

    // Log controller events
    let mut events = controller.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => info!(%event, "hotkey event"),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "event receiver lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let server = Server::new(&config.socket_path, controller.clone())?;
    let shutdown = ShutdownSignal::new(controller.stop_signal());

    // The controller blocks its thread until stopped
    let mut waiter = {
        let controller = controller.clone();
        let stop_chord = config.stop_chord.clone();
        tokio::task::spawn_blocking(move || controller.wait(&stop_chord))
    };

    info!("daemon initialized, waiting for stop chord");

    let finished = tokio::select! {
        result = &mut waiter => Some(result),

        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "control server error");
            }
            None
        }

        result = shutdown.wait() => {
            match result {
                Ok(signal) => info!(signal, "shutdown signal received"),
                Err(e) => error!(?e, "failed to install signal handlers"),
            }
            None
        }
    };

    let outcome = match finished {
        Some(outcome) => outcome,
        None => {
            controller.stop_signal().trigger();
            waiter.await
        }
    };

    match outcome {
        Ok(Ok(())) => info!("controller stopped"),
        Ok(Err(e)) => error!(error = %e, "controller stopped with error"),
        Err(e) => error!(?e, "controller thread failed"),
    }

    server.shutdown().await;

    info!("hotkey-toggled stopped");

    Ok(())
}

/// Binding whose actions log the transition
fn logging_binding(spec: &BindingSpec) -> hotkey_toggle::Result<Binding> {
    let on_chord = spec.chord.clone();
    let off_chord = spec.chord.clone();

    let binding = Binding::with_deactivate(
        spec.chord.clone(),
        move || {
            info!(chord = %on_chord, "activated");
            Ok(())
        },
        move || {
            info!(chord = %off_chord, "deactivated");
            Ok(())
        },
    )?;

    Ok(binding.with_options(spec.options))
}

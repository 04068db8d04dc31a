//! Bridges SIGINT/SIGTERM to a controller stop signal

use tokio::signal::unix::{signal, SignalKind};
use tracing::debug;

use super::Signal;

/// Triggers a [`Signal`] when the process is asked to terminate
pub struct ShutdownSignal {
    stop: Signal,
}

impl ShutdownSignal {
    /// Forward termination requests to `stop`
    pub fn new(stop: Signal) -> Self {
        Self { stop }
    }

    /// Wait for SIGTERM or SIGINT, then trigger the stop signal
    ///
    /// Returns the name of the signal received, or an error if the
    /// handlers cannot be installed.
    pub async fn wait(&self) -> std::io::Result<&'static str> {
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        let name = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        };

        debug!(signal = name, "forwarding to stop signal");
        self.stop.trigger();
        Ok(name)
    }
}

//! Unix domain socket server for daemon control
//!
//! Answers status queries, fires chords through the in-memory backend,
//! accepts stop requests, and streams controller events to subscribers.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use super::protocol::{DaemonStatus, Notification, Request, Response};
use crate::backend::VirtualBackend;
use crate::controller::Controller;
use crate::events::HotkeyEvent;

/// Largest request body accepted
const MAX_MESSAGE_LEN: usize = 1024 * 1024;

/// Control server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: UnixListener,
    controller: Controller<VirtualBackend>,
    start_time: Instant,
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    /// Bind the control socket
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(socket_path: &Path, controller: Controller<VirtualBackend>) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create socket directory")?;
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path).context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path).context("failed to bind Unix socket")?;

        // Set socket permissions to owner-only (0600)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        info!(?socket_path, "control server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener,
            controller,
            start_time: Instant::now(),
            shutdown_tx,
        })
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let controller = self.controller.clone();
                    let start_time = self.start_time;
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = Self::handle_client(stream, controller, start_time) => {
                                if let Err(e) = result {
                                    warn!(?e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Handle a single client connection
    ///
    /// After a `Subscribe` request the connection carries only
    /// notifications until the client goes away.
    async fn handle_client(
        mut stream: UnixStream,
        controller: Controller<VirtualBackend>,
        start_time: Instant,
    ) -> Result<()> {
        let mut len_buf = [0u8; 4];

        loop {
            // Read message length (4-byte little-endian)
            match stream.read_exact(&mut len_buf).await {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    debug!("client disconnected");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            }

            let len = u32::from_le_bytes(len_buf) as usize;
            if len > MAX_MESSAGE_LEN {
                warn!(len, "message too large, disconnecting");
                return Ok(());
            }

            // Read message body
            let mut msg_buf = vec![0u8; len];
            stream.read_exact(&mut msg_buf).await?;

            let request: Request = match serde_json::from_slice(&msg_buf) {
                Ok(request) => request,
                Err(e) => {
                    let response = Response::Error {
                        code: "bad_request".into(),
                        message: e.to_string(),
                    };
                    send_message(&mut stream, &response).await?;
                    continue;
                }
            };

            debug!(?request, "received request");

            // Subscribe before answering so no event slips between the two
            let events = matches!(request, Request::Subscribe).then(|| controller.subscribe());
            let response = Self::process_request(request, &controller, start_time).await;
            send_message(&mut stream, &response).await?;

            if let Some(events) = events {
                debug!("client subscribed to notifications");
                return Self::stream_events(&mut stream, events).await;
            }
        }
    }

    /// Forward controller events until the client or the controller goes away
    async fn stream_events(
        stream: &mut UnixStream,
        mut events: broadcast::Receiver<HotkeyEvent>,
    ) -> Result<()> {
        loop {
            match events.recv().await {
                Ok(event) => {
                    send_message(stream, &Notification::Event(event)).await?;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(()),
            }
        }
    }

    /// Process a request and return a response
    async fn process_request(
        request: Request,
        controller: &Controller<VirtualBackend>,
        start_time: Instant,
    ) -> Response {
        match request {
            Request::Ping => Response::Pong,

            Request::GetStatus => Response::Status(DaemonStatus {
                phase: controller.phase(),
                stop_chord: controller.stop_chord(),
                bindings: controller.snapshot(),
                uptime_secs: start_time.elapsed().as_secs(),
                ..DaemonStatus::default()
            }),

            Request::Fire { chord } => {
                // Toggles may block on key release or a repeat task join
                let controller = controller.clone();
                let fired = tokio::task::spawn_blocking(move || {
                    let outcome = controller.backend().fire(&chord);
                    let state = controller.state_of(&chord);
                    (chord, outcome, state)
                })
                .await;

                match fired {
                    Ok((chord, Some(Ok(())), state)) => {
                        info!(chord = %chord, "chord fired via control socket");
                        Response::Fired { chord, state }
                    }
                    Ok((chord, None, _)) => Response::Error {
                        code: "not_hooked".into(),
                        message: format!("nothing is listening for '{chord}'"),
                    },
                    Ok((_, Some(Err(e)), _)) => Response::Error {
                        code: "toggle_failed".into(),
                        message: e.to_string(),
                    },
                    Err(e) => Response::Error {
                        code: "internal".into(),
                        message: e.to_string(),
                    },
                }
            }

            Request::Stop => {
                info!("stop requested via control socket");
                controller.stop_signal().trigger();
                Response::Stopping
            }

            Request::Subscribe => Response::Subscribed,
        }
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        // Remove socket file
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("control server shutdown complete");
    }
}

/// Send a length-prefixed JSON message
async fn send_message<T: serde::Serialize>(stream: &mut UnixStream, msg: &T) -> Result<()> {
    let msg_bytes = serde_json::to_vec(msg)?;
    let msg_len = (msg_bytes.len() as u32).to_le_bytes();

    stream.write_all(&msg_len).await?;
    stream.write_all(&msg_bytes).await?;

    Ok(())
}

/// Read one length-prefixed JSON message
pub async fn read_message<T: serde::de::DeserializeOwned>(stream: &mut UnixStream) -> Result<T> {
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).await?;
    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_LEN {
        anyhow::bail!("message of {len} bytes exceeds limit");
    }

    let mut msg_buf = vec![0u8; len];
    stream.read_exact(&mut msg_buf).await?;
    Ok(serde_json::from_slice(&msg_buf)?)
}

/// Client side of [`send_message`] for requests
pub async fn write_request(stream: &mut UnixStream, request: &Request) -> Result<()> {
    send_message(stream, request).await
}

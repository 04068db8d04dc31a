//! Control socket message protocol
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use serde::{Deserialize, Serialize};

use crate::binding::BindingState;
use crate::controller::{BindingStatus, ControllerPhase};
use crate::events::HotkeyEvent;

/// Requests from a control client to the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Request current daemon status
    GetStatus,

    /// Fire a chord through the daemon's backend
    Fire { chord: String },

    /// Stop the controller and shut the daemon down
    Stop,

    /// Ping to check connectivity
    Ping,

    /// Subscribe to hotkey event notifications
    Subscribe,
}

/// Responses from the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Current daemon status
    Status(DaemonStatus),

    /// Result of a fired chord
    Fired { chord: String, state: Option<BindingState> },

    /// Stop requested
    Stopping,

    /// Pong response to ping
    Pong,

    /// Subscription confirmed
    Subscribed,

    /// Error response
    Error { code: String, message: String },
}

/// Push notification to subscribed clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Notification {
    /// A controller event occurred
    Event(HotkeyEvent),
}

/// Full daemon status snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// Daemon version
    pub version: String,

    /// Controller lifecycle phase
    pub phase: ControllerPhase,

    /// Chord that stops the daemon, while hooked
    pub stop_chord: Option<String>,

    /// Every registered binding
    pub bindings: Vec<BindingStatus>,

    /// Uptime in seconds
    pub uptime_secs: u64,
}

impl Default for DaemonStatus {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            phase: ControllerPhase::Created,
            stop_chord: None,
            bindings: Vec::new(),
            uptime_secs: 0,
        }
    }
}

//! Controller options and status snapshots

use serde::{Deserialize, Serialize};

use crate::binding::BindingState;

/// Registry-wide behavior
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerBehavior {
    /// Replace an existing binding instead of rejecting the duplicate
    pub allow_overwrite: bool,
    /// Log registry and listener activity at info level
    pub log_debug: bool,
}

/// Where the controller is in its start/stop lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerPhase {
    /// Bindings may be registered, none are hooked
    Created,
    /// At least one binding is hooked into the backend
    Listening,
    /// Cleanup ran and the stop signal is set
    Stopped,
}

impl std::fmt::Display for ControllerPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControllerPhase::Created => write!(f, "Created"),
            ControllerPhase::Listening => write!(f, "Listening"),
            ControllerPhase::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Point-in-time view of one registered binding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingStatus {
    pub chord: String,
    /// `None` if the binding was busy toggling when the snapshot was taken
    pub state: Option<BindingState>,
    pub listening: bool,
    pub repeating: bool,
}

//! Events broadcast by the controller
//!
//! Registry changes, listener start/stop, and the outcome of every chord
//! fire dispatched through a controller-installed hook.

use serde::{Deserialize, Serialize};

use crate::binding::BindingState;

/// Something that happened to a binding or the controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HotkeyEvent {
    /// A binding was added to the registry
    Registered { chord: String },

    /// An existing binding was replaced (overwrite allowed)
    Replaced { chord: String },

    /// A binding was removed from the registry
    Unregistered { chord: String },

    /// The binding's toggle was hooked into the backend
    ListenerStarted { chord: String },

    /// The binding's hook was removed from the backend
    ListenerStopped { chord: String },

    /// A chord fire completed
    Toggled { chord: String, state: BindingState },

    /// A chord fire returned an error
    ToggleFailed { chord: String, message: String },

    /// Cleanup finished and the stop signal was set
    Stopped,
}

impl std::fmt::Display for HotkeyEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HotkeyEvent::Registered { chord } => write!(f, "REGISTERED {}", chord),
            HotkeyEvent::Replaced { chord } => write!(f, "REPLACED {}", chord),
            HotkeyEvent::Unregistered { chord } => write!(f, "UNREGISTERED {}", chord),
            HotkeyEvent::ListenerStarted { chord } => write!(f, "LISTENER_STARTED {}", chord),
            HotkeyEvent::ListenerStopped { chord } => write!(f, "LISTENER_STOPPED {}", chord),
            HotkeyEvent::Toggled { chord, state } => write!(f, "TOGGLED {} -> {}", chord, state),
            HotkeyEvent::ToggleFailed { chord, message } => {
                write!(f, "TOGGLE_FAILED {} ({})", chord, message)
            }
            HotkeyEvent::Stopped => write!(f, "STOPPED"),
        }
    }
}

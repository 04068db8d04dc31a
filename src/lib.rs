//! hotkey-toggle: global hotkeys that switch behavior on and off
//!
//! A [`Binding`] ties a chord to an activate and a deactivate action and
//! tracks whether it is ACTIVE or DISABLED. A [`Controller`] keeps the
//! registry of bindings, hooks them into a [`HotkeyBackend`], and blocks
//! until a stop chord or stop signal tears everything down.
//!
//! The OS key hook itself is not part of this crate; anything implementing
//! [`HotkeyBackend`] can drive the controller.

/// Log at info when `$enabled`, otherwise at trace
macro_rules! debug_log {
    ($enabled:expr, $($arg:tt)+) => {
        if $enabled {
            tracing::info!($($arg)+);
        } else {
            tracing::trace!($($arg)+);
        }
    };
}

pub mod backend;
pub mod binding;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod ipc;
pub mod lifecycle;

pub use backend::{HotkeyBackend, HotkeyCallback, VirtualBackend};
pub use binding::{BehaviorOptions, Binding, BindingState, CallbackHotkey, Hotkey};
pub use controller::{BindingStatus, Controller, ControllerBehavior, ControllerPhase};
pub use error::{BackendError, HotkeyError, Result};
pub use events::HotkeyEvent;
pub use lifecycle::Signal;

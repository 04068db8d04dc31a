//! Hotkey bindings
//!
//! A binding pairs a chord with activate/deactivate actions and owns the
//! ACTIVE/DISABLED state machine driven by chord fires:
//! - non-repeating: each fire runs one action and flips state
//! - repeating: entering ACTIVE starts a background loop, leaving stops it
//! - one-state: every fire runs the activate path, state never flips

mod behavior;
mod hotkey;
mod machine;
mod repeat;
mod state;

pub use behavior::BehaviorOptions;
pub use hotkey::{Action, ActionResult, CallbackHotkey, Hotkey};
pub use machine::Binding;
pub use repeat::RepeatTask;
pub use state::BindingState;

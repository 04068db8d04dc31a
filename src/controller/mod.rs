//! Hotkey controller
//!
//! Owns the binding registry and the start/stop lifecycle:
//! - register bindings keyed by chord, rejecting duplicates
//! - hook bindings into the backend individually or all at once
//! - block in `wait` until the stop chord or stop signal fires, then
//!   unhook everything

mod registry;
mod status;

pub use registry::Controller;
pub use status::{BindingStatus, ControllerBehavior, ControllerPhase};

//! Hotkey backend seam
//!
//! The OS-level key hook lives outside this crate. A backend installs a
//! global listener for a chord string, removes it again, and answers
//! point-in-time key state queries used by wait-for-release polling.

mod virtual_keys;

use std::sync::Arc;

use crate::error::{BackendError, HotkeyError};

pub use virtual_keys::VirtualBackend;

/// Callback a backend invokes each time a hooked chord fires
///
/// Errors are handed back to the backend's dispatch context.
pub type HotkeyCallback = Arc<dyn Fn() -> Result<(), HotkeyError> + Send + Sync + 'static>;

/// Capabilities the controller and bindings consume from a key hook
pub trait HotkeyBackend: Send + Sync + 'static {
    /// Install a global listener for `chord`
    fn hook(&self, chord: &str, callback: HotkeyCallback) -> Result<(), BackendError>;

    /// Remove the listener for `chord`
    ///
    /// Returns [`BackendError::NotHooked`] if nothing is installed for it.
    fn unhook(&self, chord: &str) -> Result<(), BackendError>;

    /// Whether `key` is physically held right now
    fn key_is_down(&self, key: &str) -> bool;

    /// The individual keys making up `chord`
    ///
    /// Backends with a richer chord syntax should override this; the
    /// default treats `+` as the only separator.
    fn chord_keys(&self, chord: &str) -> Vec<String> {
        chord
            .split('+')
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_owned)
            .collect()
    }
}

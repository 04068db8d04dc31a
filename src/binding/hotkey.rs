//! Hotkey behavior contract
//!
//! A [`Hotkey`] names a chord and the two actions it toggles between.
//! [`CallbackHotkey`] is the plain closure-pair implementation; richer kinds
//! implement the trait directly and are wrapped with
//! [`Binding::from_hotkey`](super::Binding::from_hotkey).

use std::fmt;

/// Result of a user action
pub type ActionResult = anyhow::Result<()>;

/// Zero-argument user action
pub type Action = Box<dyn Fn() -> ActionResult + Send + Sync + 'static>;

/// The chord plus on/off behavior of one hotkey
pub trait Hotkey: Send + Sync + 'static {
    /// Chord identifier, e.g. `alt+c`
    fn chord(&self) -> &str;

    /// Run when the binding enters ACTIVE (or on every repeat tick)
    fn activate(&self) -> ActionResult;

    /// Run when the binding leaves ACTIVE
    fn deactivate(&self) -> ActionResult {
        Ok(())
    }
}

/// A hotkey built from a pair of closures
pub struct CallbackHotkey {
    chord: String,
    on: Action,
    off: Action,
}

impl CallbackHotkey {
    pub fn new<F>(chord: impl Into<String>, on: F) -> Self
    where
        F: Fn() -> ActionResult + Send + Sync + 'static,
    {
        Self {
            chord: chord.into(),
            on: Box::new(on),
            off: Box::new(|| Ok(())),
        }
    }

    /// Replace the deactivate action
    pub fn with_off<G>(mut self, off: G) -> Self
    where
        G: Fn() -> ActionResult + Send + Sync + 'static,
    {
        self.off = Box::new(off);
        self
    }
}

impl Hotkey for CallbackHotkey {
    fn chord(&self) -> &str {
        &self.chord
    }

    fn activate(&self) -> ActionResult {
        (self.on)()
    }

    fn deactivate(&self) -> ActionResult {
        (self.off)()
    }
}

impl fmt::Debug for CallbackHotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackHotkey")
            .field("chord", &self.chord)
            .finish_non_exhaustive()
    }
}

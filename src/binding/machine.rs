//! The per-binding toggle state machine
//!
//! Each chord fire runs [`Binding::toggle`] exactly once. Depending on the
//! current state and the behavior options it runs the activate or
//! deactivate action, or starts or stops the repeat task, then flips the
//! state unless the binding is one-state.

use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::behavior::BehaviorOptions;
use super::hotkey::{ActionResult, CallbackHotkey, Hotkey};
use super::repeat::RepeatTask;
use super::state::BindingState;
use crate::backend::HotkeyBackend;
use crate::error::{HotkeyError, Result};

/// Poll interval while waiting for chord keys to be released
const RELEASE_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// One hotkey: chord, actions, options and current state
pub struct Binding {
    hotkey: Arc<dyn Hotkey>,
    options: BehaviorOptions,
    state: BindingState,
    /// At most one repeat loop per binding
    repeat: Option<RepeatTask>,
}

impl Binding {
    /// Create a binding whose deactivate action does nothing
    pub fn new<F>(chord: impl Into<String>, activate: F) -> Result<Self>
    where
        F: Fn() -> ActionResult + Send + Sync + 'static,
    {
        Self::from_hotkey(CallbackHotkey::new(chord, activate))
    }

    /// Create a binding from an activate/deactivate pair
    pub fn with_deactivate<F, G>(chord: impl Into<String>, activate: F, deactivate: G) -> Result<Self>
    where
        F: Fn() -> ActionResult + Send + Sync + 'static,
        G: Fn() -> ActionResult + Send + Sync + 'static,
    {
        Self::from_hotkey(CallbackHotkey::new(chord, activate).with_off(deactivate))
    }

    /// Wrap any [`Hotkey`] implementation
    ///
    /// Fails with [`HotkeyError::InvalidChord`] if the chord is blank.
    /// Anything beyond that is left for the backend to validate.
    pub fn from_hotkey(hotkey: impl Hotkey) -> Result<Self> {
        if hotkey.chord().trim().is_empty() {
            return Err(HotkeyError::InvalidChord(hotkey.chord().to_owned()));
        }

        Ok(Self {
            hotkey: Arc::new(hotkey),
            options: BehaviorOptions::default(),
            state: BindingState::Disabled,
            repeat: None,
        })
    }

    /// Replace the behavior options
    pub fn with_options(mut self, options: BehaviorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn chord(&self) -> &str {
        self.hotkey.chord()
    }

    pub fn state(&self) -> BindingState {
        self.state
    }

    pub fn options(&self) -> &BehaviorOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut BehaviorOptions {
        &mut self.options
    }

    /// Whether a repeat task is currently owned by this binding
    pub fn is_repeating(&self) -> bool {
        self.repeat.is_some()
    }

    /// Process one chord fire
    ///
    /// `keys` answers key-state queries while waiting for release. Returns
    /// the state after the fire. A failing action is returned as
    /// [`HotkeyError::Action`]; on the direct activate/deactivate path the
    /// state is left unchanged in that case.
    pub fn toggle<K>(&mut self, keys: &K) -> Result<BindingState>
    where
        K: HotkeyBackend + ?Sized,
    {
        let from = self.state;
        debug_log!(
            self.options.log_debug,
            chord = self.chord(),
            state = %from,
            "toggling"
        );

        if self.options.wait_for_release {
            self.block_until_released(keys);
        }

        match (from, self.options.repeat) {
            (BindingState::Active, true) => {
                debug_log!(self.options.log_debug, chord = self.chord(), "stopping repeat task");
                let outcome = self.stop_repeat();
                self.finish(from);
                outcome?;
            }
            (BindingState::Active, false) => {
                debug_log!(self.options.log_debug, chord = self.chord(), "calling deactivate");
                self.hotkey.deactivate().map_err(|e| self.action_error(e))?;
                self.finish(from);
            }
            (BindingState::Disabled, true) => {
                self.start_repeat()?;
                self.finish(from);
            }
            (BindingState::Disabled, false) => {
                debug_log!(self.options.log_debug, chord = self.chord(), "calling activate");
                self.hotkey.activate().map_err(|e| self.action_error(e))?;
                self.finish(from);
            }
        }

        Ok(self.state)
    }

    /// Stop a running repeat task and fall back to DISABLED
    ///
    /// The deactivate action is not called. Does nothing for a binding
    /// without a repeat task.
    pub fn halt(&mut self) -> Result<()> {
        if self.repeat.is_none() {
            return Ok(());
        }

        debug_log!(self.options.log_debug, chord = self.chord(), "halting repeat task");
        let outcome = self.stop_repeat();
        self.state = BindingState::Disabled;
        outcome
    }

    fn finish(&mut self, from: BindingState) {
        if self.options.one_state {
            debug_log!(self.options.log_debug, chord = self.chord(), state = %from, "one-state, keeping state");
            return;
        }

        self.state = from.invert();
        debug_log!(
            self.options.log_debug,
            chord = self.chord(),
            from = %from,
            to = %self.state,
            "state set"
        );
    }

    fn start_repeat(&mut self) -> Result<()> {
        if let Some(task) = self.repeat.take() {
            if !task.is_finished() {
                debug_log!(self.options.log_debug, chord = self.chord(), "repeat task already running");
                self.repeat = Some(task);
                return Ok(());
            }
            if let Err(e) = task.stop() {
                tracing::warn!(chord = self.chord(), error = %e, "previous repeat task had failed");
            }
        }

        debug_log!(
            self.options.log_debug,
            chord = self.chord(),
            delay = ?self.options.repeat_delay,
            "starting repeat task"
        );
        let task = RepeatTask::spawn(Arc::clone(&self.hotkey), self.options.repeat_delay).map_err(|e| {
            HotkeyError::TaskSpawn {
                chord: self.chord().to_owned(),
                reason: e.to_string(),
            }
        })?;
        self.repeat = Some(task);
        Ok(())
    }

    fn stop_repeat(&mut self) -> Result<()> {
        match self.repeat.take() {
            Some(task) => task.stop().map_err(|e| self.action_error(e)),
            None => Ok(()),
        }
    }

    fn block_until_released<K>(&self, keys: &K)
    where
        K: HotkeyBackend + ?Sized,
    {
        let chord_keys = keys.chord_keys(self.chord());
        debug_log!(self.options.log_debug, chord = self.chord(), "waiting for release");

        while chord_keys.iter().any(|key| keys.key_is_down(key)) {
            thread::sleep(RELEASE_POLL_INTERVAL);
        }
    }

    fn action_error(&self, source: anyhow::Error) -> HotkeyError {
        HotkeyError::Action {
            chord: self.chord().to_owned(),
            source,
        }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("chord", &self.chord())
            .field("state", &self.state)
            .field("options", &self.options)
            .field("repeating", &self.repeat.is_some())
            .finish()
    }
}

impl Drop for Binding {
    fn drop(&mut self) {
        if let Some(task) = self.repeat.take() {
            if let Err(e) = task.stop() {
                tracing::warn!(chord = self.chord(), error = %e, "repeat task failed before drop");
            }
        }
    }
}

//! Binding registry and start/stop protocol
//!
//! The controller keeps every registered binding keyed by chord, tracks the
//! subset currently hooked into the backend, and blocks a caller in
//! [`Controller::wait`] until the stop chord fires or the stop signal is
//! triggered from code.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, TryLockError, Weak};

use tokio::sync::broadcast;
use tracing::{error, warn};

use super::status::{BindingStatus, ControllerBehavior, ControllerPhase};
use crate::backend::{HotkeyBackend, HotkeyCallback};
use crate::binding::{Binding, BindingState};
use crate::error::{HotkeyError, Result};
use crate::events::HotkeyEvent;
use crate::lifecycle::Signal;

type SharedBinding = Arc<Mutex<Binding>>;

#[derive(Default)]
struct Registry {
    /// Every known binding
    bindings: HashMap<String, SharedBinding>,
    /// Bindings hooked into the backend; always a subset of `bindings`
    listening: HashMap<String, SharedBinding>,
}

struct Inner<B> {
    backend: Arc<B>,
    behavior: RwLock<ControllerBehavior>,
    registry: Mutex<Registry>,
    stop: Signal,
    stop_chord: Mutex<Option<String>>,
    events: broadcast::Sender<HotkeyEvent>,
}

/// Registry of bindings plus the global start/stop protocol
///
/// Cloning yields another handle to the same registry.
pub struct Controller<B: HotkeyBackend> {
    inner: Arc<Inner<B>>,
}

impl<B: HotkeyBackend> Clone for Controller<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

fn lock_binding(binding: &SharedBinding) -> MutexGuard<'_, Binding> {
    binding.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<B: HotkeyBackend> Controller<B> {
    /// Create an empty controller over `backend`
    pub fn new(backend: B) -> Self {
        Self::with_behavior(backend, ControllerBehavior::default())
    }

    pub fn with_behavior(backend: B, behavior: ControllerBehavior) -> Self {
        Self::from_shared(Arc::new(backend), behavior)
    }

    /// Create a controller over a backend that is also used elsewhere
    pub fn from_shared(backend: Arc<B>, behavior: ControllerBehavior) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Inner {
                backend,
                behavior: RwLock::new(behavior),
                registry: Mutex::new(Registry::default()),
                stop: Signal::new(),
                stop_chord: Mutex::new(None),
                events,
            }),
        }
    }

    /// Create a controller and register an initial set of bindings
    pub fn with_bindings<I>(backend: B, behavior: ControllerBehavior, bindings: I) -> Result<Self>
    where
        I: IntoIterator<Item = Binding>,
    {
        let controller = Self::with_behavior(backend, behavior);
        for binding in bindings {
            controller.register(binding, false)?;
        }
        Ok(controller)
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.inner.backend
    }

    pub fn behavior(&self) -> ControllerBehavior {
        *self.inner.behavior.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_behavior(&self, behavior: ControllerBehavior) {
        *self.inner.behavior.write().unwrap_or_else(PoisonError::into_inner) = behavior;
    }

    /// Receive every event emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<HotkeyEvent> {
        self.inner.events.subscribe()
    }

    /// The signal [`wait`](Self::wait) blocks on
    ///
    /// Triggering it from code stops the controller just like the stop
    /// chord does.
    pub fn stop_signal(&self) -> Signal {
        self.inner.stop.clone()
    }

    /// The stop chord currently hooked by [`wait`](Self::wait), if any
    pub fn stop_chord(&self) -> Option<String> {
        self.inner
            .stop_chord
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.inner.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn log_debug(&self) -> bool {
        self.behavior().log_debug
    }

    fn emit(&self, event: HotkeyEvent) {
        // No receivers is fine
        let _ = self.inner.events.send(event);
    }

    /// Add a binding to the registry, optionally hooking it right away
    ///
    /// A chord that is already registered is rejected with
    /// [`HotkeyError::DuplicateBinding`] unless overwrite is allowed. When
    /// overwriting, the old binding is unhooked first and its repeat task
    /// halted unless it is mid-toggle; if unhooking fails the registry is
    /// left untouched.
    pub fn register(&self, binding: Binding, start: bool) -> Result<()> {
        let chord = binding.chord().to_owned();
        if chord.trim().is_empty() {
            return Err(HotkeyError::InvalidChord(chord));
        }
        let log_debug = self.log_debug();
        debug_log!(log_debug, chord = %chord, "registering binding");

        let replaced = {
            let mut registry = self.registry();
            let replaced = match registry.bindings.get(&chord) {
                Some(_) if !self.behavior().allow_overwrite => {
                    return Err(HotkeyError::DuplicateBinding(chord));
                }
                Some(existing) => {
                    let existing = Arc::clone(existing);
                    if registry.listening.contains_key(&chord) {
                        self.inner.backend.unhook(&chord)?;
                        registry.listening.remove(&chord);
                        self.emit(HotkeyEvent::ListenerStopped { chord: chord.clone() });
                    }
                    Some(existing)
                }
                None => None,
            };
            registry
                .bindings
                .insert(chord.clone(), Arc::new(Mutex::new(binding)));
            replaced
        };

        match replaced {
            Some(old) => {
                halt_if_idle(&chord, &old);
                debug_log!(log_debug, chord = %chord, "binding replaced");
                self.emit(HotkeyEvent::Replaced { chord: chord.clone() });
            }
            None => {
                debug_log!(log_debug, chord = %chord, "binding registered");
                self.emit(HotkeyEvent::Registered { chord: chord.clone() });
            }
        }

        if start {
            self.start_listener(&chord)?;
        }
        Ok(())
    }

    /// Stop listening for `chord` and drop its binding
    ///
    /// May be called from the binding's own action. The repeat task of a
    /// binding that is mid-toggle is left running until the binding drops.
    pub fn unregister(&self, chord: &str) -> Result<()> {
        self.stop_listener(chord)?;
        let removed = self
            .registry()
            .bindings
            .remove(chord)
            .ok_or_else(|| HotkeyError::UnknownBinding(chord.to_owned()))?;

        halt_if_idle(chord, &removed);
        debug_log!(self.log_debug(), chord, "binding unregistered");
        self.emit(HotkeyEvent::Unregistered { chord: chord.to_owned() });
        Ok(())
    }

    /// Hook a registered binding's toggle into the backend
    ///
    /// Starting a chord that is already listening does nothing.
    pub fn start_listener(&self, chord: &str) -> Result<()> {
        let log_debug = self.log_debug();
        let mut registry = self.registry();

        let binding = registry
            .bindings
            .get(chord)
            .cloned()
            .ok_or_else(|| HotkeyError::UnknownBinding(chord.to_owned()))?;

        if registry.listening.contains_key(chord) {
            debug_log!(log_debug, chord, "listener already running");
            return Ok(());
        }

        let callback = self.dispatcher(chord, Arc::clone(&binding));
        self.inner.backend.hook(chord, callback)?;
        registry.listening.insert(chord.to_owned(), binding);
        drop(registry);
        self.rearm(log_debug);

        debug_log!(log_debug, chord, "listener started");
        self.emit(HotkeyEvent::ListenerStarted { chord: chord.to_owned() });
        Ok(())
    }

    /// Clear a stop signal left over from a finished stop
    ///
    /// Skipped while [`wait`](Self::wait) holds the stop chord, so a stop
    /// that `wait` has not observed yet is never lost.
    fn rearm(&self, log_debug: bool) {
        let waiting = self
            .inner
            .stop_chord
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some();
        if !waiting && self.inner.stop.is_set() {
            self.inner.stop.reset();
            debug_log!(log_debug, "stop signal re-armed");
        }
    }

    /// Hook every registered binding that is not yet listening
    ///
    /// Stops at the first failure; listeners started before it stay up.
    pub fn start_all_listeners(&self) -> Result<()> {
        let mut pending: Vec<String> = {
            let registry = self.registry();
            registry
                .bindings
                .keys()
                .filter(|chord| !registry.listening.contains_key(*chord))
                .cloned()
                .collect()
        };
        pending.sort();

        debug_log!(self.log_debug(), count = pending.len(), "starting hotkey listeners");
        for chord in pending {
            self.start_listener(&chord)?;
        }
        Ok(())
    }

    /// Unhook one binding, keeping it registered
    pub fn stop_listener(&self, chord: &str) -> Result<()> {
        let mut registry = self.registry();
        if !registry.bindings.contains_key(chord) {
            return Err(HotkeyError::UnknownBinding(chord.to_owned()));
        }
        if !registry.listening.contains_key(chord) {
            return Ok(());
        }

        self.inner.backend.unhook(chord)?;
        registry.listening.remove(chord);

        debug_log!(self.log_debug(), chord, "listener stopped");
        self.emit(HotkeyEvent::ListenerStopped { chord: chord.to_owned() });
        Ok(())
    }

    /// Build the backend callback that drives one binding
    fn dispatcher(&self, chord: &str, binding: SharedBinding) -> HotkeyCallback {
        let chord = chord.to_owned();
        let backend: Weak<B> = Arc::downgrade(&self.inner.backend);
        let events = self.inner.events.clone();

        Arc::new(move || {
            // The backend owns this callback, so it outlives any dispatch
            let Some(backend) = backend.upgrade() else {
                return Ok(());
            };

            let outcome = lock_binding(&binding).toggle(&*backend);
            match outcome {
                Ok(state) => {
                    let _ = events.send(HotkeyEvent::Toggled {
                        chord: chord.clone(),
                        state,
                    });
                    Ok(())
                }
                Err(e) => {
                    error!(chord = %chord, error = %e, "toggle failed");
                    let _ = events.send(HotkeyEvent::ToggleFailed {
                        chord: chord.clone(),
                        message: e.to_string(),
                    });
                    Err(e)
                }
            }
        })
    }

    /// Unhook every listening binding and set the stop signal
    ///
    /// Repeat tasks of the released bindings are halted; deactivate
    /// actions are not called. Every chord is attempted even if one unhook
    /// fails, and the first failure is returned.
    pub fn cleanup(&self) -> Result<()> {
        debug_log!(self.log_debug(), "starting cleanup");
        let released = self.release_listeners();

        debug_log!(self.log_debug(), "setting stop signal");
        self.inner.stop.trigger();
        self.emit(HotkeyEvent::Stopped);
        released
    }

    fn release_listeners(&self) -> Result<()> {
        let log_debug = self.log_debug();
        let listening = std::mem::take(&mut self.registry().listening);
        let mut chords: Vec<String> = listening.keys().cloned().collect();
        chords.sort();

        let mut first_error = None;
        for chord in &chords {
            debug_log!(log_debug, chord = %chord, "removing hotkey");
            match self.inner.backend.unhook(chord) {
                Ok(()) => self.emit(HotkeyEvent::ListenerStopped { chord: chord.clone() }),
                Err(e) => {
                    warn!(chord = %chord, error = %e, "failed to remove hotkey");
                    first_error.get_or_insert(HotkeyError::from(e));
                }
            }
        }

        for (chord, binding) in &listening {
            halt_if_idle(chord, binding);
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Hook `stop_chord` to [`cleanup`](Self::cleanup) and block until stopped
    ///
    /// Returns once the stop signal is set, either by the stop chord or by
    /// code holding [`stop_signal`](Self::stop_signal). Bindings still
    /// listening at that point are released here, then the stop chord is
    /// unhooked.
    pub fn wait(&self, stop_chord: &str) -> Result<()> {
        if stop_chord.trim().is_empty() {
            return Err(HotkeyError::InvalidChord(stop_chord.to_owned()));
        }
        let log_debug = self.log_debug();

        let inner = Arc::downgrade(&self.inner);
        let on_stop: HotkeyCallback = Arc::new(move || match inner.upgrade() {
            Some(inner) => Controller { inner }.cleanup(),
            None => Ok(()),
        });
        self.inner.backend.hook(stop_chord, on_stop)?;
        *self.inner.stop_chord.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(stop_chord.to_owned());

        debug_log!(log_debug, stop_chord, "waiting for stop signal");
        self.inner.stop.wait();
        debug_log!(log_debug, stop_chord, "stop signal received");

        // A stop from code never went through cleanup
        let released = if self.registry().listening.is_empty() {
            Ok(())
        } else {
            let released = self.release_listeners();
            self.emit(HotkeyEvent::Stopped);
            released
        };

        debug_log!(log_debug, stop_chord, "removing stop hotkey");
        let unhooked = self.inner.backend.unhook(stop_chord);
        *self.inner.stop_chord.lock().unwrap_or_else(PoisonError::into_inner) = None;

        released?;
        unhooked?;
        debug_log!(log_debug, "finished cleaning");
        Ok(())
    }

    /// Where the controller is in its lifecycle
    ///
    /// Live listeners win over a set stop signal, so re-adding listeners
    /// after a stop reports `Listening`.
    pub fn phase(&self) -> ControllerPhase {
        if !self.registry().listening.is_empty() {
            ControllerPhase::Listening
        } else if self.inner.stop.is_set() {
            ControllerPhase::Stopped
        } else {
            ControllerPhase::Created
        }
    }

    pub fn is_registered(&self, chord: &str) -> bool {
        self.registry().bindings.contains_key(chord)
    }

    pub fn is_listening(&self, chord: &str) -> bool {
        self.registry().listening.contains_key(chord)
    }

    /// Number of registered bindings
    pub fn len(&self) -> usize {
        self.registry().bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Chords currently hooked into the backend, sorted
    pub fn listening_chords(&self) -> Vec<String> {
        let mut chords: Vec<String> = self.registry().listening.keys().cloned().collect();
        chords.sort();
        chords
    }

    /// Current state of the binding for `chord`
    ///
    /// Blocks while that binding is toggling.
    pub fn state_of(&self, chord: &str) -> Option<BindingState> {
        let binding = self.registry().bindings.get(chord).cloned()?;
        let state = lock_binding(&binding).state();
        Some(state)
    }

    /// Status of every registered binding, sorted by chord
    ///
    /// Never blocks on a binding that is mid-toggle; its state is reported
    /// as `None` instead.
    pub fn snapshot(&self) -> Vec<BindingStatus> {
        let entries: Vec<(String, SharedBinding, bool)> = {
            let registry = self.registry();
            registry
                .bindings
                .iter()
                .map(|(chord, binding)| {
                    (
                        chord.clone(),
                        Arc::clone(binding),
                        registry.listening.contains_key(chord),
                    )
                })
                .collect()
        };

        let mut statuses: Vec<BindingStatus> = entries
            .into_iter()
            .map(|(chord, binding, listening)| {
                let (state, repeating) = match binding.try_lock() {
                    Ok(binding) => (Some(binding.state()), binding.is_repeating()),
                    Err(TryLockError::Poisoned(poisoned)) => {
                        let binding = poisoned.into_inner();
                        (Some(binding.state()), binding.is_repeating())
                    }
                    Err(TryLockError::WouldBlock) => (None, false),
                };
                BindingStatus {
                    chord,
                    state,
                    listening,
                    repeating,
                }
            })
            .collect();
        statuses.sort_by(|a, b| a.chord.cmp(&b.chord));
        statuses
    }
}

/// Halt a binding's repeat task unless the binding is mid-toggle
///
/// A binding whose lock is held is left alone: the holder may be the
/// binding's own action calling back into the controller.
fn halt_if_idle(chord: &str, binding: &SharedBinding) {
    let halted = match binding.try_lock() {
        Ok(mut binding) => binding.halt(),
        Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().halt(),
        Err(TryLockError::WouldBlock) => {
            warn!(chord, "binding is mid-toggle, leaving its repeat task alone");
            return;
        }
    };
    if let Err(e) = halted {
        warn!(chord, error = %e, "repeat task failed");
    }
}

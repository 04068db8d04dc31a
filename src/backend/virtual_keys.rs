//! In-memory hotkey backend
//!
//! Keeps hooks and key state in process memory. Chords are fired
//! explicitly, either synchronously on the caller's thread or on a fresh
//! dispatch thread with the chord's keys held down. Used by the test suite
//! and by the daemon when no OS hook is wired in.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::debug;

use super::{HotkeyBackend, HotkeyCallback};
use crate::error::{BackendError, HotkeyError};

#[derive(Default)]
struct Keyboard {
    hooks: HashMap<String, HotkeyCallback>,
    pressed: HashSet<String>,
    hook_calls: HashMap<String, usize>,
    unhook_calls: HashMap<String, usize>,
}

/// Backend whose keyboard exists only in memory
#[derive(Default)]
pub struct VirtualBackend {
    keyboard: Mutex<Keyboard>,
}

impl VirtualBackend {
    /// Create a backend with no hooks and no keys held
    pub fn new() -> Self {
        Self::default()
    }

    fn keyboard(&self) -> MutexGuard<'_, Keyboard> {
        self.keyboard.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn callback(&self, chord: &str) -> Option<HotkeyCallback> {
        self.keyboard().hooks.get(chord).cloned()
    }

    /// Invoke the callback hooked to `chord` on the current thread
    ///
    /// Returns `None` if nothing is hooked, otherwise the callback's
    /// result. The internal lock is released before the callback runs, so
    /// callbacks may hook or unhook.
    pub fn fire(&self, chord: &str) -> Option<Result<(), HotkeyError>> {
        let callback = self.callback(chord)?;
        debug!(chord, "virtual chord fired");
        Some(callback())
    }

    /// Hold down the chord's keys and dispatch its callback on a new thread
    ///
    /// Returns `None` if nothing is hooked for `chord` or the dispatch
    /// thread cannot be spawned. The keys stay down until
    /// [`release`](Self::release) is called.
    pub fn press(&self, chord: &str) -> Option<JoinHandle<Result<(), HotkeyError>>> {
        let keys = self.chord_keys(chord);
        let callback = {
            let mut keyboard = self.keyboard();
            let callback = keyboard.hooks.get(chord).cloned()?;
            keyboard.pressed.extend(keys);
            callback
        };

        debug!(chord, "virtual chord pressed");
        thread::Builder::new()
            .name(format!("dispatch-{chord}"))
            .spawn(move || callback())
            .ok()
    }

    /// Release every key of `chord`
    pub fn release(&self, chord: &str) {
        let keys = self.chord_keys(chord);
        let mut keyboard = self.keyboard();
        for key in keys {
            keyboard.pressed.remove(&key);
        }
    }

    /// Mark a single key as held
    pub fn press_key(&self, key: &str) {
        self.keyboard().pressed.insert(key.to_owned());
    }

    /// Mark a single key as released
    pub fn release_key(&self, key: &str) {
        self.keyboard().pressed.remove(key);
    }

    /// Whether a callback is currently installed for `chord`
    pub fn is_hooked(&self, chord: &str) -> bool {
        self.keyboard().hooks.contains_key(chord)
    }

    /// Chords with a callback installed, sorted
    pub fn hooked_chords(&self) -> Vec<String> {
        let mut chords: Vec<String> = self.keyboard().hooks.keys().cloned().collect();
        chords.sort();
        chords
    }

    /// How many times `hook` succeeded for `chord`
    pub fn hook_count(&self, chord: &str) -> usize {
        self.keyboard().hook_calls.get(chord).copied().unwrap_or(0)
    }

    /// How many times `unhook` succeeded for `chord`
    pub fn unhook_count(&self, chord: &str) -> usize {
        self.keyboard().unhook_calls.get(chord).copied().unwrap_or(0)
    }
}

impl HotkeyBackend for VirtualBackend {
    fn hook(&self, chord: &str, callback: HotkeyCallback) -> Result<(), BackendError> {
        if self.chord_keys(chord).is_empty() {
            return Err(BackendError::InvalidChord(chord.to_owned()));
        }

        let mut keyboard = self.keyboard();
        keyboard.hooks.insert(chord.to_owned(), callback);
        *keyboard.hook_calls.entry(chord.to_owned()).or_default() += 1;
        Ok(())
    }

    fn unhook(&self, chord: &str) -> Result<(), BackendError> {
        let mut keyboard = self.keyboard();
        if keyboard.hooks.remove(chord).is_none() {
            return Err(BackendError::NotHooked(chord.to_owned()));
        }
        *keyboard.unhook_calls.entry(chord.to_owned()).or_default() += 1;
        Ok(())
    }

    fn key_is_down(&self, key: &str) -> bool {
        self.keyboard().pressed.contains(key)
    }
}

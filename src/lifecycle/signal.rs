//! One-shot, waitable flag shared between threads
//!
//! Used as the controller's stop signal and as the cancellation token of
//! repeat tasks. Clones share the same flag.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// A settable flag that blocked threads can wait on
#[derive(Debug, Clone, Default)]
pub struct Signal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl Signal {
    /// Create an unset signal
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag and wake every waiter
    pub fn trigger(&self) {
        let (flag, cvar) = &*self.inner;
        *flag.lock().unwrap_or_else(PoisonError::into_inner) = true;
        cvar.notify_all();
    }

    /// Clear the flag so the signal can be waited on again
    pub fn reset(&self) {
        let (flag, _) = &*self.inner;
        *flag.lock().unwrap_or_else(PoisonError::into_inner) = false;
    }

    /// Check the flag without blocking
    pub fn is_set(&self) -> bool {
        let (flag, _) = &*self.inner;
        *flag.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until the flag is set
    pub fn wait(&self) {
        let (flag, cvar) = &*self.inner;
        let mut set = flag.lock().unwrap_or_else(PoisonError::into_inner);
        while !*set {
            set = cvar.wait(set).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Block until the flag is set or `timeout` elapses
    ///
    /// Returns `true` if the flag was set. A timeout too large to form a
    /// deadline waits without one.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            self.wait();
            return true;
        };
        let (flag, cvar) = &*self.inner;
        let mut set = flag.lock().unwrap_or_else(PoisonError::into_inner);
        while !*set {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            set = cvar
                .wait_timeout(set, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }
}

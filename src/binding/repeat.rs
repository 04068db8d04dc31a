//! Background task that re-runs an activate action on an interval

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error};

use super::hotkey::{ActionResult, Hotkey};
use crate::lifecycle::Signal;

/// Handle to a running repeat loop
///
/// Owns the loop's cancellation token and its join handle. Dropping the
/// handle without calling [`stop`](Self::stop) detaches the thread.
pub struct RepeatTask {
    cancel: Signal,
    handle: JoinHandle<ActionResult>,
}

impl RepeatTask {
    /// Start calling `hotkey.activate()` every `delay` until stopped
    ///
    /// The first call happens immediately. The loop also ends on the first
    /// failing activate call.
    pub fn spawn(hotkey: Arc<dyn Hotkey>, delay: Duration) -> std::io::Result<Self> {
        let cancel = Signal::new();
        let token = cancel.clone();
        let name = format!("repeat-{}", hotkey.chord());

        let handle = thread::Builder::new().name(name).spawn(move || {
            debug!(chord = hotkey.chord(), "repeat task started");
            let mut ticks: u64 = 0;

            loop {
                if let Err(e) = hotkey.activate() {
                    error!(chord = hotkey.chord(), ticks, error = %e, "repeat action failed, stopping");
                    return Err(e);
                }
                ticks += 1;

                if token.wait_timeout(delay) {
                    break;
                }
            }

            debug!(chord = hotkey.chord(), ticks, "repeat task stopped");
            Ok(())
        })?;

        Ok(Self { cancel, handle })
    }

    /// Whether the loop has exited on its own or after cancellation
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Signal the loop to stop and wait for its thread to exit
    ///
    /// Blocks for at most one `delay` plus the duration of an in-flight
    /// activate call. Returns the loop's failure, if it had one.
    pub fn stop(self) -> ActionResult {
        self.cancel.trigger();
        match self.handle.join() {
            Ok(result) => result,
            Err(_) => Err(anyhow::anyhow!("repeat task panicked")),
        }
    }
}

impl std::fmt::Debug for RepeatTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepeatTask")
            .field("cancelled", &self.cancel.is_set())
            .field("finished", &self.handle.is_finished())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::CallbackHotkey;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_hotkey() -> (Arc<AtomicUsize>, Arc<dyn Hotkey>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let hotkey = {
            let hits = Arc::clone(&hits);
            CallbackHotkey::new("alt+r", move || {
                hits.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        };
        (hits, Arc::new(hotkey))
    }

    #[test]
    fn test_runs_until_stopped() {
        let (hits, hotkey) = counting_hotkey();
        let task = RepeatTask::spawn(hotkey, Duration::from_millis(20)).unwrap();

        thread::sleep(Duration::from_millis(110));
        task.stop().unwrap();

        let after_stop = hits.load(Ordering::SeqCst);
        assert!(after_stop >= 2, "expected several ticks, got {after_stop}");

        thread::sleep(Duration::from_millis(60));
        assert_eq!(hits.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn test_stop_interrupts_long_delay() {
        let (hits, hotkey) = counting_hotkey();
        let task = RepeatTask::spawn(hotkey, Duration::from_secs(30)).unwrap();

        thread::sleep(Duration::from_millis(20));
        let start = std::time::Instant::now();
        task.stop().unwrap();

        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failing_action_ends_loop() {
        let hotkey: Arc<dyn Hotkey> = Arc::new(CallbackHotkey::new("alt+x", || {
            anyhow::bail!("boom")
        }));
        let task = RepeatTask::spawn(hotkey, Duration::from_millis(5)).unwrap();

        thread::sleep(Duration::from_millis(30));
        assert!(task.is_finished());
        assert!(task.stop().is_err());
    }
}

//! Per-binding behavior options

use std::time::Duration;

/// How a binding reacts to its chord firing
///
/// Every binding owns its own value; nothing is shared between instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BehaviorOptions {
    /// Block the toggle until every chord key is released
    pub wait_for_release: bool,
    /// Never flip state; every fire runs the activate path
    pub one_state: bool,
    /// Run activate periodically on a background task while active
    pub repeat: bool,
    /// Interval between repeated activate calls
    pub repeat_delay: Duration,
    /// Log every transition at info level
    pub log_debug: bool,
}

impl BehaviorOptions {
    pub fn wait_for_release(mut self, enabled: bool) -> Self {
        self.wait_for_release = enabled;
        self
    }

    pub fn one_state(mut self, enabled: bool) -> Self {
        self.one_state = enabled;
        self
    }

    /// Enable repeat mode with the given interval
    pub fn repeat_every(mut self, delay: Duration) -> Self {
        self.repeat = true;
        self.repeat_delay = delay;
        self
    }

    pub fn log_debug(mut self, enabled: bool) -> Self {
        self.log_debug = enabled;
        self
    }
}

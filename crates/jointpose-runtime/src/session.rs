//! [`Session`] – the mutable context of one input-loop run.
//!
//! The mode counter and the done flag live here instead of inside the
//! drivers or the binding closures, and every component that needs them
//! receives the session explicitly.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// State threaded through one run of an input driver.
#[derive(Debug, Default)]
pub struct Session {
    mode: i64,
    done: bool,
    shutdown: Option<Arc<AtomicBool>>,
}

impl Session {
    /// Fresh session in mode 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an external shutdown flag (set e.g. by a Ctrl-C handler).
    pub fn with_shutdown(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = Some(flag);
        self
    }

    pub fn mode(&self) -> i64 {
        self.mode
    }

    /// Shift the mode counter.  The counter is unbounded and may go negative.
    pub fn step_mode(&mut self, step: i64) {
        self.mode = self.mode.saturating_add(step);
    }

    /// Mark the session as finished (Stop action, end of playback, …).
    pub fn finish(&mut self) {
        self.done = true;
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// `true` once the session finished or an external shutdown was requested.
    pub fn should_stop(&self) -> bool {
        self.done
            || self
                .shutdown
                .as_ref()
                .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }
}

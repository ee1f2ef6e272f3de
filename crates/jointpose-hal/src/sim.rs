//! In-process simulated transport for tests and dry runs.
//!
//! [`SimSink`] records every publish it receives and logs it, without
//! touching a robot.  Clones share the same log, so a test can keep one
//! handle while the controller owns another.
//!
//! # Example
//!
//! ```rust
//! use jointpose_hal::sim::SimSink;
//! use jointpose_hal::sink::CommandSink;
//!
//! let sink = SimSink::new();
//! let mut handle = sink.clone();
//! handle
//!     .publish("left", &["left_s0".to_string()], &[0.25])
//!     .expect("sim publish must succeed");
//!
//! assert_eq!(sink.published().len(), 1);
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use jointpose_types::PoseError;
use tracing::info;

use crate::sink::CommandSink;

/// One publish call captured by [`SimSink`].
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedCommand {
    pub group: String,
    pub names: Vec<String>,
    pub positions: Vec<f64>,
}

/// A simulated command sink.  Always succeeds.
#[derive(Debug, Clone, Default)]
pub struct SimSink {
    log: Arc<Mutex<Vec<PublishedCommand>>>,
}

impl SimSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every publish received so far, oldest first.
    pub fn published(&self) -> Vec<PublishedCommand> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drop the recorded history.
    pub fn clear(&self) {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl CommandSink for SimSink {
    fn publish(&mut self, group: &str, names: &[String], positions: &[f64]) -> Result<(), PoseError> {
        info!(group, ?names, ?positions, "sim publish");
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(PublishedCommand {
                group: group.to_string(),
                names: names.to_vec(),
                positions: positions.to_vec(),
            });
        Ok(())
    }
}

//! Generic `CommandSink` trait for anything that can carry a joint position
//! command to a physical group.
//!
//! Transports implement this trait (the rosbridge adapter in
//! `jointpose-middleware`, [`SimSink`][crate::sim::SimSink] in tests).  The
//! controller only ever talks to the trait, so transports can be swapped
//! without touching input or playback logic.

use jointpose_types::PoseError;

/// Outbound half of a transport: publishes one group's full joint state.
pub trait CommandSink: Send {
    /// Publish absolute `positions` for `names` to `group`.
    ///
    /// `names` and `positions` have equal length and share the ordering of
    /// the session's joint state.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::Transport`] or [`PoseError::Channel`] if the
    /// command cannot be handed to the transport.
    fn publish(&mut self, group: &str, names: &[String], positions: &[f64]) -> Result<(), PoseError>;
}

impl<S: CommandSink + ?Sized> CommandSink for Box<S> {
    fn publish(&mut self, group: &str, names: &[String], positions: &[f64]) -> Result<(), PoseError> {
        (**self).publish(group, names, positions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal in-process sink used only for tests.
    struct CountingSink {
        calls: usize,
    }

    impl CommandSink for CountingSink {
        fn publish(&mut self, _group: &str, names: &[String], positions: &[f64]) -> Result<(), PoseError> {
            assert_eq!(names.len(), positions.len());
            self.calls += 1;
            Ok(())
        }
    }

    #[test]
    fn boxed_sink_forwards_to_inner() {
        let mut sink = Box::new(CountingSink { calls: 0 });
        CommandSink::publish(&mut sink, "left", &["left_s0".to_string()], &[0.1]).unwrap();
        CommandSink::publish(&mut sink, "right", &[], &[]).unwrap();
        assert_eq!(sink.calls, 2);
    }
}

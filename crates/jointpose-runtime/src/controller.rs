//! [`CommandController`] – applies commands to the joint state and publishes
//! the result per group.
//!
//! The controller exclusively owns the [`ActuatorStateStore`].  Drivers talk
//! to it through the [`JointCommander`] capability so the same driver code
//! works against the plain controller (single-threaded tests) and against a
//! [`SharedController`] that also accepts feedback from a transport task.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use jointpose_hal::{ActuatorStateStore, CommandSink, GroupPartition, split_by_group};
use jointpose_types::{CommandRequest, JointState, PoseError};
use tracing::{debug, instrument};

use crate::recorder::Recorder;

// ────────────────────────────────────────────────────────────────────────────
// Commander capability
// ────────────────────────────────────────────────────────────────────────────

/// What input drivers and the player need from a controller.
pub trait JointCommander {
    /// Apply `request` and publish the resulting state.  Returns the full
    /// post-update snapshot.
    fn command(&mut self, request: CommandRequest) -> Result<JointState, PoseError>;

    /// Append the current snapshot to the recording, if one is configured.
    fn record(&mut self) -> Result<(), PoseError>;

    /// Copy of the current joint state.
    fn snapshot(&self) -> JointState;
}

// ────────────────────────────────────────────────────────────────────────────
// CommandController
// ────────────────────────────────────────────────────────────────────────────

/// Owns the joint state, the group partition, the outbound sink and the
/// optional recorder.
///
/// Every successful [`command`](Self::command) publishes the full state of
/// each configured group, not just the joints that changed.
pub struct CommandController {
    store: ActuatorStateStore,
    partition: Box<dyn GroupPartition>,
    sink: Box<dyn CommandSink>,
    recorder: Option<Recorder>,
}

impl CommandController {
    /// Controller with an empty store and no recorder.
    pub fn new(
        partition: impl GroupPartition + 'static,
        sink: impl CommandSink + 'static,
    ) -> Self {
        Self {
            store: ActuatorStateStore::new(),
            partition: Box::new(partition),
            sink: Box::new(sink),
            recorder: None,
        }
    }

    /// Enable recording to `recorder`.
    pub fn with_recorder(mut self, recorder: Recorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// The configured recorder, if any.
    pub fn recorder(&self) -> Option<&Recorder> {
        self.recorder.as_ref()
    }

    /// Read-only view of the joint state.
    pub fn store(&self) -> &ActuatorStateStore {
        &self.store
    }

    /// Merge feedback that already carries fully qualified names.
    pub fn merge(&mut self, report: &JointState) {
        self.store.merge(report);
    }

    /// Merge one group's feedback; names are prefixed with `group_`.
    pub fn report_joint_positions(&mut self, group: &str, names: &[String], positions: &[f64]) {
        self.store.report_joint_positions(group, names, positions);
    }

    /// Apply `request`, then publish every non-empty group's full state.
    ///
    /// # Errors
    ///
    /// * [`PoseError::UngroupableName`] when a requested name belongs to no
    ///   group; the state is left unchanged.
    /// * [`PoseError::UnknownActuator`] from the store.
    /// * Whatever the sink reports while publishing.  The store already
    ///   holds the new state by then and groups ahead of the failing one
    ///   have been sent.  Nothing is rolled back; the next feedback report
    ///   brings the store back in line with the robot.
    #[instrument(level = "debug", skip_all, fields(mode = ?request.mode, targets = request.targets.len()))]
    pub fn command(&mut self, request: CommandRequest) -> Result<JointState, PoseError> {
        if let Some(name) = request
            .targets
            .names()
            .find(|n| self.partition.group_of(n).is_none())
        {
            return Err(PoseError::UngroupableName(name.to_string()));
        }

        let snapshot = self.store.apply(&request)?;

        let (groups, orphans) = split_by_group(self.partition.as_ref(), &snapshot);
        if !orphans.is_empty() {
            debug!(?orphans, "joints without a publish group were not sent");
        }
        for (group, state) in groups {
            let names: Vec<String> = state.names().map(str::to_string).collect();
            let positions: Vec<f64> = state.positions().collect();
            self.sink.publish(&group, &names, &positions)?;
        }
        Ok(snapshot)
    }

    /// Record the current snapshot.  A no-op when no recorder is configured.
    pub fn record(&mut self) -> Result<(), PoseError> {
        match self.recorder.as_mut() {
            Some(recorder) => recorder.append(self.store.snapshot()),
            None => {
                debug!("record requested but no output file is configured");
                Ok(())
            }
        }
    }
}

impl JointCommander for CommandController {
    fn command(&mut self, request: CommandRequest) -> Result<JointState, PoseError> {
        CommandController::command(self, request)
    }

    fn record(&mut self) -> Result<(), PoseError> {
        CommandController::record(self)
    }

    fn snapshot(&self) -> JointState {
        self.store.snapshot().clone()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Shared handle
// ────────────────────────────────────────────────────────────────────────────

/// Cloneable, lock-protected controller handle.
///
/// Feedback merges from the transport and commands from the input loop all
/// go through the same mutex, so a merge never interleaves with a command.
#[derive(Clone)]
pub struct SharedController {
    inner: Arc<Mutex<CommandController>>,
}

impl SharedController {
    /// Wrap `controller` for sharing with a transport task.
    pub fn new(controller: CommandController) -> Self {
        Self {
            inner: Arc::new(Mutex::new(controller)),
        }
    }

    /// Lock the controller for a compound operation.
    pub fn lock(&self) -> MutexGuard<'_, CommandController> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Merge fully qualified feedback under the lock.
    pub fn merge(&self, report: &JointState) {
        self.lock().merge(report);
    }

    /// Merge one group's feedback under the lock.
    pub fn report_joint_positions(&self, group: &str, names: &[String], positions: &[f64]) {
        self.lock().report_joint_positions(group, names, positions);
    }
}

impl JointCommander for SharedController {
    fn command(&mut self, request: CommandRequest) -> Result<JointState, PoseError> {
        self.lock().command(request)
    }

    fn record(&mut self) -> Result<(), PoseError> {
        self.lock().record()
    }

    fn snapshot(&self) -> JointState {
        self.lock().store().snapshot().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jointpose_hal::PrefixPartition;
    use jointpose_hal::sim::SimSink;

    /// Sink that fails every publish.
    struct BrokenSink;

    impl CommandSink for BrokenSink {
        fn publish(&mut self, _: &str, _: &[String], _: &[f64]) -> Result<(), PoseError> {
            Err(PoseError::Transport("link down".to_string()))
        }
    }

    /// Sink that accepts `left` and fails on every other group.
    struct LeftOnlySink;

    impl CommandSink for LeftOnlySink {
        fn publish(&mut self, group: &str, _: &[String], _: &[f64]) -> Result<(), PoseError> {
            if group != "left" {
                return Err(PoseError::Transport(format!("{group} link down")));
            }
            Ok(())
        }
    }

    fn seeded(sink: SimSink) -> CommandController {
        let mut controller = CommandController::new(PrefixPartition::dual_arm(), sink);
        controller.report_joint_positions("left", &["s0".to_string(), "s1".to_string()], &[0.0, 0.0]);
        controller.report_joint_positions("right", &["s0".to_string()], &[0.0]);
        controller
    }

    #[test]
    fn command_publishes_full_state_per_group() {
        let sink = SimSink::new();
        let mut controller = seeded(sink.clone());

        controller.command(CommandRequest::delta("left_s1", 0.5)).unwrap();

        let published = sink.published();
        assert_eq!(published.len(), 2);
        assert_eq!(published[0].group, "left");
        assert_eq!(published[0].names, vec!["left_s0", "left_s1"]);
        assert_eq!(published[0].positions, vec![0.0, 0.5]);
        assert_eq!(published[1].group, "right");
        assert_eq!(published[1].positions, vec![0.0]);
    }

    #[test]
    fn unknown_actuator_publishes_nothing() {
        let sink = SimSink::new();
        let mut controller = seeded(sink.clone());

        let result = controller.command(CommandRequest::delta("left_w2", 0.1));
        assert_eq!(result, Err(PoseError::UnknownActuator("left_w2".to_string())));
        assert!(sink.published().is_empty());
    }

    #[test]
    fn ungroupable_name_is_rejected_before_mutation() {
        let sink = SimSink::new();
        let mut controller = seeded(sink.clone());
        let before = controller.snapshot();

        let targets: JointState = [("center_head", 0.3)].into_iter().collect();
        let result = controller.command(CommandRequest::absolute(targets));

        assert_eq!(result, Err(PoseError::UngroupableName("center_head".to_string())));
        assert_eq!(controller.snapshot(), before);
        assert!(sink.published().is_empty());
    }

    #[test]
    fn feedback_only_groups_are_not_published() {
        let sink = SimSink::new();
        let mut controller = seeded(sink.clone());
        controller.report_joint_positions("head", &["pan".to_string()], &[0.2]);

        controller.command(CommandRequest::delta("right_s0", 0.1)).unwrap();

        assert!(sink.published().iter().all(|p| p.group != "head"));
        assert_eq!(controller.store().get("head_pan"), Some(0.2));
    }

    #[test]
    fn sink_failure_is_propagated() {
        let mut controller = CommandController::new(PrefixPartition::dual_arm(), BrokenSink);
        let targets: JointState = [("left_s0", 0.1)].into_iter().collect();
        let result = controller.command(CommandRequest::absolute(targets));
        assert!(matches!(result, Err(PoseError::Transport(_))));
    }

    #[test]
    fn partial_publish_keeps_applied_state() {
        let mut controller = CommandController::new(PrefixPartition::dual_arm(), LeftOnlySink);
        controller.report_joint_positions("left", &["s0".to_string()], &[0.0]);
        controller.report_joint_positions("right", &["s0".to_string()], &[0.0]);

        let result = controller.command(CommandRequest::delta("right_s0", 0.2));

        assert!(matches!(result, Err(PoseError::Transport(_))));
        assert_eq!(controller.store().get("right_s0"), Some(0.2));

        controller.report_joint_positions("right", &["s0".to_string()], &[0.0]);
        assert_eq!(controller.store().get("right_s0"), Some(0.0));
    }

    #[test]
    fn record_without_recorder_is_noop() {
        let mut controller = seeded(SimSink::new());
        assert!(controller.record().is_ok());
        assert!(controller.recorder().is_none());
    }

    #[test]
    fn record_appends_current_snapshot() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("out.csv");
        let mut controller = seeded(SimSink::new()).with_recorder(Recorder::new(&path));

        controller.command(CommandRequest::delta("left_s0", 0.25)).unwrap();
        controller.record().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "left_s0,left_s1,right_s0\n0.25,0.0,0.0\n");
    }

    #[test]
    fn shared_controller_merges_from_other_threads() {
        let sink = SimSink::new();
        let mut shared = SharedController::new(seeded(sink));

        let feedback = shared.clone();
        std::thread::spawn(move || {
            feedback.report_joint_positions("left", &["s0".to_string()], &[1.0]);
        })
        .join()
        .unwrap();

        let snapshot = shared.command(CommandRequest::delta("left_s0", 0.5)).unwrap();
        assert_eq!(snapshot.get("left_s0"), Some(1.5));
    }
}

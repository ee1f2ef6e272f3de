//! [`ActuatorStateStore`] – canonical, always-current joint positions.
//!
//! Feedback from every limb lands in one flat [`JointState`], so the rest of
//! the system can look a joint up by name without knowing which group
//! reported it.  Commands are applied against the same map.

use jointpose_types::{CommandMode, CommandRequest, JointState, PoseError};
use tracing::warn;

/// Last-known position of every actuator seen during a session.
#[derive(Debug, Default, Clone)]
pub struct ActuatorStateStore {
    state: JointState,
}

impl ActuatorStateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite every position present in `report`.  Names absent from the
    /// report are untouched; unknown names are inserted.
    pub fn merge(&mut self, report: &JointState) {
        for (name, position) in report.iter() {
            self.state.set(name, position);
        }
    }

    /// Merge one group's feedback, prefixing each joint name with `group_`.
    ///
    /// Trailing entries without a counterpart in the other slice are ignored.
    pub fn report_joint_positions(&mut self, group: &str, names: &[String], positions: &[f64]) {
        if names.len() != positions.len() {
            warn!(
                group,
                names = names.len(),
                positions = positions.len(),
                "joint state report has mismatched lengths"
            );
        }
        for (name, &position) in names.iter().zip(positions) {
            self.state.set(format!("{group}_{name}"), position);
        }
    }

    /// Apply `request` and return the full post-update snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::UnknownActuator`] when a delta targets a name the
    /// store has never seen.  Every name is checked before anything is
    /// written, so a failing request leaves the store unchanged.
    pub fn apply(&mut self, request: &CommandRequest) -> Result<JointState, PoseError> {
        match request.mode {
            CommandMode::Delta => {
                if let Some(unknown) = request.targets.names().find(|n| !self.state.contains(n)) {
                    return Err(PoseError::UnknownActuator(unknown.to_string()));
                }
                for (name, delta) in request.targets.iter() {
                    let current = self.state.get(name).unwrap_or_default();
                    self.state.set(name, current + delta);
                }
            }
            CommandMode::Absolute => self.merge(&request.targets),
        }
        Ok(self.state.clone())
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.state.get(name)
    }

    /// Borrow the current snapshot.
    pub fn snapshot(&self) -> &JointState {
        &self.state
    }
}

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Ordered mapping of actuator name → position.
///
/// Insertion order is preserved and never changes once a name has been
/// inserted: overwriting an existing name keeps its slot.  This is the order
/// used for the recording header and for per-group publishing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JointState {
    entries: Vec<(String, f64)>,
    index: HashMap<String, usize>,
}

impl JointState {
    /// Create an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return the position stored under `name`, if any.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.index.get(name).map(|&i| self.entries[i].1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Store `position` under `name`.
    ///
    /// A new name is appended at the end; an existing name is overwritten in
    /// place.  Returns the previous value when the name already existed.
    pub fn set(&mut self, name: impl Into<String>, position: f64) -> Option<f64> {
        let name = name.into();
        match self.index.get(&name) {
            Some(&i) => Some(std::mem::replace(&mut self.entries[i].1, position)),
            None => {
                self.index.insert(name.clone(), self.entries.len());
                self.entries.push((name, position));
                None
            }
        }
    }

    /// Iterate over `(name, position)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(n, p)| (n.as_str(), *p))
    }

    /// Iterate over names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    /// Iterate over positions in insertion order.
    pub fn positions(&self) -> impl Iterator<Item = f64> + '_ {
        self.entries.iter().map(|(_, p)| *p)
    }
}

impl<N: Into<String>> FromIterator<(N, f64)> for JointState {
    fn from_iter<I: IntoIterator<Item = (N, f64)>>(iter: I) -> Self {
        let mut state = JointState::new();
        for (name, position) in iter {
            state.set(name, position);
        }
        state
    }
}

/// Whether a [`CommandRequest`] carries increments or target positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandMode {
    /// Each value is added to the actuator's last-known position.
    Delta,
    /// Each value replaces the actuator's position.
    Absolute,
}

/// A set of per-actuator values together with how they should be applied.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRequest {
    pub mode: CommandMode,
    pub targets: JointState,
}

impl CommandRequest {
    /// Single-actuator increment, as produced by a key binding.
    pub fn delta(name: impl Into<String>, delta: f64) -> Self {
        let mut targets = JointState::new();
        targets.set(name, delta);
        Self {
            mode: CommandMode::Delta,
            targets,
        }
    }

    /// Multi-actuator increment, as produced by a joystick snapshot.
    pub fn deltas(targets: JointState) -> Self {
        Self {
            mode: CommandMode::Delta,
            targets,
        }
    }

    /// Absolute targets, as produced by playback.
    pub fn absolute(targets: JointState) -> Self {
        Self {
            mode: CommandMode::Absolute,
            targets,
        }
    }
}

/// Operation bound to an input symbol for one mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Move one actuator by a fixed increment.
    AdjustJoint { name: String, delta: f64 },
    /// Shift the mode counter by `step` (±1 in the built-in tables).
    ChangeMode { step: i64 },
    /// Print the bindings that are active in the current mode.
    ShowHelp,
    /// Append the current snapshot to the recording, if one is configured.
    Record,
    /// End the session.
    Stop,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::AdjustJoint { name, delta } => write!(f, "modify {name} by {delta}"),
            Action::ChangeMode { step } if *step >= 0 => {
                write!(f, "increment mode by {step}: switch key bindings")
            }
            Action::ChangeMode { step } => {
                write!(f, "decrement mode by {}: switch key bindings", step.unsigned_abs())
            }
            Action::ShowHelp => write!(f, "show binding help"),
            Action::Record => write!(f, "record current joint positions"),
            Action::Stop => write!(f, "stop"),
        }
    }
}

/// One reading of a gamepad, as delivered by the transport.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JoySnapshot {
    pub buttons: Vec<bool>,
    pub axes: Vec<f32>,
}

/// Unified event wrapper for the internal event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "jointpose-middleware::rosbridge/joy"
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    /// Stamp `payload` with a fresh id and the current time.
    pub fn now(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data that can be routed over the internal event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    /// Full per-group position command headed for the robot.
    JointCommand {
        group: String,
        names: Vec<String>,
        positions: Vec<f64>,
    },
    /// Joint positions reported by one group (names are not yet prefixed).
    JointFeedback {
        group: String,
        names: Vec<String>,
        positions: Vec<f64>,
    },
    Joy(JoySnapshot),
    Fault { component: String, message: String },
}

/// Error type shared by every JointPose crate.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PoseError {
    #[error("Unknown actuator: {0}")]
    UnknownActuator(String),

    #[error("Actuator '{0}' does not belong to any configured group")]
    UngroupableName(String),

    #[error("Unbound input symbol: {0:?}")]
    UnboundSymbol(String),

    #[error("Parse error on line {line}: {details}")]
    Parse { line: usize, details: String },

    #[error("I/O error on {path}: {details}")]
    Io { path: String, details: String },

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PoseError {
    /// Wrap an [`std::io::Error`] raised while touching `path`.
    pub fn io(path: impl fmt::Display, err: std::io::Error) -> Self {
        PoseError::Io {
            path: path.to_string(),
            details: err.to_string(),
        }
    }
}

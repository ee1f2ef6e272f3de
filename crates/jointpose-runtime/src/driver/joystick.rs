//! [`JoystickDriver`] – gamepad teleoperation.
//!
//! Each stick axis drives one joint, chosen from its binding by the session
//! mode.  Buttons are edge-triggered against the previous snapshot:
//!
//! | Control | Rising edge |
//! |---|---|
//! | right bumper | mode + 1 |
//! | left bumper | mode − 1 |
//! | `a` | record |
//! | `back` | stop after this snapshot's command |

use std::fmt;
use std::str::FromStr;

use jointpose_types::{CommandRequest, JointState, JoySnapshot, PoseError};
use tracing::{debug, info, warn};

use super::InputDriver;
use crate::controller::JointCommander;
use crate::session::Session;

/// Axis value → joint delta factor used unless overridden.
pub const DEFAULT_AXIS_SCALE: f64 = 0.001;

/// Known controller wirings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PadLayout {
    #[default]
    Xbox,
}

impl FromStr for PadLayout {
    type Err = PoseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "xbox" => Ok(Self::Xbox),
            other => Err(PoseError::Config(format!("unknown pad type: {other}"))),
        }
    }
}

impl fmt::Display for PadLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Xbox => f.write_str("xbox"),
        }
    }
}

/// The four analog stick axes that can drive joints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StickAxis {
    LeftHorizontal,
    LeftVertical,
    RightHorizontal,
    RightVertical,
}

/// The controls of one snapshot that drive joints or the session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PadControls {
    pub a: bool,
    pub left_bumper: bool,
    pub right_bumper: bool,
    pub back: bool,
    pub left_stick_horz: f32,
    pub left_stick_vert: f32,
    pub right_stick_horz: f32,
    pub right_stick_vert: f32,
}

impl PadControls {
    pub fn axis(&self, axis: StickAxis) -> f32 {
        match axis {
            StickAxis::LeftHorizontal => self.left_stick_horz,
            StickAxis::LeftVertical => self.left_stick_vert,
            StickAxis::RightHorizontal => self.right_stick_horz,
            StickAxis::RightVertical => self.right_stick_vert,
        }
    }
}

impl PadLayout {
    /// Decode `snapshot`.
    ///
    /// # Errors
    ///
    /// [`PoseError::MalformedInput`] when the snapshot has fewer buttons or
    /// axes than the pad reports.
    pub fn decode(&self, snapshot: &JoySnapshot) -> Result<PadControls, PoseError> {
        match self {
            Self::Xbox => {
                const BUTTONS: usize = 11;
                const AXES: usize = 8;
                if snapshot.buttons.len() < BUTTONS || snapshot.axes.len() < AXES {
                    return Err(PoseError::MalformedInput(format!(
                        "xbox pad needs {BUTTONS} buttons and {AXES} axes, got {} and {}",
                        snapshot.buttons.len(),
                        snapshot.axes.len()
                    )));
                }
                let b = &snapshot.buttons;
                let ax = &snapshot.axes;
                Ok(PadControls {
                    a: b[0],
                    left_bumper: b[4],
                    right_bumper: b[5],
                    back: b[10],
                    left_stick_horz: ax[0],
                    left_stick_vert: ax[1],
                    right_stick_horz: ax[3],
                    right_stick_vert: ax[4],
                })
            }
        }
    }
}

/// A stick axis and the joints it can drive, one per mode.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisBinding {
    pub axis: StickAxis,
    pub joints: Vec<String>,
}

impl AxisBinding {
    pub fn new<I, S>(axis: StickAxis, joints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            axis,
            joints: joints.into_iter().map(Into::into).collect(),
        }
    }

    fn joint_for(&self, mode: i64) -> Option<&str> {
        if self.joints.is_empty() {
            return None;
        }
        let idx = mode.rem_euclid(self.joints.len() as i64) as usize;
        Some(self.joints[idx].as_str())
    }
}

/// Drives joints from a stream of gamepad snapshots.
pub struct JoystickDriver<I> {
    snapshots: I,
    layout: PadLayout,
    bindings: Vec<AxisBinding>,
    scale: f64,
}

impl<I: Iterator<Item = JoySnapshot>> JoystickDriver<I> {
    pub fn new(snapshots: I, layout: PadLayout, bindings: Vec<AxisBinding>) -> Self {
        Self {
            snapshots,
            layout,
            bindings,
            scale: DEFAULT_AXIS_SCALE,
        }
    }

    /// Xbox pad with the right stick on the left arm and the left stick on
    /// the right arm.  Modes walk shoulder → elbow → wrist.
    pub fn baxter(snapshots: I) -> Self {
        Self::new(
            snapshots,
            PadLayout::Xbox,
            vec![
                AxisBinding::new(StickAxis::RightHorizontal, ["left_s0", "left_e0", "left_w0"]),
                AxisBinding::new(StickAxis::RightVertical, ["left_s1", "left_e1", "left_w1"]),
                AxisBinding::new(StickAxis::LeftHorizontal, ["right_s0", "right_e0", "right_w0"]),
                AxisBinding::new(StickAxis::LeftVertical, ["right_s1", "right_e1", "right_w1"]),
            ],
        )
    }

    pub fn with_layout(mut self, layout: PadLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    fn deltas(&self, controls: &PadControls, mode: i64) -> JointState {
        let mut deltas = JointState::new();
        for binding in &self.bindings {
            if let Some(joint) = binding.joint_for(mode) {
                deltas.set(joint, f64::from(controls.axis(binding.axis)) * self.scale);
            }
        }
        deltas
    }
}

impl<I: Iterator<Item = JoySnapshot>> InputDriver for JoystickDriver<I> {
    fn run(&mut self, commander: &mut dyn JointCommander, session: &mut Session) -> Result<(), PoseError> {
        info!(layout = %self.layout, scale = self.scale, "joystick teleoperation started");
        let mut last: Option<PadControls> = None;

        while !session.should_stop() {
            let Some(snapshot) = self.snapshots.next() else {
                break;
            };
            let controls = match self.layout.decode(&snapshot) {
                Ok(controls) => controls,
                Err(e) => {
                    warn!(error = %e, "skipping joystick snapshot");
                    continue;
                }
            };
            let previous = last.as_ref().unwrap_or(&controls);
            let rising = |now: bool, before: bool| now && !before;

            let request = CommandRequest::deltas(self.deltas(&controls, session.mode()));

            if rising(controls.right_bumper, previous.right_bumper) {
                session.step_mode(1);
                debug!(mode = session.mode(), "mode up");
            }
            if rising(controls.left_bumper, previous.left_bumper) {
                session.step_mode(-1);
                debug!(mode = session.mode(), "mode down");
            }
            if rising(controls.a, previous.a) {
                if let Err(e) = commander.record() {
                    warn!(error = %e, "record failed");
                }
            }
            let stop = rising(controls.back, previous.back);

            if let Err(e) = commander.command(request) {
                warn!(error = %e, "joystick command failed");
            }
            if stop {
                info!("back pressed, stopping");
                session.finish();
            }
            last = Some(controls);
        }
        Ok(())
    }
}

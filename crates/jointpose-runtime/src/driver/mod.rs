//! Input drivers: the loops that turn operator input into commands.
//!
//! | Driver | Input | Dispatch |
//! |---|---|---|
//! | [`KeyboardDriver`] | one raw key at a time | [`ModalBindingTable`][crate::bindings::ModalBindingTable] |
//! | [`JoystickDriver`] | gamepad snapshots | fixed axis bindings + edge-triggered buttons |
//! | [`FileDriver`] | a recorded CSV log | [`Player`][crate::player::Player] |
//!
//! Every driver runs until its session stops, so the caller decides when a
//! session ends by owning the [`Session`].

pub mod file;
pub mod joystick;
pub mod keyboard;

pub use file::FileDriver;
pub use joystick::{AxisBinding, JoystickDriver, PadControls, PadLayout, StickAxis};
pub use keyboard::{KeySource, KeyboardDriver};

use jointpose_types::PoseError;

use crate::controller::JointCommander;
use crate::session::Session;

/// A loop that feeds operator input into a [`JointCommander`].
pub trait InputDriver {
    /// Run until the session stops or the input is exhausted.
    ///
    /// Per-event errors are reported and skipped by the driver; only errors
    /// that end the session are returned.
    fn run(&mut self, commander: &mut dyn JointCommander, session: &mut Session) -> Result<(), PoseError>;
}

//! `jointpose-runtime` – the command-routing engine.
//!
//! # Modules
//!
//! - [`session`] – [`Session`]: mode counter and termination state of one
//!   control session.
//! - [`controller`] – [`CommandController`]: applies commands to the joint
//!   state and publishes every group's full state.  [`SharedController`]
//!   lets a transport task merge feedback concurrently.
//! - [`bindings`] – [`ModalBindingTable`]: symbol → per-mode actions, plus
//!   the built-in Baxter keyboard map.
//! - [`recorder`] / [`player`] – CSV recording and timed replay.
//! - [`driver`] – keyboard, joystick and file input loops.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing].

pub mod bindings;
pub mod controller;
pub mod driver;
pub mod player;
pub mod recorder;
pub mod session;
pub mod telemetry;

pub use bindings::{ModalBindingTable, interpret};
pub use controller::{CommandController, JointCommander, SharedController};
pub use driver::{FileDriver, InputDriver, JoystickDriver, KeySource, KeyboardDriver, PadLayout};
pub use player::{Pacer, Player, ThreadPacer};
pub use recorder::Recorder;
pub use session::Session;
pub use telemetry::{TracerProviderGuard, init_tracing};

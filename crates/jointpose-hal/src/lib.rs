//! `jointpose-hal` – joint state and the outbound command seam.
//!
//! # Modules
//!
//! - [`state`] – [`ActuatorStateStore`]: the canonical actuator-name →
//!   position map fed by feedback and mutated by commands.
//! - [`partition`] – [`GroupPartition`]: decides which physical group (limb)
//!   each actuator is published to.
//! - [`sink`] – [`CommandSink`]: the transport-facing publish capability.
//! - [`sim`] – [`SimSink`][sim::SimSink]: a recording sink for tests and dry
//!   runs.

pub mod partition;
pub mod sim;
pub mod sink;
pub mod state;

pub use partition::{GroupPartition, PrefixPartition, split_by_group};
pub use sink::CommandSink;
pub use state::ActuatorStateStore;

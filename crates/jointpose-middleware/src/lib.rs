//! `jointpose-middleware` – moves commands, feedback and gamepad input
//! between the engine and the robot.
//!
//! # Modules
//!
//! - [`bus`] – topic-based publish/subscribe event bus on Tokio broadcast
//!   channels.
//! - [`rosbridge`] – rosbridge_server WebSocket client, the bus-backed
//!   [`BusSink`] and the feedback pump that merges robot joint states into
//!   a [`SharedController`][jointpose_runtime::SharedController].

pub mod bus;
pub mod rosbridge;

pub use bus::{EventBus, Topic, TopicReceiver};
pub use rosbridge::{BusSink, JoyStream, LimbTopics, RosbridgeClient, spawn_feedback_pump};

//! Topic-based publish/subscribe event bus.
//!
//! Each [`Topic`] is its own [`tokio::sync::broadcast`] channel, so every
//! subscriber sees every event on its lane and a slow subscriber only lags
//! itself.
//!
//! | Topic | Traffic |
//! |---|---|
//! | [`Topic::JointCommands`] | Per-group position commands headed for the robot |
//! | [`Topic::JointFeedback`] | Joint states reported by the robot |
//! | [`Topic::Joystick`] | Gamepad snapshots |
//! | [`Topic::SystemAlerts`] | Faults and shutdown notices |

use jointpose_types::{Event, PoseError};
use tokio::sync::broadcast;

/// Buffered events per topic before slow subscribers start lagging.
const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    JointCommands,
    JointFeedback,
    Joystick,
    SystemAlerts,
}

/// Cheap to clone; all clones share the same channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    joint_commands: broadcast::Sender<Event>,
    joint_feedback: broadcast::Sender<Event>,
    joystick: broadcast::Sender<Event>,
    system_alerts: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a bus whose topics each buffer `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let (joint_commands, _) = broadcast::channel(capacity);
        let (joint_feedback, _) = broadcast::channel(capacity);
        let (joystick, _) = broadcast::channel(capacity);
        let (system_alerts, _) = broadcast::channel(capacity);
        Self {
            joint_commands,
            joint_feedback,
            joystick,
            system_alerts,
        }
    }

    /// Publish `event` on `topic` and return how many subscribers got it.
    ///
    /// # Errors
    ///
    /// [`PoseError::Channel`] when nobody is subscribed to `topic`.
    pub fn publish_to(&self, topic: Topic, event: Event) -> Result<usize, PoseError> {
        self.sender(topic)
            .send(event)
            .map_err(|_| PoseError::Channel(format!("no subscribers for topic {topic:?}")))
    }

    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.sender(topic).subscribe(),
        }
    }

    /// Number of live subscribers on `topic`.
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.sender(topic).receiver_count()
    }

    fn sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::JointCommands => &self.joint_commands,
            Topic::JointFeedback => &self.joint_feedback,
            Topic::Joystick => &self.joystick,
            Topic::SystemAlerts => &self.system_alerts,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Receiver bound to a single [`Topic`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next event.
    ///
    /// `Lagged(n)` means `n` events were overwritten before this receiver
    /// read them; `Closed` means every sender is gone.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// Non-blocking poll.
    pub fn try_recv(&mut self) -> Result<Event, broadcast::error::TryRecvError> {
        self.receiver.try_recv()
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }
}

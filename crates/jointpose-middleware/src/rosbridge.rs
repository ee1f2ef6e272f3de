//! rosbridge_server transport.
//!
//! [`RosbridgeClient`] speaks the rosbridge v2 JSON protocol over a
//! WebSocket and connects it to the [`EventBus`]:
//!
//! * **Outbound** – every [`EventPayload::JointCommand`] on
//!   [`Topic::JointCommands`] becomes a `publish` frame on the group's
//!   `command_joint_position` topic, carrying `{"names": [...], "angles": [...]}`.
//! * **Inbound** – `joint_states` frames become [`EventPayload::JointFeedback`]
//!   on [`Topic::JointFeedback`], and `/joy` frames become
//!   [`EventPayload::Joy`] on [`Topic::Joystick`].
//!
//! Inbound frames that cannot be decoded are logged and dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use jointpose_hal::CommandSink;
use jointpose_runtime::SharedController;
use jointpose_types::{Event, EventPayload, JoySnapshot, PoseError};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::bus::{EventBus, Topic, TopicReceiver};

/// rosbridge topic carrying gamepad state.
pub const JOY_TOPIC: &str = "/joy";

const SOURCE: &str = "jointpose-middleware::rosbridge";

// ────────────────────────────────────────────────────────────────────────────
// Topic naming and frame codec
// ────────────────────────────────────────────────────────────────────────────

/// ROS topic names for each limb group.
///
/// Groups are kept in the order given; the handshake advertises and
/// subscribes them in that order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimbTopics {
    groups: Vec<String>,
}

impl LimbTopics {
    /// Baxter naming: `/robot/limb/<group>/...`.
    ///
    /// ```
    /// use jointpose_middleware::LimbTopics;
    ///
    /// let topics = LimbTopics::baxter(["left", "right"]);
    /// assert_eq!(topics.feedback_topic("left"), "/robot/limb/left/joint_states");
    /// ```
    pub fn baxter<I, S>(groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            groups: groups.into_iter().map(Into::into).collect(),
        }
    }

    /// Configured groups, in handshake order.
    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    /// Topic that carries position commands for `group`.
    pub fn command_topic(&self, group: &str) -> String {
        format!("/robot/limb/{group}/endpoint/command_joint_position")
    }

    /// Topic on which `group` reports its joint states.
    pub fn feedback_topic(&self, group: &str) -> String {
        format!("/robot/limb/{group}/joint_states")
    }

    /// The group whose feedback arrives on `topic`.
    pub fn group_for_feedback(&self, topic: &str) -> Option<&str> {
        self.groups
            .iter()
            .find(|g| self.feedback_topic(g) == topic)
            .map(String::as_str)
    }

    /// Advertise and subscribe frames sent right after connecting.
    pub fn handshake_frames(&self) -> Vec<Value> {
        let mut frames = Vec::with_capacity(self.groups.len() * 2 + 1);
        for group in &self.groups {
            frames.push(json!({
                "op": "advertise",
                "topic": self.command_topic(group),
                "type": "baxter_joint_msgs/JointPosition",
            }));
            frames.push(json!({
                "op": "subscribe",
                "topic": self.feedback_topic(group),
                "type": "sensor_msgs/JointState",
            }));
        }
        frames.push(json!({
            "op": "subscribe",
            "topic": JOY_TOPIC,
            "type": "sensor_msgs/Joy",
        }));
        frames
    }

    /// `publish` frame for one group's command.
    pub fn command_frame(&self, group: &str, names: &[String], positions: &[f64]) -> Value {
        json!({
            "op": "publish",
            "topic": self.command_topic(group),
            "msg": { "names": names, "angles": positions },
        })
    }

    /// Decode one inbound frame.
    ///
    /// `Ok(None)` for frames this client does not consume (other ops or
    /// topics).
    ///
    /// # Errors
    ///
    /// [`PoseError::MalformedInput`] for invalid JSON or a message whose
    /// fields do not match the topic's type.
    pub fn decode_frame(&self, text: &str) -> Result<Option<(Topic, EventPayload)>, PoseError> {
        let frame: Value = serde_json::from_str(text)
            .map_err(|e| PoseError::MalformedInput(format!("rosbridge frame: {e}")))?;
        if frame.get("op").and_then(Value::as_str) != Some("publish") {
            return Ok(None);
        }
        let Some(topic) = frame.get("topic").and_then(Value::as_str) else {
            return Ok(None);
        };
        let msg = &frame["msg"];

        if topic == JOY_TOPIC {
            let buttons = array_of(msg, "buttons", topic, |v| {
                v.as_i64().map(|b| b == 1).or_else(|| v.as_bool())
            })?;
            let axes = array_of(msg, "axes", topic, |v| v.as_f64().map(|a| a as f32))?;
            return Ok(Some((Topic::Joystick, EventPayload::Joy(JoySnapshot { buttons, axes }))));
        }

        if let Some(group) = self.group_for_feedback(topic) {
            let names = array_of(msg, "name", topic, |v| v.as_str().map(str::to_string))?;
            let positions = array_of(msg, "position", topic, Value::as_f64)?;
            return Ok(Some((
                Topic::JointFeedback,
                EventPayload::JointFeedback {
                    group: group.to_string(),
                    names,
                    positions,
                },
            )));
        }
        Ok(None)
    }
}

fn array_of<T>(
    msg: &Value,
    field: &str,
    topic: &str,
    item: impl Fn(&Value) -> Option<T>,
) -> Result<Vec<T>, PoseError> {
    let malformed = || PoseError::MalformedInput(format!("{topic}: bad or missing '{field}'"));
    msg.get(field)
        .and_then(Value::as_array)
        .ok_or_else(malformed)?
        .iter()
        .map(|v| item(v).ok_or_else(malformed))
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Outbound sink
// ────────────────────────────────────────────────────────────────────────────

/// [`CommandSink`] that hands commands to the bus for the transport task.
///
/// Publishing fails with [`PoseError::Channel`] when no transport task is
/// subscribed to [`Topic::JointCommands`].
#[derive(Clone)]
pub struct BusSink {
    bus: EventBus,
}

impl BusSink {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }
}

impl CommandSink for BusSink {
    fn publish(&mut self, group: &str, names: &[String], positions: &[f64]) -> Result<(), PoseError> {
        let event = Event::now(
            "jointpose-middleware::controller",
            EventPayload::JointCommand {
                group: group.to_string(),
                names: names.to_vec(),
                positions: positions.to_vec(),
            },
        );
        self.bus.publish_to(Topic::JointCommands, event).map(|_| ())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Client
// ────────────────────────────────────────────────────────────────────────────

/// A connected rosbridge session.
///
/// Subscribes to the command and alert lanes at connect time, so commands
/// published after [`RosbridgeClient::connect`] returns are never lost.
pub struct RosbridgeClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    topics: LimbTopics,
    bus: EventBus,
    commands: TopicReceiver,
    alerts: TopicReceiver,
}

impl RosbridgeClient {
    /// Connect to `url` and subscribe to the bus lanes this client serves.
    ///
    /// # Errors
    ///
    /// [`PoseError::Transport`] when the WebSocket handshake fails.
    pub async fn connect(url: &str, topics: LimbTopics, bus: EventBus) -> Result<Self, PoseError> {
        let (ws, _response) = connect_async(url)
            .await
            .map_err(|e| PoseError::Transport(format!("rosbridge connect to {url} failed: {e}")))?;
        info!(url, "connected to rosbridge");
        Ok(Self {
            ws,
            commands: bus.subscribe_to(Topic::JointCommands),
            alerts: bus.subscribe_to(Topic::SystemAlerts),
            topics,
            bus,
        })
    }

    /// Pump frames until the server closes, the socket fails or a
    /// [`Topic::SystemAlerts`] event arrives.
    pub async fn run(self) -> Result<(), PoseError> {
        let Self {
            ws,
            topics,
            bus,
            mut commands,
            mut alerts,
        } = self;
        let (mut ws_tx, mut ws_rx) = ws.split();

        for frame in topics.handshake_frames() {
            ws_tx
                .send(Message::Text(frame.to_string().into()))
                .await
                .map_err(|e| PoseError::Transport(format!("rosbridge handshake: {e}")))?;
        }

        loop {
            tokio::select! {
                result = commands.recv() => match result {
                    Ok(Event { payload: EventPayload::JointCommand { group, names, positions }, .. }) => {
                        let frame = topics.command_frame(&group, &names, &positions);
                        ws_tx
                            .send(Message::Text(frame.to_string().into()))
                            .await
                            .map_err(|e| PoseError::Transport(format!("rosbridge send: {e}")))?;
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(n)) => warn!(dropped = n, "command lane lagged"),
                    Err(RecvError::Closed) => break,
                },
                result = alerts.recv() => {
                    if let Ok(event) = result {
                        info!(source = %event.source, "closing rosbridge session on system alert");
                    }
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
                msg = ws_rx.next() => match msg {
                    Some(Ok(Message::Text(text))) => handle_incoming(&topics, &bus, text.as_str()),
                    Some(Ok(Message::Close(_))) | None => {
                        info!("rosbridge closed the connection");
                        break;
                    }
                    Some(Err(e)) => return Err(PoseError::Transport(format!("rosbridge receive: {e}"))),
                    Some(Ok(_)) => {}
                },
            }
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Inbound routing
// ────────────────────────────────────────────────────────────────────────────

/// Decode `text` and publish the result; undecodable frames are logged.
pub fn handle_incoming(topics: &LimbTopics, bus: &EventBus, text: &str) {
    match topics.decode_frame(text) {
        Ok(Some((topic, payload))) => {
            if let Err(e) = bus.publish_to(topic, Event::now(SOURCE, payload)) {
                debug!(?topic, error = %e, "inbound frame had no consumer");
            }
        }
        Ok(None) => {}
        Err(e) => warn!(error = %e, "ignoring rosbridge frame"),
    }
}

/// Forward every [`EventPayload::JointFeedback`] into `controller`.
///
/// Must be called from within a Tokio runtime.
pub fn spawn_feedback_pump(bus: &EventBus, controller: SharedController) -> JoinHandle<()> {
    let mut feedback = bus.subscribe_to(Topic::JointFeedback);
    tokio::spawn(async move {
        loop {
            match feedback.recv().await {
                Ok(Event {
                    payload: EventPayload::JointFeedback { group, names, positions },
                    ..
                }) => controller.report_joint_positions(&group, &names, &positions),
                Ok(_) => {}
                Err(RecvError::Lagged(n)) => warn!(dropped = n, "feedback lane lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Joystick stream
// ────────────────────────────────────────────────────────────────────────────

/// Blocking iterator over joystick snapshots, for the joystick driver.
///
/// Ends when the bus closes or the shutdown flag is raised.
pub struct JoyStream {
    receiver: TopicReceiver,
    runtime: tokio::runtime::Handle,
    shutdown: Option<Arc<AtomicBool>>,
}

impl JoyStream {
    /// How long one wait lasts before the shutdown flag is checked again.
    const POLL: Duration = Duration::from_millis(100);

    pub fn new(bus: &EventBus, runtime: tokio::runtime::Handle) -> Self {
        Self {
            receiver: bus.subscribe_to(Topic::Joystick),
            runtime,
            shutdown: None,
        }
    }

    pub fn with_shutdown(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = Some(flag);
        self
    }
}

impl Iterator for JoyStream {
    type Item = JoySnapshot;

    fn next(&mut self) -> Option<JoySnapshot> {
        loop {
            if self.shutdown.as_ref().is_some_and(|f| f.load(Ordering::SeqCst)) {
                return None;
            }
            // The timer has to be created inside the runtime, so build it in the future.
            let receiver = &mut self.receiver;
            let waited = self
                .runtime
                .block_on(async { tokio::time::timeout(Self::POLL, receiver.recv()).await });
            match waited {
                Err(_elapsed) => continue,
                Ok(Ok(Event {
                    payload: EventPayload::Joy(snapshot),
                    ..
                })) => return Some(snapshot),
                Ok(Ok(_)) => continue,
                Ok(Err(RecvError::Lagged(n))) => warn!(dropped = n, "joystick lane lagged"),
                Ok(Err(RecvError::Closed)) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jointpose_hal::PrefixPartition;
    use jointpose_runtime::{CommandController, JointCommander};
    use jointpose_types::CommandRequest;

    fn topics() -> LimbTopics {
        LimbTopics::baxter(["left", "right"])
    }

    #[test]
    fn baxter_topic_names() {
        let topics = topics();
        assert_eq!(
            topics.command_topic("left"),
            "/robot/limb/left/endpoint/command_joint_position"
        );
        assert_eq!(topics.group_for_feedback("/robot/limb/right/joint_states"), Some("right"));
        assert_eq!(topics.group_for_feedback("/robot/head/joint_states"), None);
        assert_eq!(topics.handshake_frames().len(), 5);
    }

    #[test]
    fn command_frame_carries_names_and_angles() {
        let frame = topics().command_frame("right", &["right_s0".to_string()], &[0.25]);
        assert_eq!(frame["op"], "publish");
        assert_eq!(frame["topic"], "/robot/limb/right/endpoint/command_joint_position");
        assert_eq!(frame["msg"]["names"][0], "right_s0");
        assert_eq!(frame["msg"]["angles"][0], 0.25);
    }

    #[test]
    fn decodes_joint_states() {
        let text = r#"{"op":"publish","topic":"/robot/limb/left/joint_states",
            "msg":{"name":["s0","s1"],"position":[0.1,-0.2],"velocity":[]}}"#;
        let (topic, payload) = topics().decode_frame(text).unwrap().unwrap();
        assert_eq!(topic, Topic::JointFeedback);
        match payload {
            EventPayload::JointFeedback { group, names, positions } => {
                assert_eq!(group, "left");
                assert_eq!(names, vec!["s0", "s1"]);
                assert_eq!(positions, vec![0.1, -0.2]);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn decodes_joy() {
        let text = r#"{"op":"publish","topic":"/joy","msg":{"buttons":[1,0],"axes":[0.5]}}"#;
        let (topic, payload) = topics().decode_frame(text).unwrap().unwrap();
        assert_eq!(topic, Topic::Joystick);
        match payload {
            EventPayload::Joy(snapshot) => {
                assert_eq!(snapshot.buttons, vec![true, false]);
                assert_eq!(snapshot.axes, vec![0.5]);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn other_frames_are_ignored_and_garbage_rejected() {
        let topics = topics();
        assert!(topics.decode_frame(r#"{"op":"status","level":"info"}"#).unwrap().is_none());
        assert!(
            topics
                .decode_frame(r#"{"op":"publish","topic":"/tf","msg":{}}"#)
                .unwrap()
                .is_none()
        );
        assert!(matches!(
            topics.decode_frame("not json"),
            Err(PoseError::MalformedInput(_))
        ));
        assert!(matches!(
            topics.decode_frame(r#"{"op":"publish","topic":"/joy","msg":{"axes":[]}}"#),
            Err(PoseError::MalformedInput(_))
        ));
    }

    #[tokio::test]
    async fn bus_sink_publishes_joint_commands() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut rx = bus.subscribe_to(Topic::JointCommands);
        let mut sink = BusSink::new(bus.clone());

        sink.publish("left", &["left_s0".to_string()], &[0.5])?;

        let event = rx.recv().await?;
        assert!(matches!(
            event.payload,
            EventPayload::JointCommand { ref group, .. } if group == "left"
        ));
        Ok(())
    }

    #[test]
    fn bus_sink_without_transport_is_channel_error() {
        let mut sink = BusSink::new(EventBus::default());
        let result = sink.publish("left", &[], &[]);
        assert!(matches!(result, Err(PoseError::Channel(_))));
    }

    #[tokio::test]
    async fn feedback_pump_feeds_controller() {
        let bus = EventBus::default();
        let controller = SharedController::new(CommandController::new(
            PrefixPartition::dual_arm(),
            BusSink::new(bus.clone()),
        ));
        let pump = spawn_feedback_pump(&bus, controller.clone());
        let _commands = bus.subscribe_to(Topic::JointCommands);

        handle_incoming(
            &topics(),
            &bus,
            r#"{"op":"publish","topic":"/robot/limb/left/joint_states","msg":{"name":["s0"],"position":[0.3]}}"#,
        );

        let mut merged = false;
        for _ in 0..50 {
            if controller.snapshot().get("left_s0") == Some(0.3) {
                merged = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(merged, "feedback never reached the controller");

        let mut commander = controller.clone();
        let snapshot = commander.command(CommandRequest::delta("left_s0", 0.1)).unwrap();
        assert!((snapshot.get("left_s0").unwrap() - 0.4).abs() < 1e-9);
        pump.abort();
    }

    #[test]
    fn joy_stream_yields_snapshots_and_honors_shutdown() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let bus = EventBus::default();
        let flag = Arc::new(AtomicBool::new(false));
        let mut stream = JoyStream::new(&bus, runtime.handle().clone()).with_shutdown(flag.clone());

        let snapshot = JoySnapshot {
            buttons: vec![true],
            axes: vec![0.0],
        };
        bus.publish_to(Topic::Joystick, Event::now("test", EventPayload::Joy(snapshot.clone())))
            .unwrap();
        assert_eq!(stream.next(), Some(snapshot));

        flag.store(true, Ordering::SeqCst);
        assert_eq!(stream.next(), None);
    }

    #[test]
    fn joy_stream_stops_while_waiting_when_shutdown_is_raised() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let bus = EventBus::default();
        let flag = Arc::new(AtomicBool::new(false));
        let mut stream = JoyStream::new(&bus, runtime.handle().clone()).with_shutdown(flag.clone());

        let raiser = {
            let flag = flag.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(250));
                flag.store(true, Ordering::SeqCst);
            })
        };

        // No snapshot is ever published: the stream has to time out at
        // least once before it sees the flag.
        assert_eq!(stream.next(), None);
        raiser.join().unwrap();
    }
}

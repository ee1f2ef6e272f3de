//! [`Player`] – replays a recorded CSV log as absolute joint commands.
//!
//! The log is read in full when the player is opened, so an unreadable file
//! fails before anything moves.  Rows are parsed one at a time during
//! playback; the first malformed row aborts the rest of the session without
//! applying any part of itself.

use std::path::Path;
use std::time::Duration;

use jointpose_types::{CommandRequest, JointState, PoseError};
use tracing::{debug, info};

use crate::controller::JointCommander;
use crate::session::Session;

/// Suspends playback between rows.
pub trait Pacer {
    fn pause(&mut self, period: Duration);
}

/// [`Pacer`] backed by [`std::thread::sleep`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadPacer;

impl Pacer for ThreadPacer {
    fn pause(&mut self, period: Duration) {
        std::thread::sleep(period);
    }
}

/// A loaded recording ready to be replayed.
#[derive(Debug, Clone)]
pub struct Player {
    source: String,
    names: Vec<String>,
    /// `(1-based line number, raw text)` of every non-blank data row.
    rows: Vec<(usize, String)>,
}

impl Player {
    /// Read the recording at `path`.
    ///
    /// # Errors
    ///
    /// [`PoseError::Io`] when the file cannot be read and
    /// [`PoseError::Parse`] when it has no header.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PoseError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| PoseError::io(path.display(), e))?;
        Self::parse(path.display().to_string(), &text)
    }

    /// Build a player from recording text.  `source` is only used in logs.
    pub fn parse(source: impl Into<String>, text: &str) -> Result<Self, PoseError> {
        let mut lines = text.lines().enumerate();
        let header = match lines.next() {
            Some((_, line)) if !line.trim().is_empty() => line.trim_end(),
            _ => {
                return Err(PoseError::Parse {
                    line: 1,
                    details: "missing header row".to_string(),
                });
            }
        };
        let names: Vec<String> = header.split(',').map(|n| n.trim().to_string()).collect();
        if let Some(pos) = names.iter().position(String::is_empty) {
            return Err(PoseError::Parse {
                line: 1,
                details: format!("empty actuator name in column {}", pos + 1),
            });
        }

        let rows = lines
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| (i + 1, line.trim_end().to_string()))
            .collect();

        Ok(Self {
            source: source.into(),
            names,
            rows,
        })
    }

    /// Actuator names from the header, in column order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of data rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Replay every row through `commander`, pausing `1 / rate` seconds
    /// between consecutive rows.  Returns the number of rows applied.
    ///
    /// Playback ends early, without error, once `session` should stop.
    ///
    /// # Errors
    ///
    /// * [`PoseError::InvalidArgument`] for a non-positive or non-finite rate,
    ///   or one so small that `1 / rate` seconds does not fit a [`Duration`].
    /// * [`PoseError::Parse`] for a malformed row; earlier rows stay applied.
    /// * Any error returned by `commander`.
    pub fn play(
        &self,
        commander: &mut dyn JointCommander,
        rate: f64,
        session: &Session,
        pacer: &mut dyn Pacer,
    ) -> Result<usize, PoseError> {
        if !(rate.is_finite() && rate > 0.0) {
            return Err(PoseError::InvalidArgument(format!(
                "playback rate must be positive, got {rate}"
            )));
        }
        let period = Duration::try_from_secs_f64(1.0 / rate).map_err(|e| {
            PoseError::InvalidArgument(format!("playback rate {rate} gives an unusable period: {e}"))
        })?;
        info!(source = %self.source, rows = self.rows.len(), rate, "playing back recording");

        let mut played = 0;
        for (i, (line_no, line)) in self.rows.iter().enumerate() {
            if session.should_stop() {
                info!(played, "playback interrupted");
                break;
            }
            let targets = self.parse_row(*line_no, line)?;
            debug!(line = *line_no, "{line}");
            commander.command(CommandRequest::absolute(targets))?;
            played += 1;

            if i + 1 < self.rows.len() {
                pacer.pause(period);
            }
        }
        Ok(played)
    }

    fn parse_row(&self, line_no: usize, line: &str) -> Result<JointState, PoseError> {
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != self.names.len() {
            return Err(PoseError::Parse {
                line: line_no,
                details: format!(
                    "expected {} fields, found {}",
                    self.names.len(),
                    fields.len()
                ),
            });
        }
        let mut targets = JointState::new();
        for (name, field) in self.names.iter().zip(fields) {
            let value: f64 = field.trim().parse().map_err(|e| PoseError::Parse {
                line: line_no,
                details: format!("{name}: {field:?}: {e}"),
            })?;
            targets.set(name.as_str(), value);
        }
        Ok(targets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::CommandController;
    use crate::recorder::Recorder;
    use jointpose_hal::PrefixPartition;
    use jointpose_hal::sim::SimSink;

    /// Records every pause instead of sleeping.
    #[derive(Default)]
    struct RecordingPacer {
        pauses: Vec<Duration>,
    }

    impl Pacer for RecordingPacer {
        fn pause(&mut self, period: Duration) {
            self.pauses.push(period);
        }
    }

    /// Commander that remembers every request it was given.
    #[derive(Default)]
    struct LoggingCommander {
        requests: Vec<CommandRequest>,
    }

    impl JointCommander for LoggingCommander {
        fn command(&mut self, request: CommandRequest) -> Result<JointState, PoseError> {
            self.requests.push(request.clone());
            Ok(request.targets)
        }
        fn record(&mut self) -> Result<(), PoseError> {
            Ok(())
        }
        fn snapshot(&self) -> JointState {
            JointState::new()
        }
    }

    /// Wraps a real controller and keeps the snapshot after every command.
    struct SnapshotTap {
        inner: CommandController,
        seen: Vec<JointState>,
    }

    impl JointCommander for SnapshotTap {
        fn command(&mut self, request: CommandRequest) -> Result<JointState, PoseError> {
            let snapshot = self.inner.command(request)?;
            self.seen.push(snapshot.clone());
            Ok(snapshot)
        }
        fn record(&mut self) -> Result<(), PoseError> {
            self.inner.record()
        }
        fn snapshot(&self) -> JointState {
            JointState::new()
        }
    }

    fn state(pairs: &[(&str, f64)]) -> JointState {
        pairs.iter().map(|&(n, p)| (n, p)).collect()
    }

    #[test]
    fn plays_rows_with_fixed_cadence() {
        let player = Player::parse("test", "left_s0,right_s0\n0.1,0.2\n0.3,0.4\n").unwrap();
        let mut commander = LoggingCommander::default();
        let mut pacer = RecordingPacer::default();

        let played = player
            .play(&mut commander, 10.0, &Session::new(), &mut pacer)
            .unwrap();

        assert_eq!(played, 2);
        assert_eq!(
            commander.requests,
            vec![
                CommandRequest::absolute(state(&[("left_s0", 0.1), ("right_s0", 0.2)])),
                CommandRequest::absolute(state(&[("left_s0", 0.3), ("right_s0", 0.4)])),
            ]
        );
        assert_eq!(pacer.pauses, vec![Duration::from_millis(100)]);
    }

    #[test]
    fn malformed_field_aborts_remaining_rows() {
        let player =
            Player::parse("test", "left_s0,right_s0\n0.1,0.2\n0.3,abc\n0.5,0.6\n").unwrap();
        let mut commander = LoggingCommander::default();

        let err = player
            .play(&mut commander, 30.0, &Session::new(), &mut RecordingPacer::default())
            .unwrap_err();

        assert!(matches!(err, PoseError::Parse { line: 3, .. }));
        assert_eq!(commander.requests.len(), 1);
    }

    #[test]
    fn short_row_is_a_parse_error() {
        let player = Player::parse("test", "a,b\n1.0\n").unwrap();
        let err = player
            .play(
                &mut LoggingCommander::default(),
                30.0,
                &Session::new(),
                &mut RecordingPacer::default(),
            )
            .unwrap_err();
        assert!(matches!(err, PoseError::Parse { line: 2, .. }));
    }

    #[test]
    fn rejects_non_positive_rate() {
        let player = Player::parse("test", "a\n1.0\n").unwrap();
        let err = player
            .play(
                &mut LoggingCommander::default(),
                0.0,
                &Session::new(),
                &mut RecordingPacer::default(),
            )
            .unwrap_err();
        assert!(matches!(err, PoseError::InvalidArgument(_)));
    }

    #[test]
    fn rejects_rate_too_small_for_a_period() {
        let player = Player::parse("test", "a\n1.0\n").unwrap();
        let mut commander = LoggingCommander::default();
        let mut pacer = RecordingPacer::default();
        let err = player
            .play(&mut commander, 1e-30, &Session::new(), &mut pacer)
            .unwrap_err();
        assert!(matches!(err, PoseError::InvalidArgument(_)));
        assert!(pacer.pauses.is_empty());
        assert!(commander.requests.is_empty());
    }

    #[test]
    fn empty_file_has_no_header() {
        assert!(matches!(
            Player::parse("test", ""),
            Err(PoseError::Parse { line: 1, .. })
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let err = Player::open(dir.path().join("nope.csv")).unwrap_err();
        assert!(matches!(err, PoseError::Io { .. }));
    }

    #[test]
    fn stopped_session_plays_nothing() {
        let player = Player::parse("test", "a\n1.0\n2.0\n").unwrap();
        let mut session = Session::new();
        session.finish();
        let mut commander = LoggingCommander::default();

        let played = player
            .play(&mut commander, 30.0, &session, &mut RecordingPacer::default())
            .unwrap();
        assert_eq!(played, 0);
        assert!(commander.requests.is_empty());
    }

    #[test]
    fn record_then_play_reproduces_states() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("roundtrip.csv");

        let mut recorded = Vec::new();
        let mut source = CommandController::new(PrefixPartition::dual_arm(), SimSink::new())
            .with_recorder(Recorder::new(&path));
        source.report_joint_positions("left", &["s0".to_string(), "e1".to_string()], &[0.0, -0.5]);
        source.report_joint_positions("right", &["s0".to_string()], &[0.25]);
        for delta in [0.1, 0.2, -0.05] {
            source.command(CommandRequest::delta("left_s0", delta)).unwrap();
            source.record().unwrap();
            recorded.push(source.snapshot());
        }

        let sink = SimSink::new();
        let mut tap = SnapshotTap {
            inner: CommandController::new(PrefixPartition::dual_arm(), sink.clone()),
            seen: Vec::new(),
        };
        let player = Player::open(&path).unwrap();
        player
            .play(&mut tap, 30.0, &Session::new(), &mut RecordingPacer::default())
            .unwrap();
        let replayed = tap.seen;

        assert_eq!(replayed, recorded);
        assert_eq!(sink.published().len(), 2 * recorded.len());
    }
}

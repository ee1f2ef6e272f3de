//! [`Recorder`] – append-only CSV log of joint snapshots.
//!
//! # File format
//!
//! ```text
//! left_s0,left_s1,right_s0
//! 0.1,0.0,0.25
//! 0.2,0.0,0.25
//! ```
//!
//! The first line lists actuator names in the order of the first recorded
//! snapshot.  That order is frozen for the life of the recorder; every later
//! row is written in it.  Names that appear after the header was written
//! cannot be represented and are dropped from the rows.

use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use jointpose_types::{JointState, PoseError};
use tracing::{debug, warn};

/// Writes snapshots to a CSV file with a header frozen at the first append.
#[derive(Debug)]
pub struct Recorder {
    path: PathBuf,
    file: Option<File>,
    header: Vec<String>,
    rows: usize,
    dropped: HashSet<String>,
    failed: bool,
}

impl Recorder {
    /// Create a recorder for `path`.  Nothing is touched on disk until the
    /// first [`append`][Self::append].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
            header: Vec::new(),
            rows: 0,
            dropped: HashSet::new(),
            failed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of value rows written so far (the header is not counted).
    pub fn rows_written(&self) -> usize {
        self.rows
    }

    /// Frozen column order; empty until the first successful append.
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Append `snapshot` as one row.
    ///
    /// The first call truncates the destination and writes the header.
    ///
    /// # Errors
    ///
    /// * [`PoseError::InvalidArgument`] when the first snapshot is empty.
    /// * [`PoseError::UnknownActuator`] when a header column is missing from
    ///   `snapshot`; nothing is written.
    /// * [`PoseError::Io`] on any write failure.  After a write failure the
    ///   recorder refuses further appends.
    pub fn append(&mut self, snapshot: &JointState) -> Result<(), PoseError> {
        if self.failed {
            return Err(PoseError::Io {
                path: self.path.display().to_string(),
                details: "recording stopped after an earlier write failure".to_string(),
            });
        }

        let mut text = String::new();
        if self.file.is_none() {
            if snapshot.is_empty() {
                return Err(PoseError::InvalidArgument(
                    "nothing to record: no joint positions are known yet".to_string(),
                ));
            }
            let header: Vec<String> = snapshot.names().map(str::to_string).collect();
            text.push_str(&header.join(","));
            text.push('\n');
            text.push_str(&self.format_row(&header, snapshot)?);

            let file = File::create(&self.path).map_err(|e| self.fail(e))?;
            self.file = Some(file);
            self.header = header;
        } else {
            text.push_str(&self.format_row(&self.header, snapshot)?);
            for name in snapshot.names() {
                if !self.header.iter().any(|h| h == name) && self.dropped.insert(name.to_string()) {
                    warn!(
                        joint = name,
                        path = %self.path.display(),
                        "joint appeared after the recording header was written; its values are dropped"
                    );
                }
            }
        }

        let written = match self.file.as_mut() {
            Some(file) => file.write_all(text.as_bytes()).and_then(|()| file.flush()),
            None => Ok(()),
        };
        written.map_err(|e| self.fail(e))?;

        self.rows += 1;
        debug!(path = %self.path.display(), rows = self.rows, "snapshot recorded");
        Ok(())
    }

    fn format_row(&self, header: &[String], snapshot: &JointState) -> Result<String, PoseError> {
        let mut fields = Vec::with_capacity(header.len());
        for name in header {
            let value = snapshot
                .get(name)
                .ok_or_else(|| PoseError::UnknownActuator(name.clone()))?;
            fields.push(format!("{value:?}"));
        }
        let mut row = fields.join(",");
        row.push('\n');
        Ok(row)
    }

    fn fail(&mut self, err: std::io::Error) -> PoseError {
        self.failed = true;
        PoseError::io(self.path.display(), err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(pairs: &[(&str, f64)]) -> JointState {
        pairs.iter().map(|&(n, p)| (n, p)).collect()
    }

    #[test]
    fn header_written_once_and_rows_align() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("poses.csv");
        let mut recorder = Recorder::new(&path);

        recorder.append(&state(&[("left_s0", 0.1), ("right_s0", 0.2)])).unwrap();
        for i in 0..4 {
            recorder
                .append(&state(&[("left_s0", i as f64), ("right_s0", 1.5)]))
                .unwrap();
        }

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 1 + 5);
        assert_eq!(lines[0], "left_s0,right_s0");
        assert_eq!(lines[1], "0.1,0.2");
        assert!(lines.iter().all(|l| l.split(',').count() == 2));
        assert!(text.ends_with('\n'));
        assert_eq!(recorder.rows_written(), 5);
    }

    #[test]
    fn later_names_are_dropped_not_fatal() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("poses.csv");
        let mut recorder = Recorder::new(&path);

        recorder.append(&state(&[("left_s0", 0.1)])).unwrap();
        recorder
            .append(&state(&[("left_s0", 0.2), ("right_s0", 0.9)]))
            .unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "left_s0\n0.1\n0.2\n");
        assert_eq!(recorder.header(), ["left_s0".to_string()]);
    }

    #[test]
    fn missing_header_column_writes_nothing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("poses.csv");
        let mut recorder = Recorder::new(&path);

        recorder.append(&state(&[("left_s0", 0.1), ("right_s0", 0.2)])).unwrap();
        let err = recorder.append(&state(&[("left_s0", 0.3)])).unwrap_err();
        assert_eq!(err, PoseError::UnknownActuator("right_s0".to_string()));

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn empty_first_snapshot_is_rejected_without_creating_file() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("poses.csv");
        let mut recorder = Recorder::new(&path);

        let err = recorder.append(&JointState::new()).unwrap_err();
        assert!(matches!(err, PoseError::InvalidArgument(_)));
        assert!(!path.exists());
    }

    #[test]
    fn unwritable_destination_is_io_error_and_sticky() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("missing_dir").join("poses.csv");
        let mut recorder = Recorder::new(&path);

        let snapshot = state(&[("left_s0", 0.1)]);
        assert!(matches!(recorder.append(&snapshot), Err(PoseError::Io { .. })));
        assert!(matches!(recorder.append(&snapshot), Err(PoseError::Io { .. })));
        assert_eq!(recorder.rows_written(), 0);
    }

    #[test]
    fn first_append_truncates_existing_file() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("poses.csv");
        std::fs::write(&path, "stale,content\n1,2\n3,4\n").unwrap();

        let mut recorder = Recorder::new(&path);
        recorder.append(&state(&[("left_s0", 1.0)])).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "left_s0\n1.0\n");
    }
}

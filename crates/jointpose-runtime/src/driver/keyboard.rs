//! [`KeyboardDriver`] – single-keystroke teleoperation.

use std::io::Write;

use jointpose_types::PoseError;
use tracing::warn;

use super::InputDriver;
use crate::bindings::{ModalBindingTable, interpret};
use crate::controller::JointCommander;
use crate::session::Session;

/// Source of raw, unbuffered key presses.
pub trait KeySource {
    /// Block until the next key.  `Ok(None)` means the input is closed.
    fn next_key(&mut self) -> Result<Option<char>, PoseError>;
}

/// Reads keys from `keys`, resolves them through the binding table and
/// writes operator feedback to `out`.
pub struct KeyboardDriver<K, W> {
    table: ModalBindingTable,
    keys: K,
    out: W,
}

impl<K: KeySource, W: Write> KeyboardDriver<K, W> {
    pub fn new(table: ModalBindingTable, keys: K, out: W) -> Self {
        Self { table, keys, out }
    }

    /// Consume the driver and return its output sink.
    pub fn into_output(self) -> W {
        self.out
    }

    fn say(&mut self, line: &str) -> Result<(), PoseError> {
        writeln!(self.out, "{line}").map_err(|e| PoseError::io("terminal", e))
    }

    fn handle_key(
        &mut self,
        key: char,
        commander: &mut dyn JointCommander,
        session: &mut Session,
    ) -> Result<(), PoseError> {
        let resolved = self.table.resolve(key, session.mode()).cloned();
        let action = match resolved {
            Ok(action) => action,
            Err(PoseError::UnboundSymbol(symbol)) => {
                self.say(&format!("unknown key: {symbol}"))?;
                return self.say("press '?' for help");
            }
            Err(e) => return Err(e),
        };

        self.say(&action.to_string())?;
        if let Err(e) = interpret(&action, &self.table, session, commander, &mut self.out) {
            warn!(key = %key.escape_default(), error = %e, "key action failed");
            self.say(&format!("error: {e}"))?;
        }
        Ok(())
    }
}

impl<K: KeySource, W: Write> InputDriver for KeyboardDriver<K, W> {
    fn run(&mut self, commander: &mut dyn JointCommander, session: &mut Session) -> Result<(), PoseError> {
        for line in self.table.help_lines(session.mode()) {
            self.say(&line)?;
        }
        while !session.should_stop() {
            let key = match self.keys.next_key() {
                Ok(Some(key)) => key,
                Ok(None) => break,
                // A garbled byte is just another key nobody bound.
                Err(PoseError::MalformedInput(detail)) => {
                    warn!(%detail, "unreadable key");
                    self.say("unknown key")?;
                    self.say("press '?' for help")?;
                    continue;
                }
                Err(e) => return Err(e),
            };
            self.handle_key(key, commander, session)?;
        }
        Ok(())
    }
}

//! Raw single-key reads from the controlling terminal.

use std::io::{self, Read};

use jointpose_runtime::KeySource;
use jointpose_types::PoseError;
use termion::raw::IntoRawMode;

/// Ctrl-C as delivered in raw mode, where it no longer raises SIGINT.
const INTERRUPT: char = '\x03';

/// Reads one key at a time with the terminal in raw mode only for the
/// duration of the read, so regular output keeps its line discipline.
#[derive(Debug, Default)]
pub struct TerminalKeys;

impl TerminalKeys {
    pub fn new() -> Self {
        Self
    }
}

impl KeySource for TerminalKeys {
    fn next_key(&mut self) -> Result<Option<char>, PoseError> {
        // Piped input has no line discipline to switch off.
        let _raw = if termion::is_tty(&io::stdin()) {
            Some(
                io::stdout()
                    .into_raw_mode()
                    .map_err(|e| PoseError::io("terminal", e))?,
            )
        } else {
            None
        };
        let key = read_char(&mut io::stdin().lock())?;
        Ok(key.filter(|&c| c != INTERRUPT))
    }
}

/// Read one UTF-8 encoded character.  `None` at end of input.
fn read_char(input: &mut impl Read) -> Result<Option<char>, PoseError> {
    let mut buf = [0u8; 4];
    if input
        .read(&mut buf[..1])
        .map_err(|e| PoseError::io("stdin", e))?
        == 0
    {
        return Ok(None);
    }
    let width = match buf[0] {
        0x00..=0x7F => 1,
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        // Not a lead byte: report it alone and leave the following keys unread.
        b => return Err(PoseError::MalformedInput(format!("stray byte 0x{b:02X} is not a key"))),
    };
    input
        .read_exact(&mut buf[1..width])
        .map_err(|e| PoseError::io("stdin", e))?;
    std::str::from_utf8(&buf[..width])
        .map_err(|e| PoseError::MalformedInput(format!("key is not UTF-8: {e}")))
        .map(|s| s.chars().next())
}

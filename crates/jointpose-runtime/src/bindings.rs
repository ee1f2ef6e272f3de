//! [`ModalBindingTable`] – mode-indexed key bindings.
//!
//! Every symbol is bound to an ordered list of [`Action`]s.  The action that
//! fires is chosen by the session's mode counter:
//!
//! ```text
//! index = mode.rem_euclid(actions.len())
//! ```
//!
//! so a symbol with two actions alternates between them as the mode is
//! stepped up or down, including through negative modes.
//!
//! # Example
//!
//! ```rust
//! use jointpose_runtime::bindings::ModalBindingTable;
//! use jointpose_types::Action;
//!
//! let table = ModalBindingTable::baxter_keyboard();
//! let left = table.resolve('a', 0).unwrap();
//! let right = table.resolve('a', -3).unwrap();
//! assert_eq!(left.to_string(), "modify left_s0 by 0.1");
//! assert_eq!(right.to_string(), "modify right_s0 by 0.1");
//! ```

use std::collections::BTreeMap;
use std::io::Write;

use jointpose_types::{Action, CommandRequest, PoseError};
use serde::Deserialize;

use crate::controller::JointCommander;
use crate::session::Session;

/// Joint increment used by the built-in keyboard map.
pub const KEYBOARD_STEP: f64 = 0.1;

/// Symbol → per-mode actions.  The table holds no session state.
#[derive(Debug, Clone, Default)]
pub struct ModalBindingTable {
    bindings: BTreeMap<char, Vec<Action>>,
}

#[derive(Deserialize)]
struct KeyMapFile {
    keys: BTreeMap<String, Vec<Action>>,
}

impl ModalBindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `symbol` to `actions`, replacing any earlier binding.
    ///
    /// # Errors
    ///
    /// [`PoseError::InvalidArgument`] when `actions` is empty.
    pub fn bind(&mut self, symbol: char, actions: Vec<Action>) -> Result<(), PoseError> {
        if actions.is_empty() {
            return Err(PoseError::InvalidArgument(format!(
                "binding for {} has no actions",
                symbol.escape_default()
            )));
        }
        self.bindings.insert(symbol, actions);
        Ok(())
    }

    /// Number of actions bound to `symbol`.
    pub fn arity(&self, symbol: char) -> Option<usize> {
        self.bindings.get(&symbol).map(Vec::len)
    }

    /// Action `symbol` triggers in `mode`.
    ///
    /// # Errors
    ///
    /// [`PoseError::UnboundSymbol`] when `symbol` has no binding.
    pub fn resolve(&self, symbol: char, mode: i64) -> Result<&Action, PoseError> {
        let actions = self
            .bindings
            .get(&symbol)
            .ok_or_else(|| PoseError::UnboundSymbol(symbol.escape_default().to_string()))?;
        Ok(&actions[select(mode, actions.len())])
    }

    /// Resolve `symbol` and run the resulting action.
    pub fn execute(
        &self,
        symbol: char,
        session: &mut Session,
        commander: &mut dyn JointCommander,
        out: &mut dyn Write,
    ) -> Result<(), PoseError> {
        let action = self.resolve(symbol, session.mode())?;
        interpret(action, self, session, commander, out)
    }

    /// Help listing for `mode`: a banner followed by one line per symbol.
    pub fn help_lines(&self, mode: i64) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.bindings.len() + 1);
        lines.push(format!(
            "============ bindings for current mode {mode} =================="
        ));
        for (symbol, actions) in &self.bindings {
            let action = &actions[select(mode, actions.len())];
            lines.push(format!("    {}: {action}", display_symbol(*symbol)));
        }
        lines
    }

    /// Parse a key map from TOML.
    ///
    /// ```toml
    /// [keys]
    /// "a" = [
    ///     { action = "adjust_joint", name = "left_s0", delta = 0.1 },
    ///     { action = "adjust_joint", name = "right_s0", delta = 0.1 },
    /// ]
    /// "g" = [{ action = "change_mode", step = 1 }]
    /// ```
    ///
    /// # Errors
    ///
    /// [`PoseError::Config`] for invalid TOML, a key that is not exactly one
    /// character, or a key with no actions.
    pub fn from_toml_str(text: &str) -> Result<Self, PoseError> {
        let file: KeyMapFile =
            toml::from_str(text).map_err(|e| PoseError::Config(format!("invalid key map: {e}")))?;
        let mut table = Self::new();
        for (key, actions) in file.keys {
            let mut chars = key.chars();
            let symbol = match (chars.next(), chars.next()) {
                (Some(c), None) => c,
                _ => {
                    return Err(PoseError::Config(format!(
                        "key map entry {key:?} must be a single character"
                    )));
                }
            };
            table
                .bind(symbol, actions)
                .map_err(|e| PoseError::Config(e.to_string()))?;
        }
        Ok(table)
    }

    /// The dual-arm Baxter keyboard layout.
    ///
    /// | mode | adjust keys drive |
    /// |---|---|
    /// | 0 | left arm |
    /// | 1 | right arm |
    /// | 2 | upper joints of both arms |
    /// | 3 | lower joints of both arms |
    ///
    /// `g`/`;` step the mode, `?` prints help, space records and Esc stops.
    pub fn baxter_keyboard() -> Self {
        // (increase key, decrease key, joint per mode)
        const PAIRS: [(char, char, [&str; 4]); 6] = [
            ('a', 'f', ["left_s0", "right_s0", "right_s0", "right_e1"]),
            ('s', 'd', ["left_s1", "right_s1", "right_s1", "right_w0"]),
            ('w', 'e', ["left_w0", "right_w0", "right_e0", "right_w1"]),
            ('h', 'l', ["left_e0", "right_e0", "left_s0", "left_e1"]),
            ('j', 'k', ["left_e1", "right_e1", "left_s1", "left_w0"]),
            ('u', 'i', ["left_w1", "right_w1", "left_e0", "left_w1"]),
        ];

        let mut bindings = BTreeMap::new();
        for (up, down, joints) in PAIRS {
            bindings.insert(up, joints.iter().map(|j| adjust(j, KEYBOARD_STEP)).collect());
            bindings.insert(down, joints.iter().map(|j| adjust(j, -KEYBOARD_STEP)).collect());
        }
        // The wrist roll keys do not follow the up/down pattern in modes 2-3.
        bindings.insert(
            'r',
            vec![
                adjust("left_w2", KEYBOARD_STEP),
                adjust("right_w2", KEYBOARD_STEP),
                adjust("right_w2", KEYBOARD_STEP),
                adjust("right_w2", -KEYBOARD_STEP),
            ],
        );
        bindings.insert(
            'y',
            vec![
                adjust("left_w2", -KEYBOARD_STEP),
                adjust("right_w2", -KEYBOARD_STEP),
                adjust("left_w2", KEYBOARD_STEP),
                adjust("left_w2", -KEYBOARD_STEP),
            ],
        );

        bindings.insert('g', vec![Action::ChangeMode { step: 1 }]);
        bindings.insert(';', vec![Action::ChangeMode { step: -1 }]);
        bindings.insert('?', vec![Action::ShowHelp]);
        bindings.insert(' ', vec![Action::Record]);
        bindings.insert('\x1b', vec![Action::Stop]);

        Self { bindings }
    }
}

/// Run one action against the session and the commander.
///
/// `table` is only consulted by [`Action::ShowHelp`]; `out` receives the help
/// listing.
pub fn interpret(
    action: &Action,
    table: &ModalBindingTable,
    session: &mut Session,
    commander: &mut dyn JointCommander,
    out: &mut dyn Write,
) -> Result<(), PoseError> {
    match action {
        Action::AdjustJoint { name, delta } => {
            commander.command(CommandRequest::delta(name.as_str(), *delta))?;
        }
        Action::ChangeMode { step } => session.step_mode(*step),
        Action::ShowHelp => {
            for line in table.help_lines(session.mode()) {
                writeln!(out, "{line}").map_err(|e| PoseError::io("terminal", e))?;
            }
        }
        Action::Record => commander.record()?,
        Action::Stop => session.finish(),
    }
    Ok(())
}

fn select(mode: i64, arity: usize) -> usize {
    // Arity is bounded by memory, so it always fits in an i64.
    mode.rem_euclid(arity as i64) as usize
}

fn adjust(name: &str, delta: f64) -> Action {
    Action::AdjustJoint {
        name: name.to_string(),
        delta,
    }
}

fn display_symbol(symbol: char) -> String {
    match symbol {
        ' ' => "space".to_string(),
        '\x1b' => "esc".to_string(),
        c => c.to_string(),
    }
}

//! [`FileDriver`] – replays a recording as the session's input.

use jointpose_types::PoseError;
use tracing::info;

use super::InputDriver;
use crate::controller::JointCommander;
use crate::player::{Pacer, Player, ThreadPacer};
use crate::session::Session;

pub struct FileDriver {
    player: Player,
    rate: f64,
    pacer: Box<dyn Pacer + Send>,
}

impl FileDriver {
    /// Replay `player` at `rate` rows per second in real time.
    pub fn new(player: Player, rate: f64) -> Self {
        Self::with_pacer(player, rate, ThreadPacer)
    }

    pub fn with_pacer(player: Player, rate: f64, pacer: impl Pacer + Send + 'static) -> Self {
        Self {
            player,
            rate,
            pacer: Box::new(pacer),
        }
    }
}

impl InputDriver for FileDriver {
    /// Play the whole recording, then end the session.  A parse or command
    /// error ends the session too and is returned.
    fn run(&mut self, commander: &mut dyn JointCommander, session: &mut Session) -> Result<(), PoseError> {
        let result = self
            .player
            .play(commander, self.rate, session, self.pacer.as_mut());
        session.finish();
        let played = result?;
        info!(played, total = self.player.len(), "playback finished");
        Ok(())
    }
}

//! User-facing error taxonomy.
//!
//! Every rejection a player can see lives here. Display strings are the
//! exact reply text; a couple of variants are deliberately silent and get a
//! rejection marker only.

use crate::engine::EngineError;
use crate::rules::MoveListing;
use derive_more::{Display, Error};

/// Everything that can go wrong while handling a game command.
#[derive(Debug, Display, Error)]
pub enum GameError {
    /// No session is registered for the channel.
    #[display("No game in progress in this channel")]
    NoActiveGame,
    /// The channel already hosts a live session.
    #[display("Game in progress between <@{white}> and <@{black}>")]
    GameAlreadyInProgress {
        /// Participant playing White.
        white: String,
        /// Participant playing Black.
        black: String,
    },
    /// A participant moved out of turn.
    #[display("It is not your turn")]
    NotYourTurn,
    /// The rules collaborator refused the move.
    #[display("Invalid move!\nValid moves:{legal}")]
    IllegalMove {
        /// Currently legal moves, grouped for the reply.
        legal: MoveListing,
    },
    /// The channel is not configured to host games.
    #[display("Games can only be started in a chess channel")]
    WrongVenue,
    /// The author lacks the role required for the command.
    #[display("You are not allowed to do that")]
    InsufficientPermission,
    /// The engine subprocess could not be started or has gone away.
    #[display("The automated opponent is unavailable right now")]
    EngineUnavailable,
    /// The engine did not answer within its time budget.
    #[display("The automated opponent took too long to move")]
    EngineTimeout,
    /// The board image could not be produced.
    #[display("Could not draw the board")]
    RenderFailure,
    /// A bug; details go to the log, never to the channel.
    #[display("Something went wrong, sorry")]
    Internal,
}

impl GameError {
    /// Rejections reported with a marker only, never with reply text.
    pub fn is_silent(&self) -> bool {
        matches!(
            self,
            GameError::NotYourTurn | GameError::InsufficientPermission
        )
    }
}

impl From<EngineError> for GameError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Unavailable { .. } => GameError::EngineUnavailable,
            EngineError::Timeout => GameError::EngineTimeout,
        }
    }
}

use thiserror::Error;

use crate::game::game_fsm::GameFsmState;
use crate::round::round_fsm::RoundFsmState;

/// How much of the caller's session survives the error.
///
/// `Error` rejects the operation but the caller is still a valid member of the
/// game and may retry after correcting the condition. `Fatal` means the game or
/// the caller's membership no longer exists and the caller must drop its
/// session association.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Error,
    Fatal,
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum GameError {
    #[error("Cannot find game. GameId: '{0}'.")]
    GameNotFound(String),
    #[error("A game with the same id already exists. GameId: '{0}'.")]
    GameAlreadyExists(String),
    #[error("Field cannot be empty.")]
    EmptyField,
    #[error("Team names have to be unique. TeamName: '{0}'.")]
    DuplicateTeamName(String),
    #[error("A game needs at least one team.")]
    NoTeams,
    #[error("The game does not contain the team. TeamName: '{0}'.")]
    TeamNotFound(String),
    #[error("A player with the same name already exists in the team. TeamName: '{0}', PlayerName: '{1}'.")]
    PlayerAlreadyInTeam(String, String),
    #[error("The team does not contain the player. TeamName: '{0}', PlayerName: '{1}'.")]
    PlayerNotInTeam(String, String),
    #[error("The player is not in any team. PlayerName: '{0}'.")]
    PlayerNotInGame(String),
    #[error("Must provide the configured amount of unique entries. ExpectedEntries: '{expected}', ActualEntries: '{actual}'.")]
    WrongEntryCount { expected: usize, actual: usize },
    #[error("The game is not in a valid state for this operation. ActualState: '{actual:?}', ExpectedStates: '{expected:?}'.")]
    InvalidGameState {
        actual: GameFsmState,
        expected: Vec<GameFsmState>,
    },
    #[error("The current round is not in a valid state for this operation. ActualState: '{actual:?}', ExpectedState: '{expected:?}'.")]
    InvalidRoundState {
        actual: RoundFsmState,
        expected: RoundFsmState,
    },
    #[error("The game has no current round. GameId: '{0}'.")]
    NoCurrentRound(String),
    #[error("The current round does not belong to the player. PlayerName: '{0}'.")]
    RoundNotOwnedByPlayer(String),
    #[error("The entry is not among the available entries. Entry: '{0}'.")]
    EntryNotAvailable(String),
    #[error("The entry has already been guessed. Entry: '{0}'.")]
    EntryAlreadyCorrect(String),
    #[error("The entry is not the current entry. Entry: '{0}'.")]
    EntryNotCurrent(String),
    #[error("Each team needs at least two players to start the game. TeamName: '{team}', ActualPlayers: '{actual}', MinimumPlayers: '{minimum}'.")]
    NotEnoughPlayers {
        team: String,
        actual: usize,
        minimum: usize,
    },
    #[error("Cannot remove a player from a team with one or less players. TeamName: '{0}'.")]
    CannotRemoveLastTeamPlayer(String),
    #[error("Cannot kick the last player of the only viable team.")]
    CannotKickLastPlayer,
    #[error("Internal Error. Error: '{0}'.")]
    Internal(String),
}

impl GameError {
    pub fn severity(&self) -> Severity {
        match self {
            GameError::GameNotFound(_)
            | GameError::PlayerNotInGame(_)
            | GameError::Internal(_) => Severity::Fatal,
            _ => Severity::Error,
        }
    }

    pub fn log_and_create_internal(message: &str) -> GameError {
        log::error!("{message}");
        GameError::Internal(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{GameError, Severity};

    #[test]
    fn not_found_and_membership_errors_are_fatal() {
        assert_eq!(
            GameError::GameNotFound("id".to_string()).severity(),
            Severity::Fatal
        );
        assert_eq!(
            GameError::PlayerNotInGame("player".to_string()).severity(),
            Severity::Fatal
        );
    }

    #[test]
    fn validation_and_conflict_errors_are_recoverable() {
        assert_eq!(GameError::EmptyField.severity(), Severity::Error);
        assert_eq!(
            GameError::EntryNotCurrent("x".to_string()).severity(),
            Severity::Error
        );
        assert_eq!(GameError::CannotKickLastPlayer.severity(), Severity::Error);
    }
}

use std::fmt;

use serde::Serialize;

/// Rule variant applied to every round until the entry pool is exhausted.
/// Phases only ever advance forward; after the last one the game ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum GamePhase {
    AllWords,
    OneWord,
    Mime,
}

impl GamePhase {
    pub const ALL: [GamePhase; 3] = [GamePhase::AllWords, GamePhase::OneWord, GamePhase::Mime];

    pub fn first() -> GamePhase {
        GamePhase::AllWords
    }

    pub fn next(self) -> Option<GamePhase> {
        match self {
            GamePhase::AllWords => Some(GamePhase::OneWord),
            GamePhase::OneWord => Some(GamePhase::Mime),
            GamePhase::Mime => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            GamePhase::AllWords => "free style",
            GamePhase::OneWord => "only one word",
            GamePhase::Mime => "mime",
        }
    }
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

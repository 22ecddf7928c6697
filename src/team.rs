use rand::seq::SliceRandom;
use rand::RngCore;

use crate::error::GameError;

/// Ordered roster of players within a game. The insertion order is the
/// player-rotation order; a newly added player goes to the end.
#[derive(Clone, Debug, PartialEq)]
pub struct Team {
    name: String,
    players: Vec<String>,
}

impl Team {
    pub fn new(name: &str) -> Self {
        Team {
            name: name.to_string(),
            players: Vec::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn players(&self) -> &[String] {
        &self.players
    }

    pub fn contains_player(&self, player_name: &str) -> bool {
        self.players
            .iter()
            .any(|player| player.as_str() == player_name)
    }

    pub fn add_player(&mut self, player_name: &str) -> Result<(), GameError> {
        if self.contains_player(player_name) {
            return Err(GameError::PlayerAlreadyInTeam(
                self.name.clone(),
                player_name.to_string(),
            ));
        }
        self.players.push(player_name.to_string());
        Ok(())
    }

    pub fn remove_player(&mut self, player_name: &str) {
        self.players
            .retain(|player| player.as_str() != player_name);
    }

    pub fn random_player(&self, rng: &mut dyn RngCore) -> Result<&str, GameError> {
        self.players
            .choose(rng)
            .map(String::as_str)
            .ok_or_else(|| {
                GameError::log_and_create_internal(&format!(
                    "Tried to pick a random player from an empty team. TeamName: '{}'.",
                    self.name
                ))
            })
    }

    /// Next player in roster order after `player_name`, wrapping around.
    pub fn next_player(&self, player_name: &str) -> Result<&str, GameError> {
        let index = self
            .players
            .iter()
            .position(|player| player.as_str() == player_name)
            .ok_or_else(|| {
                GameError::PlayerNotInTeam(self.name.clone(), player_name.to_string())
            })?;
        Ok(&self.players[(index + 1) % self.players.len()])
    }
}

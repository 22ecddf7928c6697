use std::collections::HashSet;
use std::time::Duration;

use rand::distributions::{Alphanumeric, DistString};
use rand::{thread_rng, RngCore};

use crate::config::GameSettings;
use crate::error::GameError;
use crate::game::game_fsm::GameFsmState;
use crate::game::{Game, TeamScore};
use crate::metrics::COMPLETED_ROUNDS;
use crate::round::round_fsm::RoundFsmState;
use crate::store::SessionStore;

const GAME_ID_LENGTH: usize = 5;

/// Orchestration layer over the session store: validates preconditions
/// against a snapshot, performs the mutation through the store's atomic
/// update and schedules the deferred round-timeout and session-TTL actions.
#[derive(Clone)]
pub struct GameService {
    store: SessionStore,
    settings: GameSettings,
}

impl GameService {
    pub fn new(store: SessionStore, settings: GameSettings) -> Self {
        GameService { store, settings }
    }

    pub fn create_game(
        &self,
        name: &str,
        team_names: &[String],
        round_time_ms: u64,
        entries_per_player: usize,
        description: &str,
        assign_teams: bool,
    ) -> Result<Game, GameError> {
        require_not_empty(&[name])?;
        let team_name_refs: Vec<&str> = team_names.iter().map(String::as_str).collect();
        require_not_empty(&team_name_refs)?;

        let mut rng = thread_rng();
        let game_id = loop {
            let id = GameService::create_unique_game_id(&mut rng);
            let game = Game::new(
                &id,
                name,
                description,
                team_names,
                round_time_ms,
                entries_per_player,
                assign_teams,
            )?;
            match self.store.create(game) {
                Ok(()) => break id,
                Err(GameError::GameAlreadyExists(_)) => continue,
                Err(error) => return Err(error),
            }
        };

        self.store
            .schedule_remove(&game_id, self.settings.session_ttl());
        log::info!("Game created. GameId: '{game_id}', Name: '{name}'.");
        self.store.get(&game_id)
    }

    /// Joins a game during setup, submitting this player's entries. Returns
    /// the name of the team the player ended up in: the caller-supplied one,
    /// or the least-populated team when the game auto-assigns.
    pub fn join_setup_game(
        &self,
        game_id: &str,
        team_name: Option<&str>,
        player_name: &str,
        entries: HashSet<String>,
    ) -> Result<String, GameError> {
        require_not_empty(&[game_id, player_name])?;
        let entry_refs: Vec<&str> = entries.iter().map(String::as_str).collect();
        require_not_empty(&entry_refs)?;
        self.require_state(game_id, &[GameFsmState::Setup])?;

        self.store.update(game_id, |game| {
            if entries.len() != game.entries_per_player() {
                return Err(GameError::WrongEntryCount {
                    expected: game.entries_per_player(),
                    actual: entries.len(),
                });
            }
            if game.assign_teams() {
                let mut rng = thread_rng();
                let assigned_team = game.team_with_least_players(&mut rng)?.name().to_string();
                game.add_player_entries(&assigned_team, player_name, entries)?;
                Ok(assigned_team)
            } else {
                let team_name = team_name.unwrap_or_default();
                require_not_empty(&[team_name])?;
                if !game.contains_team(team_name) {
                    return Err(GameError::TeamNotFound(team_name.to_string()));
                }
                game.add_player_entries(team_name, player_name, entries)?;
                Ok(team_name.to_string())
            }
        })
    }

    /// Late join: only allowed once the game is already in play. The player
    /// submits no entries.
    pub fn join_play_game(
        &self,
        game_id: &str,
        team_name: &str,
        player_name: &str,
    ) -> Result<(), GameError> {
        require_not_empty(&[game_id, team_name, player_name])?;
        self.require_state(game_id, &[GameFsmState::Play])?;

        self.store.update(game_id, |game| {
            if !game.contains_team(team_name) {
                return Err(GameError::TeamNotFound(team_name.to_string()));
            }
            game.add_player(team_name, player_name)
        })
    }

    pub fn start_game(&self, game_id: &str) -> Result<(), GameError> {
        self.require_state(game_id, &[GameFsmState::Setup])?;
        self.store.update(game_id, |game| {
            let mut rng = thread_rng();
            game.start(&mut rng)
        })?;
        log::info!("Game started. GameId: '{game_id}'.");
        Ok(())
    }

    /// Starts the current round; only its player may do so. Schedules the
    /// round-timeout callback, fenced by the id of the round it was scheduled
    /// for: if another round is current by the time it fires, it does nothing.
    pub fn start_round(&self, game_id: &str, player_name: &str) -> Result<(), GameError> {
        self.require_state(game_id, &[GameFsmState::Play])?;
        require_round(
            &self.store.get(game_id)?,
            RoundFsmState::AwaitStart,
            player_name,
        )?;

        let (round_id, round_time_ms) = self.store.update(game_id, |game| {
            let game_id = game.id().to_string();
            let round = game
                .current_round_mut()
                .ok_or(GameError::NoCurrentRound(game_id))?;
            round.start()?;
            Ok((round.id().to_string(), round.round_time_ms()))
        })?;

        self.store.schedule_update(
            game_id,
            Duration::from_millis(round_time_ms),
            move |game| GameService::finish_round_on_timeout(game, &round_id),
        );
        Ok(())
    }

    /// Accepts a guessed entry. When this empties the round's pool the round
    /// is resolved right away instead of waiting for the timer: the
    /// replacement round stays anchored on the same team and player and
    /// inherits the remaining time, so the handoff fairness survives a phase
    /// boundary.
    pub fn correct_entry(
        &self,
        game_id: &str,
        player_name: &str,
        entry: &str,
    ) -> Result<(), GameError> {
        require_not_empty(&[game_id, player_name, entry])?;
        self.require_state(game_id, &[GameFsmState::Play])?;
        require_round(
            &self.store.get(game_id)?,
            RoundFsmState::InProgress,
            player_name,
        )?;

        self.store.update(game_id, |game| {
            let mut rng = thread_rng();
            let game_id = game.id().to_string();
            let has_more_round_entries = game
                .current_round_mut()
                .ok_or(GameError::NoCurrentRound(game_id.clone()))?
                .add_correct_entry(&mut rng, entry)?;
            if has_more_round_entries {
                return Ok(());
            }

            let (team_name, round_player, remaining_time_ms) = {
                let round = game
                    .current_round()
                    .ok_or(GameError::NoCurrentRound(game_id))?;
                (
                    round.team_name().to_string(),
                    round.player_name().to_string(),
                    round.remaining_time_ms(),
                )
            };
            game.complete_current_round()?;
            COMPLETED_ROUNDS.inc();
            let inherited_time_ms = remaining_time_ms.max(0) as u64;
            if game.has_more_entries() {
                game.setup_new_round(&mut rng, &team_name, &round_player, inherited_time_ms);
            } else if game.setup_new_phase()? {
                game.setup_new_round(&mut rng, &team_name, &round_player, inherited_time_ms);
            }
            Ok(())
        })
    }

    pub fn reject_entry(
        &self,
        game_id: &str,
        player_name: &str,
        entry: &str,
    ) -> Result<(), GameError> {
        require_not_empty(&[game_id, player_name, entry])?;
        self.require_state(game_id, &[GameFsmState::Play])?;
        require_round(
            &self.store.get(game_id)?,
            RoundFsmState::InProgress,
            player_name,
        )?;

        self.store.update(game_id, |game| {
            let mut rng = thread_rng();
            let game_id = game.id().to_string();
            game.current_round_mut()
                .ok_or(GameError::NoCurrentRound(game_id))?
                .reject_entry(&mut rng, entry)
        })
    }

    /// A player leaves on their own. During setup an admin leaving closes the
    /// whole game; past setup, removal may trigger team rebalancing, and when
    /// the last viable players are gone the game is closed instead.
    pub fn leave_game(
        &self,
        game_id: &str,
        player_name: &str,
        is_admin: bool,
    ) -> Result<(), GameError> {
        let game = self.store.get(game_id)?;
        if game.state() == &GameFsmState::Setup {
            if is_admin {
                self.store.remove(game_id);
                return Ok(());
            }
            return self
                .store
                .update(game_id, |game| game.remove_player(player_name, true));
        }

        let team = game.player_team(player_name)?;
        if team.players().len() <= 1 && all_teams_depleted(&game) {
            self.store.remove(game_id);
            return Ok(());
        }

        self.store.update(game_id, |game| {
            let mut rng = thread_rng();
            let team_name = game.player_team(player_name)?.name().to_string();
            if game.team(&team_name)?.players().len() <= 1 {
                game.adjust_team(&team_name, &mut rng)?;
            }
            GameService::remove_player_and_replace_round(game, player_name, &mut rng)
        })
    }

    /// Admin-driven removal. Unlike leaving, kicking the last player of the
    /// only viable team is refused rather than closing the game.
    pub fn kick_player(&self, game_id: &str, player_name: &str) -> Result<(), GameError> {
        let game = self.store.get(game_id)?;
        let team = game.player_team(player_name)?;
        if game.state() != &GameFsmState::Setup
            && team.players().len() <= 1
            && all_teams_depleted(&game)
        {
            return Err(GameError::CannotKickLastPlayer);
        }

        self.store.update(game_id, |game| {
            let mut rng = thread_rng();
            let team_name = game.player_team(player_name)?.name().to_string();
            if game.state() != &GameFsmState::Setup
                && game.team(&team_name)?.players().len() <= 1
            {
                game.adjust_team(&team_name, &mut rng)?;
            }
            GameService::remove_player_and_replace_round(game, player_name, &mut rng)
        })
    }

    pub fn get_game(&self, game_id: &str) -> Result<Game, GameError> {
        self.store.get(game_id)
    }

    /// Games a new player may still join.
    pub fn get_available_games(&self) -> Vec<Game> {
        self.store
            .list_by_state(&[GameFsmState::Setup, GameFsmState::Play])
    }

    pub fn validate_can_join(&self, game_id: &str) -> Result<(), GameError> {
        self.require_state(game_id, &[GameFsmState::Setup, GameFsmState::Play])
    }

    pub fn get_team_scores(&self, game_id: &str) -> Result<Vec<TeamScore>, GameError> {
        Ok(self.store.get(game_id)?.team_scores())
    }

    /// Round-timeout callback body. Runs inside the store's atomic update;
    /// everything is re-checked against the live state because the round may
    /// have ended by other means since the timer was scheduled.
    fn finish_round_on_timeout(game: &mut Game, round_id: &str) {
        let is_current = match game.current_round() {
            Some(round) => {
                round.id() == round_id
                    && game.state() == &GameFsmState::Play
                    && round.state() == &RoundFsmState::InProgress
            }
            None => false,
        };
        if !is_current {
            log::debug!(
                "Round timeout fired for a stale round, ignoring it. GameId: '{}', RoundId: '{round_id}'.",
                game.id()
            );
            return;
        }

        let mut rng = thread_rng();
        let result = game.complete_current_round().and_then(|_| {
            COMPLETED_ROUNDS.inc();
            if game.has_more_entries() {
                game.setup_next_round(&mut rng)
            } else if game.setup_new_phase()? {
                game.setup_next_round(&mut rng)
            } else {
                Ok(())
            }
        });
        if let Err(error) = result {
            log::error!(
                "Failed to resolve a round timeout. GameId: '{}', RoundId: '{round_id}', Error: '{error}'.",
                game.id()
            );
        }
    }

    /// Removes the player and, when they held the live round, terminates it
    /// and immediately replaces it with a round for the same team, a random
    /// remaining teammate and the inherited remaining time.
    fn remove_player_and_replace_round(
        game: &mut Game,
        player_name: &str,
        rng: &mut dyn RngCore,
    ) -> Result<(), GameError> {
        game.remove_player(player_name, false)?;

        let held_round_team = match game.current_round() {
            Some(round)
                if round.player_name() == player_name
                    && round.state() != &RoundFsmState::End =>
            {
                Some(round.team_name().to_string())
            }
            _ => None,
        };
        if let Some(team_name) = held_round_team {
            let remaining_time_ms = game.terminate_current_round()?;
            let next_player = game.team(&team_name)?.random_player(rng)?.to_string();
            game.setup_new_round(
                rng,
                &team_name,
                &next_player,
                remaining_time_ms.max(0) as u64,
            );
        }
        Ok(())
    }

    fn require_state(&self, game_id: &str, expected: &[GameFsmState]) -> Result<(), GameError> {
        let game = self.store.get(game_id)?;
        if expected.contains(game.state()) {
            Ok(())
        } else {
            Err(GameError::InvalidGameState {
                actual: game.state().clone(),
                expected: expected.to_vec(),
            })
        }
    }

    fn create_unique_game_id(rng: &mut dyn RngCore) -> String {
        Alphanumeric
            .sample_string(rng, GAME_ID_LENGTH)
            .replace('O', "P")
            .replace('0', "1")
            .replace('I', "J")
            .replace('l', "m")
    }
}

fn require_round(
    game: &Game,
    expected: RoundFsmState,
    player_name: &str,
) -> Result<(), GameError> {
    let round = game
        .current_round()
        .ok_or_else(|| GameError::NoCurrentRound(game.id().to_string()))?;
    if round.player_name() != player_name {
        return Err(GameError::RoundNotOwnedByPlayer(player_name.to_string()));
    }
    if round.state() != &expected {
        return Err(GameError::InvalidRoundState {
            actual: round.state().clone(),
            expected,
        });
    }
    Ok(())
}

fn all_teams_depleted(game: &Game) -> bool {
    game.teams()
        .iter()
        .all(|team| team.players().len() <= 1)
}

fn require_not_empty(fields: &[&str]) -> Result<(), GameError> {
    if fields.iter().any(|field| field.is_empty()) {
        return Err(GameError::EmptyField);
    }
    Ok(())
}

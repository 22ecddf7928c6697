pub mod game_fsm;
pub mod phase;

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use rand::distributions::{Alphanumeric, DistString};
use rand::seq::SliceRandom;
use rand::RngCore;
use rust_fsm::StateMachine;
use serde::Serialize;

use crate::error::GameError;
use crate::game::game_fsm::{GameFsm, GameFsmInput, GameFsmState};
use crate::game::phase::GamePhase;
use crate::round::Round;
use crate::team::Team;

const ROUND_ID_LENGTH: usize = 10;
const MINIMUM_PLAYERS_PER_TEAM: usize = 2;

/// Aggregate root of one play session: teams, the append-only round history,
/// the entry universe and the per-phase available pool. The current round is
/// always the last element of `rounds`.
#[derive(Debug)]
pub struct Game {
    id: String,
    name: String,
    description: String,
    fsm: StateMachine<GameFsm>,
    phase: Option<GamePhase>,
    round_time_ms: u64,
    entries_per_player: usize,
    assign_teams: bool,
    teams: BTreeMap<String, Team>,
    rounds: Vec<Round>,
    all_entries: HashSet<String>,
    available_entries: HashSet<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TeamScore {
    pub team: String,
    pub score: usize,
    pub players: Vec<PlayerScore>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlayerScore {
    pub player: String,
    pub score: usize,
    /// The player scored for this team but is no longer on its roster.
    pub synthetic: bool,
}

impl Game {
    pub fn new(
        id: &str,
        name: &str,
        description: &str,
        team_names: &[String],
        round_time_ms: u64,
        entries_per_player: usize,
        assign_teams: bool,
    ) -> Result<Self, GameError> {
        if team_names.is_empty() {
            return Err(GameError::NoTeams);
        }
        let mut teams = BTreeMap::new();
        for team_name in team_names {
            if teams
                .insert(team_name.clone(), Team::new(team_name))
                .is_some()
            {
                return Err(GameError::DuplicateTeamName(team_name.clone()));
            }
        }

        Ok(Game {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            fsm: StateMachine::default(),
            phase: None,
            round_time_ms,
            entries_per_player,
            assign_teams,
            teams,
            rounds: Vec::default(),
            all_entries: HashSet::default(),
            available_entries: HashSet::default(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn state(&self) -> &GameFsmState {
        self.fsm.state()
    }

    pub fn phase(&self) -> Option<GamePhase> {
        self.phase
    }

    pub fn round_time_ms(&self) -> u64 {
        self.round_time_ms
    }

    pub fn entries_per_player(&self) -> usize {
        self.entries_per_player
    }

    pub fn assign_teams(&self) -> bool {
        self.assign_teams
    }

    /// Teams in the fixed rotation order (sorted by name).
    pub fn teams(&self) -> Vec<&Team> {
        self.teams.values().collect()
    }

    pub fn contains_team(&self, team_name: &str) -> bool {
        self.teams.contains_key(team_name)
    }

    pub fn team(&self, team_name: &str) -> Result<&Team, GameError> {
        self.teams
            .get(team_name)
            .ok_or_else(|| GameError::TeamNotFound(team_name.to_string()))
    }

    pub fn rounds(&self) -> &[Round] {
        &self.rounds
    }

    pub fn current_round(&self) -> Option<&Round> {
        self.rounds.last()
    }

    pub fn current_round_mut(&mut self) -> Option<&mut Round> {
        self.rounds.last_mut()
    }

    pub fn player_count(&self) -> usize {
        self.teams.values().map(|team| team.players().len()).sum()
    }

    pub fn add_player(&mut self, team_name: &str, player_name: &str) -> Result<(), GameError> {
        self.team_mut(team_name)?.add_player(player_name)
    }

    pub fn add_player_entries(
        &mut self,
        team_name: &str,
        player_name: &str,
        entries: HashSet<String>,
    ) -> Result<(), GameError> {
        self.add_player(team_name, player_name)?;
        self.add_entries(entries);
        Ok(())
    }

    pub fn add_entries(&mut self, entries: HashSet<String>) {
        for entry in entries {
            self.all_entries.insert(entry.clone());
            self.available_entries.insert(entry);
        }
    }

    pub fn available_entries(&self) -> Vec<String> {
        self.available_entries.iter().cloned().collect()
    }

    pub fn total_entries(&self) -> Vec<String> {
        self.all_entries.iter().cloned().collect()
    }

    pub fn has_more_entries(&self) -> bool {
        !self.available_entries.is_empty()
    }

    pub fn player_team(&self, player_name: &str) -> Result<&Team, GameError> {
        self.teams
            .values()
            .find(|team| team.contains_player(player_name))
            .ok_or_else(|| GameError::PlayerNotInGame(player_name.to_string()))
    }

    /// Removes a player from their team. Unless `force` is set, the removal is
    /// refused when it would leave the team with less than one player.
    pub fn remove_player(&mut self, player_name: &str, force: bool) -> Result<(), GameError> {
        let team_name = self.player_team(player_name)?.name().to_string();
        let team = self.team_mut(&team_name)?;
        if !force && team.players().len() <= 1 {
            return Err(GameError::CannotRemoveLastTeamPlayer(team_name));
        }
        team.remove_player(player_name);
        Ok(())
    }

    pub fn random_team(&self, rng: &mut dyn RngCore) -> Result<&Team, GameError> {
        let teams: Vec<&Team> = self.teams.values().collect();
        teams.choose(rng).copied().ok_or(GameError::NoTeams)
    }

    pub fn team_with_least_players(&self, rng: &mut dyn RngCore) -> Result<&Team, GameError> {
        let least = self
            .teams
            .values()
            .map(|team| team.players().len())
            .min()
            .ok_or(GameError::NoTeams)?;
        let candidates: Vec<&Team> = self
            .teams
            .values()
            .filter(|team| team.players().len() == least)
            .collect();
        candidates.choose(rng).copied().ok_or(GameError::NoTeams)
    }

    pub fn team_with_most_players(&self, rng: &mut dyn RngCore) -> Result<&Team, GameError> {
        let most = self
            .teams
            .values()
            .map(|team| team.players().len())
            .max()
            .ok_or(GameError::NoTeams)?;
        let candidates: Vec<&Team> = self
            .teams
            .values()
            .filter(|team| team.players().len() == most)
            .collect();
        candidates.choose(rng).copied().ok_or(GameError::NoTeams)
    }

    /// Team immediately following `team_name` in rotation order, wrapping
    /// around to the first team after the last.
    pub fn next_team(&self, team_name: &str) -> Result<&Team, GameError> {
        let teams: Vec<&Team> = self.teams.values().collect();
        let index = teams
            .iter()
            .position(|team| team.name() == team_name)
            .ok_or_else(|| GameError::TeamNotFound(team_name.to_string()))?;
        Ok(teams[(index + 1) % teams.len()])
    }

    pub fn last_round_of_team(&self, team_name: &str) -> Option<&Round> {
        self.rounds
            .iter()
            .rev()
            .find(|round| round.team_name() == team_name)
    }

    /// Transitions SETUP → PLAY, enters the first phase and creates the first
    /// round for a randomly chosen team and player.
    pub fn start(&mut self, rng: &mut dyn RngCore) -> Result<(), GameError> {
        for team in self.teams.values() {
            if team.players().len() < MINIMUM_PLAYERS_PER_TEAM {
                return Err(GameError::NotEnoughPlayers {
                    team: team.name().to_string(),
                    actual: team.players().len(),
                    minimum: MINIMUM_PLAYERS_PER_TEAM,
                });
            }
        }
        self.consume(&GameFsmInput::StartGame)?;
        self.phase = Some(GamePhase::first());
        let (team_name, player_name) = {
            let team = self.random_team(rng)?;
            (
                team.name().to_string(),
                team.random_player(rng)?.to_string(),
            )
        };
        let round_time_ms = self.round_time_ms;
        self.setup_new_round(rng, &team_name, &player_name, round_time_ms);
        Ok(())
    }

    /// Appends a new AWAIT_START round seeded with a copy of the game's
    /// current available pool.
    pub fn setup_new_round(
        &mut self,
        rng: &mut dyn RngCore,
        team_name: &str,
        player_name: &str,
        round_time_ms: u64,
    ) {
        let id = Alphanumeric.sample_string(rng, ROUND_ID_LENGTH);
        let round = Round::new(
            rng,
            &id,
            team_name,
            player_name,
            round_time_ms,
            self.available_entries.iter().cloned().collect(),
        );
        self.rounds.push(round);
    }

    /// Normal turn handoff: the team after the current round's team takes
    /// over, continuing its own player rotation from that team's last round
    /// (or a random player if the team has not played yet).
    pub fn setup_next_round(&mut self, rng: &mut dyn RngCore) -> Result<(), GameError> {
        let current_team = self
            .current_round()
            .ok_or_else(|| GameError::NoCurrentRound(self.id.clone()))?
            .team_name()
            .to_string();
        let next_team = self.next_team(&current_team)?.name().to_string();
        let player_name = match self.last_round_of_team(&next_team) {
            Some(previous_round) => self
                .team(&next_team)?
                .next_player(previous_round.player_name())?
                .to_string(),
            None => self.team(&next_team)?.random_player(rng)?.to_string(),
        };
        let round_time_ms = self.round_time_ms;
        self.setup_new_round(rng, &next_team, &player_name, round_time_ms);
        Ok(())
    }

    /// Advances to the next phase and refills the available pool. Returns
    /// `false` when the last phase is already over: the phase is cleared and
    /// the game moves to END, terminally.
    pub fn setup_new_phase(&mut self) -> Result<bool, GameError> {
        let next = match self.phase {
            None => Some(GamePhase::first()),
            Some(phase) => phase.next(),
        };
        match next {
            Some(phase) => {
                self.phase = Some(phase);
                self.reset_entries();
                Ok(true)
            }
            None => {
                self.phase = None;
                self.consume(&GameFsmInput::FinishGame)?;
                Ok(false)
            }
        }
    }

    /// Ends the current round and commits its correct entries out of the
    /// game's available pool.
    pub fn complete_current_round(&mut self) -> Result<(), GameError> {
        let id = self.id.clone();
        let round = self
            .rounds
            .last_mut()
            .ok_or(GameError::NoCurrentRound(id))?;
        round.finish()?;
        let correct_entries: Vec<String> = round.correct_entries().to_vec();
        self.remove_entries(&correct_entries);
        Ok(())
    }

    /// Ends the current round without touching the game's available pool
    /// (used when the active player is removed mid-turn). Returns the round's
    /// remaining time so the replacement round can inherit it.
    pub fn terminate_current_round(&mut self) -> Result<i64, GameError> {
        let id = self.id.clone();
        let round = self
            .rounds
            .last_mut()
            .ok_or(GameError::NoCurrentRound(id))?;
        round.finish()?;
        Ok(round.remaining_time_ms())
    }

    pub fn remove_entries(&mut self, entries: &[String]) {
        for entry in entries {
            self.available_entries.remove(entry);
        }
    }

    pub fn reset_entries(&mut self) {
        self.available_entries = self.all_entries.clone();
    }

    /// Moves a random player from the (random maximal) donor team to the
    /// understaffed team, so a following removal cannot strand it at zero.
    pub fn adjust_team(&mut self, team_name: &str, rng: &mut dyn RngCore) -> Result<(), GameError> {
        let donor_name = self.team_with_most_players(rng)?.name().to_string();
        let cut_player = {
            let donor = self.team_mut(&donor_name)?;
            let cut_player = donor.random_player(rng)?.to_string();
            donor.remove_player(&cut_player);
            cut_player
        };
        self.team_mut(team_name)?.add_player(&cut_player)
    }

    /// Per-team and per-player sums of correct entries over all rounds ever
    /// played. Players that scored but left the roster stay listed, flagged
    /// synthetic.
    pub fn team_scores(&self) -> Vec<TeamScore> {
        let mut rounds_by_team: HashMap<&str, Vec<&Round>> = HashMap::new();
        for round in &self.rounds {
            rounds_by_team.entry(round.team_name()).or_default().push(round);
        }

        self.teams
            .values()
            .map(|team| {
                let team_rounds = rounds_by_team.get(team.name());
                let score = team_rounds
                    .map(|rounds| {
                        rounds
                            .iter()
                            .map(|round| round.correct_entries().len())
                            .sum()
                    })
                    .unwrap_or(0);

                let mut score_by_player: HashMap<&str, usize> = HashMap::new();
                if let Some(rounds) = team_rounds {
                    for round in rounds {
                        *score_by_player.entry(round.player_name()).or_default() +=
                            round.correct_entries().len();
                    }
                }

                let mut all_players: BTreeSet<&str> =
                    team.players().iter().map(String::as_str).collect();
                all_players.extend(score_by_player.keys().copied());

                let players = all_players
                    .into_iter()
                    .map(|player| match score_by_player.get(player) {
                        Some(player_score) => PlayerScore {
                            player: player.to_string(),
                            score: *player_score,
                            synthetic: !team.contains_player(player),
                        },
                        None => PlayerScore {
                            player: player.to_string(),
                            score: 0,
                            synthetic: false,
                        },
                    })
                    .collect();

                TeamScore {
                    team: team.name().to_string(),
                    score,
                    players,
                }
            })
            .collect()
    }

    fn team_mut(&mut self, team_name: &str) -> Result<&mut Team, GameError> {
        self.teams
            .get_mut(team_name)
            .ok_or_else(|| GameError::TeamNotFound(team_name.to_string()))
    }

    fn consume(&mut self, input: &GameFsmInput) -> Result<(), GameError> {
        match self.fsm.consume(input) {
            Ok(_) => Ok(()),
            Err(error) => Err(GameError::log_and_create_internal(&format!(
                "The game fsm in state {:?} can't transition with an event {:?}. GameId: '{}', Error: '{error}'.",
                self.fsm.state(),
                input,
                self.id
            ))),
        }
    }
}

impl Clone for Game {
    fn clone(&self) -> Self {
        Game {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            fsm: StateMachine::from_state(self.fsm.state().clone()),
            phase: self.phase,
            round_time_ms: self.round_time_ms,
            entries_per_player: self.entries_per_player,
            assign_teams: self.assign_teams,
            teams: self.teams.clone(),
            rounds: self.rounds.clone(),
            all_entries: self.all_entries.clone(),
            available_entries: self.available_entries.clone(),
        }
    }
}

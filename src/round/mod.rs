pub mod round_fsm;

use rand::seq::SliceRandom;
use rand::RngCore;
use rust_fsm::StateMachine;
use tokio::time::Instant;

use crate::error::GameError;
use crate::round::round_fsm::{RoundFsm, RoundFsmInput, RoundFsmState};

/// One player's timed turn. Owns a private working copy of the game's
/// available entries, taken at round creation; the copy only ever shrinks.
#[derive(Debug)]
pub struct Round {
    id: String,
    fsm: StateMachine<RoundFsm>,
    team_name: String,
    player_name: String,
    round_time_ms: u64,
    start_timestamp: Instant,
    in_progress_timestamp: Option<Instant>,
    available_entries: Vec<String>,
    correct_entries: Vec<String>,
    current_entry: Option<String>,
}

impl Round {
    pub fn new(
        rng: &mut dyn RngCore,
        id: &str,
        team_name: &str,
        player_name: &str,
        round_time_ms: u64,
        entries: Vec<String>,
    ) -> Self {
        let mut round = Round {
            id: id.to_string(),
            fsm: StateMachine::default(),
            team_name: team_name.to_string(),
            player_name: player_name.to_string(),
            round_time_ms,
            start_timestamp: Instant::now(),
            in_progress_timestamp: None,
            available_entries: entries,
            correct_entries: Vec::default(),
            current_entry: None,
        };
        round.draw_entry(rng);
        round
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> &RoundFsmState {
        self.fsm.state()
    }

    pub fn team_name(&self) -> &str {
        &self.team_name
    }

    pub fn player_name(&self) -> &str {
        &self.player_name
    }

    pub fn round_time_ms(&self) -> u64 {
        self.round_time_ms
    }

    pub fn start_timestamp(&self) -> Instant {
        self.start_timestamp
    }

    pub fn current_entry(&self) -> Option<&str> {
        self.current_entry.as_deref()
    }

    pub fn available_entries(&self) -> &[String] {
        &self.available_entries
    }

    pub fn correct_entries(&self) -> &[String] {
        &self.correct_entries
    }

    pub fn start(&mut self) -> Result<(), GameError> {
        self.consume(&RoundFsmInput::StartRound)?;
        self.in_progress_timestamp = Some(Instant::now());
        Ok(())
    }

    pub fn finish(&mut self) -> Result<(), GameError> {
        self.consume(&RoundFsmInput::FinishRound)
    }

    /// Marks `entry` as guessed and draws the next one. Returns whether an
    /// entry is still up for guessing; `false` means the pool is exhausted and
    /// the caller has to resolve the end of the round.
    pub fn add_correct_entry(
        &mut self,
        rng: &mut dyn RngCore,
        entry: &str,
    ) -> Result<bool, GameError> {
        self.validate_entry(entry)?;
        self.available_entries
            .retain(|available| available.as_str() != entry);
        self.correct_entries.push(entry.to_string());
        self.draw_entry(rng);
        Ok(self.current_entry.is_some())
    }

    /// Re-draws the current entry without consuming it; the rejected entry
    /// stays in the pool and may come up again.
    pub fn reject_entry(&mut self, rng: &mut dyn RngCore, entry: &str) -> Result<(), GameError> {
        self.validate_entry(entry)?;
        self.draw_entry(rng);
        Ok(())
    }

    /// Remaining time in milliseconds. Before the round is started this is the
    /// configured round time; afterwards it may go negative while the timeout
    /// callback has not fired yet.
    pub fn remaining_time_ms(&self) -> i64 {
        match self.in_progress_timestamp {
            None => self.round_time_ms as i64,
            Some(in_progress_timestamp) => {
                self.round_time_ms as i64 - in_progress_timestamp.elapsed().as_millis() as i64
            }
        }
    }

    fn draw_entry(&mut self, rng: &mut dyn RngCore) {
        self.current_entry = self.available_entries.choose(rng).cloned();
    }

    /// A mismatch on any of these means the client acted on stale round state.
    fn validate_entry(&self, entry: &str) -> Result<(), GameError> {
        if !self
            .available_entries
            .iter()
            .any(|available| available.as_str() == entry)
        {
            return Err(GameError::EntryNotAvailable(entry.to_string()));
        }
        if self
            .correct_entries
            .iter()
            .any(|correct| correct.as_str() == entry)
        {
            return Err(GameError::EntryAlreadyCorrect(entry.to_string()));
        }
        if self.current_entry.as_deref() != Some(entry) {
            return Err(GameError::EntryNotCurrent(entry.to_string()));
        }
        Ok(())
    }

    fn consume(&mut self, input: &RoundFsmInput) -> Result<(), GameError> {
        match self.fsm.consume(input) {
            Ok(_) => Ok(()),
            Err(error) => Err(GameError::log_and_create_internal(&format!(
                "The round fsm in state {:?} can't transition with an event {:?}. RoundId: '{}', Error: '{error}'.",
                self.fsm.state(),
                input,
                self.id
            ))),
        }
    }
}

impl Clone for Round {
    fn clone(&self) -> Self {
        Round {
            id: self.id.clone(),
            fsm: StateMachine::from_state(self.fsm.state().clone()),
            team_name: self.team_name.clone(),
            player_name: self.player_name.clone(),
            round_time_ms: self.round_time_ms,
            start_timestamp: self.start_timestamp,
            in_progress_timestamp: self.in_progress_timestamp,
            available_entries: self.available_entries.clone(),
            correct_entries: self.correct_entries.clone(),
            current_entry: self.current_entry.clone(),
        }
    }
}

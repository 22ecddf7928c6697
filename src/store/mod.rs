pub mod scheduler;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use crate::error::GameError;
use crate::game::game_fsm::GameFsmState;
use crate::game::Game;
use crate::metrics::ACTIVE_GAMES;
use crate::store::scheduler::Scheduler;

/// Concurrent keyed store of game aggregates. Updates for the same id are
/// serialized by a per-game lock; updates for different ids run in parallel.
/// Every read returns a snapshot clone, never a reference into the store.
#[derive(Clone)]
pub struct SessionStore {
    games: Arc<RwLock<HashMap<String, Arc<Mutex<Game>>>>>,
    scheduler: Scheduler,
}

impl SessionStore {
    pub fn new(scheduler: Scheduler) -> Self {
        SessionStore {
            games: Arc::new(RwLock::new(HashMap::default())),
            scheduler,
        }
    }

    pub fn get(&self, game_id: &str) -> Result<Game, GameError> {
        let game = self.game_lock(game_id)?;
        let game = game
            .lock()
            .expect("The game lock is poisoned.");
        Ok(game.clone())
    }

    pub fn create(&self, game: Game) -> Result<(), GameError> {
        let mut games = self
            .games
            .write()
            .expect("The session store lock is poisoned.");
        if games.contains_key(game.id()) {
            return Err(GameError::GameAlreadyExists(game.id().to_string()));
        }
        games.insert(game.id().to_string(), Arc::new(Mutex::new(game)));
        ACTIVE_GAMES.inc();
        Ok(())
    }

    /// Applies `operation` to the stored game under its per-id lock and
    /// returns the operation's result. The closure either fully succeeds or
    /// fails without the store handing out the intermediate state to anyone.
    pub fn update<T>(
        &self,
        game_id: &str,
        operation: impl FnOnce(&mut Game) -> Result<T, GameError>,
    ) -> Result<T, GameError> {
        let game = self.game_lock(game_id)?;
        let mut game = game
            .lock()
            .expect("The game lock is poisoned.");
        operation(&mut game)
    }

    /// Removes the game if present; removal of an already removed game is not
    /// an error.
    pub fn remove(&self, game_id: &str) {
        let removed = self
            .games
            .write()
            .expect("The session store lock is poisoned.")
            .remove(game_id);
        if let Some(game) = removed {
            ACTIVE_GAMES.dec();
            let game = game.lock().expect("The game lock is poisoned.");
            log::info!(
                "Game removed. GameId: '{}', State: '{:?}'.",
                game.id(),
                game.state()
            );
        }
    }

    /// Snapshot of every game whose state is among `states`.
    pub fn list_by_state(&self, states: &[GameFsmState]) -> Vec<Game> {
        let games: Vec<Arc<Mutex<Game>>> = self
            .games
            .read()
            .expect("The session store lock is poisoned.")
            .values()
            .cloned()
            .collect();
        games
            .iter()
            .filter_map(|game| {
                let game = game.lock().expect("The game lock is poisoned.");
                states.contains(game.state()).then(|| game.clone())
            })
            .collect()
    }

    /// Registers a one-shot deferred mutation, routed through `update` so it
    /// obeys the same per-id exclusivity. If the game is gone by the time the
    /// delay elapses, the action is dropped silently.
    pub fn schedule_update(
        &self,
        game_id: &str,
        delay: Duration,
        operation: impl FnOnce(&mut Game) + Send + 'static,
    ) {
        let store = self.clone();
        let game_id = game_id.to_string();
        self.scheduler.schedule(delay, async move {
            if let Err(error) = store.update(&game_id, |game| {
                operation(game);
                Ok(())
            }) {
                log::debug!(
                    "Scheduled update skipped, the game is gone. GameId: '{game_id}', Error: '{error}'."
                );
            }
        });
    }

    /// Registers a one-shot deferred removal with remove-if-present semantics.
    pub fn schedule_remove(&self, game_id: &str, delay: Duration) {
        let store = self.clone();
        let game_id = game_id.to_string();
        self.scheduler.schedule(delay, async move {
            store.remove(&game_id);
        });
    }

    fn game_lock(&self, game_id: &str) -> Result<Arc<Mutex<Game>>, GameError> {
        self.games
            .read()
            .expect("The session store lock is poisoned.")
            .get(game_id)
            .cloned()
            .ok_or_else(|| GameError::GameNotFound(game_id.to_string()))
    }
}

use lazy_static::lazy_static;
use prometheus::{IntCounter, IntGauge, Registry};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref ACTIVE_GAMES: IntGauge =
        IntGauge::new("wordrush_active_games", "Active ongoing games")
            .expect("metric cannot be created");
    pub static ref COMPLETED_ROUNDS: IntCounter =
        IntCounter::new("wordrush_completed_rounds", "Rounds played to completion")
            .expect("metric cannot be created");
}

pub fn register_metrics() {
    REGISTRY
        .register(Box::new(ACTIVE_GAMES.clone()))
        .expect("collector cannot be registered");

    REGISTRY
        .register(Box::new(COMPLETED_ROUNDS.clone()))
        .expect("collector cannot be registered");
}

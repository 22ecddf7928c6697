pub mod config;
pub mod error;
pub mod game;
pub mod metrics;
pub mod round;
pub mod service;
pub mod store;
pub mod team;

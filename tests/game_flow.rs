use std::collections::HashSet;
use std::time::Duration;

use wordrush::config::GameSettings;
use wordrush::error::{GameError, Severity};
use wordrush::game::game_fsm::GameFsmState;
use wordrush::game::phase::GamePhase;
use wordrush::round::round_fsm::RoundFsmState;
use wordrush::service::GameService;
use wordrush::store::scheduler::Scheduler;
use wordrush::store::SessionStore;

fn service() -> GameService {
    service_with_ttl(14_400)
}

fn service_with_ttl(session_ttl_seconds: u64) -> GameService {
    GameService::new(
        SessionStore::new(Scheduler::new()),
        GameSettings {
            session_ttl_seconds,
        },
    )
}

fn entries(values: &[&str]) -> HashSet<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn create_game(service: &GameService, round_time_ms: u64) -> String {
    let game = service
        .create_game(
            "friday game",
            &["a".to_string(), "b".to_string()],
            round_time_ms,
            2,
            "after-work session",
            false,
        )
        .expect("Game could not be created.");
    game.id().to_string()
}

/// Two players per team, two entries each: an eight-entry pool.
fn join_four_players(service: &GameService, game_id: &str) {
    for (team, player, words) in [
        ("a", "anna", ["x", "y"]),
        ("a", "bob", ["z", "w"]),
        ("b", "carol", ["p", "q"]),
        ("b", "dave", ["r", "s"]),
    ] {
        service
            .join_setup_game(game_id, Some(team), player, entries(&words))
            .expect("Player could not join.");
    }
}

fn started_game(service: &GameService, round_time_ms: u64) -> String {
    let game_id = create_game(service, round_time_ms);
    join_four_players(service, &game_id);
    service.start_game(&game_id).expect("Game could not start.");
    game_id
}

fn current_round_player(service: &GameService, game_id: &str) -> String {
    service
        .get_game(game_id)
        .unwrap()
        .current_round()
        .expect("No current round.")
        .player_name()
        .to_string()
}

/// Guesses the current entry `count` times in a row.
fn guess_entries(service: &GameService, game_id: &str, player: &str, count: usize) {
    for _ in 0..count {
        let entry = service
            .get_game(game_id)
            .unwrap()
            .current_round()
            .expect("No current round.")
            .current_entry()
            .expect("No current entry.")
            .to_string();
        service
            .correct_entry(game_id, player, &entry)
            .expect("Entry could not be accepted.");
    }
}

async fn let_scheduled_tasks_run() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn created_game_is_in_setup_and_listed_as_available() {
    let service = service();
    let game_id = create_game(&service, 60_000);

    let game = service.get_game(&game_id).unwrap();
    assert_eq!(game.state(), &GameFsmState::Setup);
    assert_eq!(game.phase(), None);
    assert_eq!(game.name(), "friday game");
    assert_eq!(game.description(), "after-work session");

    let available = service.get_available_games();
    assert_eq!(available.len(), 1);
    assert_eq!(available[0].id(), game_id);
    assert!(service.validate_can_join(&game_id).is_ok());
}

#[tokio::test]
async fn create_game_rejects_empty_names() {
    let service = service();

    let result = service.create_game("", &["a".to_string()], 60_000, 2, "", false);
    assert_eq!(result.err(), Some(GameError::EmptyField));

    let result = service.create_game(
        "game",
        &["a".to_string(), "".to_string()],
        60_000,
        2,
        "",
        false,
    );
    assert_eq!(result.err(), Some(GameError::EmptyField));
}

#[tokio::test]
async fn unknown_game_is_a_fatal_not_found() {
    let service = service();

    let error = service.get_game("nope!").unwrap_err();

    assert_eq!(error, GameError::GameNotFound("nope!".to_string()));
    assert_eq!(error.severity(), Severity::Fatal);
}

#[tokio::test]
async fn join_requires_the_configured_amount_of_entries() {
    let service = service();
    let game_id = create_game(&service, 60_000);

    let result = service.join_setup_game(&game_id, Some("a"), "anna", entries(&["x"]));

    assert_eq!(
        result.err(),
        Some(GameError::WrongEntryCount {
            expected: 2,
            actual: 1
        })
    );
}

#[tokio::test]
async fn join_requires_an_existing_team() {
    let service = service();
    let game_id = create_game(&service, 60_000);

    let result = service.join_setup_game(&game_id, Some("c"), "anna", entries(&["x", "y"]));

    assert_eq!(result.err(), Some(GameError::TeamNotFound("c".to_string())));
}

#[tokio::test]
async fn auto_assignment_fills_the_least_populated_team() {
    let service = service();
    let game = service
        .create_game(
            "game",
            &["a".to_string(), "b".to_string()],
            60_000,
            2,
            "",
            true,
        )
        .unwrap();

    let first = service
        .join_setup_game(game.id(), None, "anna", entries(&["x", "y"]))
        .unwrap();
    let second = service
        .join_setup_game(game.id(), None, "bob", entries(&["z", "w"]))
        .unwrap();

    assert_ne!(first, second);
    let game = service.get_game(game.id()).unwrap();
    assert_eq!(game.team("a").unwrap().players().len(), 1);
    assert_eq!(game.team("b").unwrap().players().len(), 1);
}

#[tokio::test]
async fn start_game_requires_two_players_per_team() {
    let service = service();
    let game_id = create_game(&service, 60_000);
    service
        .join_setup_game(&game_id, Some("a"), "anna", entries(&["x", "y"]))
        .unwrap();
    service
        .join_setup_game(&game_id, Some("a"), "bob", entries(&["z", "w"]))
        .unwrap();
    service
        .join_setup_game(&game_id, Some("b"), "carol", entries(&["p", "q"]))
        .unwrap();

    let result = service.start_game(&game_id);

    assert_eq!(
        result.err(),
        Some(GameError::NotEnoughPlayers {
            team: "b".to_string(),
            actual: 1,
            minimum: 2,
        })
    );
}

#[tokio::test]
async fn started_game_enters_play_with_a_waiting_round() {
    let service = service();
    let game_id = started_game(&service, 60_000);

    let game = service.get_game(&game_id).unwrap();
    assert_eq!(game.state(), &GameFsmState::Play);
    assert_eq!(game.phase(), Some(GamePhase::AllWords));
    let round = game.current_round().expect("No round was created.");
    assert_eq!(round.state(), &RoundFsmState::AwaitStart);
    assert!(game.contains_team(round.team_name()));
    assert!(game
        .team(round.team_name())
        .unwrap()
        .contains_player(round.player_name()));
    assert_eq!(round.available_entries().len(), 8);
}

#[tokio::test]
async fn only_the_round_player_may_start_the_round() {
    let service = service();
    let game_id = started_game(&service, 60_000);
    let player = current_round_player(&service, &game_id);
    let intruder = if player == "anna" { "bob" } else { "anna" };

    let result = service.start_round(&game_id, intruder);
    assert_eq!(
        result.err(),
        Some(GameError::RoundNotOwnedByPlayer(intruder.to_string()))
    );

    service.start_round(&game_id, &player).unwrap();
    let game = service.get_game(&game_id).unwrap();
    assert_eq!(
        game.current_round().unwrap().state(),
        &RoundFsmState::InProgress
    );
}

#[tokio::test]
async fn late_join_is_only_allowed_in_play() {
    let service = service();
    let game_id = create_game(&service, 60_000);
    join_four_players(&service, &game_id);

    let result = service.join_play_game(&game_id, "a", "eve");
    assert!(matches!(
        result,
        Err(GameError::InvalidGameState { .. })
    ));

    service.start_game(&game_id).unwrap();
    service.join_play_game(&game_id, "a", "eve").unwrap();

    let game = service.get_game(&game_id).unwrap();
    assert!(game.team("a").unwrap().contains_player("eve"));
}

#[tokio::test]
async fn correct_entries_score_for_the_round_team() {
    let service = service();
    let game_id = started_game(&service, 60_000);
    let player = current_round_player(&service, &game_id);
    service.start_round(&game_id, &player).unwrap();

    guess_entries(&service, &game_id, &player, 3);

    let game = service.get_game(&game_id).unwrap();
    let round = game.current_round().unwrap();
    assert_eq!(round.correct_entries().len(), 3);
    assert_eq!(round.available_entries().len(), 5);

    let scores = service.get_team_scores(&game_id).unwrap();
    let round_team = round.team_name();
    let team_score = scores.iter().find(|score| score.team == round_team).unwrap();
    assert_eq!(team_score.score, 3);
    let player_score = team_score
        .players
        .iter()
        .find(|score| score.player == player)
        .unwrap();
    assert_eq!(player_score.score, 3);
    assert!(!player_score.synthetic);

    let json = serde_json::to_value(&scores).unwrap();
    assert_eq!(json[0]["team"], "a");
}

#[tokio::test]
async fn rejecting_a_non_current_entry_is_a_state_conflict() {
    let service = service();
    let game_id = started_game(&service, 60_000);
    let player = current_round_player(&service, &game_id);
    service.start_round(&game_id, &player).unwrap();

    let current = service
        .get_game(&game_id)
        .unwrap()
        .current_round()
        .unwrap()
        .current_entry()
        .unwrap()
        .to_string();
    let other = ["x", "y", "z", "w", "p", "q", "r", "s"]
        .iter()
        .find(|entry| **entry != current)
        .unwrap()
        .to_string();

    let error = service.reject_entry(&game_id, &player, &other).unwrap_err();

    assert_eq!(error, GameError::EntryNotCurrent(other));
    assert_eq!(error.severity(), Severity::Error);
    let game = service.get_game(&game_id).unwrap();
    assert_eq!(game.current_round().unwrap().current_entry(), Some(current.as_str()));
}

#[tokio::test(start_paused = true)]
async fn round_timeout_rotates_to_the_next_team() {
    let service = service();
    let game_id = started_game(&service, 60_000);
    let player = current_round_player(&service, &game_id);
    let first_team = service
        .get_game(&game_id)
        .unwrap()
        .current_round()
        .unwrap()
        .team_name()
        .to_string();
    service.start_round(&game_id, &player).unwrap();

    tokio::time::advance(Duration::from_millis(61_000)).await;
    let_scheduled_tasks_run().await;

    let game = service.get_game(&game_id).unwrap();
    assert_eq!(game.rounds().len(), 2);
    assert_eq!(game.rounds()[0].state(), &RoundFsmState::End);
    let current = game.current_round().unwrap();
    assert_eq!(current.state(), &RoundFsmState::AwaitStart);
    assert_eq!(
        current.team_name(),
        game.next_team(&first_team).unwrap().name()
    );
    assert_eq!(current.round_time_ms(), 60_000);
}

#[tokio::test(start_paused = true)]
async fn exhausting_the_pool_advances_the_phase_on_the_same_team() {
    let service = service();
    let game_id = started_game(&service, 60_000);
    let player = current_round_player(&service, &game_id);
    let first_team = service
        .get_game(&game_id)
        .unwrap()
        .current_round()
        .unwrap()
        .team_name()
        .to_string();
    service.start_round(&game_id, &player).unwrap();

    guess_entries(&service, &game_id, &player, 8);

    let game = service.get_game(&game_id).unwrap();
    assert_eq!(game.phase(), Some(GamePhase::OneWord));
    let replacement = game.current_round().unwrap();
    // The phase handoff stays anchored on the team and player that exhausted
    // the pool instead of rotating onwards.
    assert_eq!(replacement.team_name(), first_team);
    assert_eq!(replacement.player_name(), player);
    assert_eq!(replacement.state(), &RoundFsmState::AwaitStart);
    assert_eq!(replacement.available_entries().len(), 8);
    assert!(replacement.round_time_ms() <= 60_000);
}

#[tokio::test(start_paused = true)]
async fn stale_round_timeout_is_a_no_op() {
    let service = service();
    let game_id = started_game(&service, 60_000);
    let player = current_round_player(&service, &game_id);
    service.start_round(&game_id, &player).unwrap();

    // End the round early by exhausting its pool; the original timer is
    // still pending.
    guess_entries(&service, &game_id, &player, 8);
    let before = service.get_game(&game_id).unwrap();
    let replacement_id = before.current_round().unwrap().id().to_string();

    tokio::time::advance(Duration::from_millis(61_000)).await;
    let_scheduled_tasks_run().await;

    let after = service.get_game(&game_id).unwrap();
    assert_eq!(after.current_round().unwrap().id(), replacement_id);
    assert_eq!(
        after.current_round().unwrap().state(),
        &RoundFsmState::AwaitStart
    );
    assert_eq!(after.phase(), Some(GamePhase::OneWord));
    assert_eq!(after.rounds().len(), before.rounds().len());
}

#[tokio::test(start_paused = true)]
async fn full_game_plays_through_all_three_phases() {
    let service = service();
    let game_id = started_game(&service, 60_000);

    for _ in 0..GamePhase::ALL.len() {
        let player = current_round_player(&service, &game_id);
        service.start_round(&game_id, &player).unwrap();
        guess_entries(&service, &game_id, &player, 8);
    }

    let game = service.get_game(&game_id).unwrap();
    assert_eq!(game.state(), &GameFsmState::End);
    assert_eq!(game.phase(), None);
    assert!(matches!(
        service.validate_can_join(&game_id),
        Err(GameError::InvalidGameState { .. })
    ));
    assert!(service.get_available_games().is_empty());

    let total: usize = service
        .get_team_scores(&game_id)
        .unwrap()
        .iter()
        .map(|score| score.score)
        .sum();
    assert_eq!(total, 24);
}

#[tokio::test(start_paused = true)]
async fn games_are_removed_after_the_session_ttl() {
    let service = service_with_ttl(60);
    let game_id = create_game(&service, 60_000);

    tokio::time::advance(Duration::from_secs(61)).await;
    let_scheduled_tasks_run().await;

    assert!(matches!(
        service.get_game(&game_id),
        Err(GameError::GameNotFound(_))
    ));
}

#[tokio::test]
async fn admin_leaving_during_setup_closes_the_game() {
    let service = service();
    let game_id = create_game(&service, 60_000);
    join_four_players(&service, &game_id);

    service.leave_game(&game_id, "anna", true).unwrap();

    assert!(service.get_game(&game_id).is_err());
}

#[tokio::test]
async fn non_admin_leaving_during_setup_just_removes_the_player() {
    let service = service();
    let game_id = create_game(&service, 60_000);
    service
        .join_setup_game(&game_id, Some("a"), "anna", entries(&["x", "y"]))
        .unwrap();

    // During setup even the last player of a team may leave.
    service.leave_game(&game_id, "anna", false).unwrap();

    let game = service.get_game(&game_id).unwrap();
    assert!(game.team("a").unwrap().players().is_empty());
}

#[tokio::test]
async fn leaving_the_active_round_player_replaces_the_round() {
    let service = service();
    let game_id = started_game(&service, 60_000);
    let player = current_round_player(&service, &game_id);
    let team = service
        .get_game(&game_id)
        .unwrap()
        .current_round()
        .unwrap()
        .team_name()
        .to_string();
    service.start_round(&game_id, &player).unwrap();

    service.leave_game(&game_id, &player, false).unwrap();

    let game = service.get_game(&game_id).unwrap();
    assert!(game.player_team(&player).is_err());
    assert_eq!(game.rounds().len(), 2);
    assert_eq!(game.rounds()[0].state(), &RoundFsmState::End);
    let replacement = game.current_round().unwrap();
    assert_eq!(replacement.state(), &RoundFsmState::AwaitStart);
    assert_eq!(replacement.team_name(), team);
    assert_ne!(replacement.player_name(), player);
    assert!(replacement.round_time_ms() <= 60_000);
}

#[tokio::test]
async fn kicking_from_a_depleted_team_pulls_a_donor_player() {
    let service = service();
    let game_id = started_game(&service, 60_000);

    service.kick_player(&game_id, "anna").unwrap();
    // Team a is down to bob; kicking him first rebalances from team b.
    service.kick_player(&game_id, "bob").unwrap();

    let game = service.get_game(&game_id).unwrap();
    assert_eq!(game.team("a").unwrap().players().len(), 1);
    assert_eq!(game.team("b").unwrap().players().len(), 1);
    assert_eq!(game.player_count(), 2);
    assert!(game.player_team("anna").is_err());
    assert!(game.player_team("bob").is_err());
}

#[tokio::test]
async fn kicking_the_last_viable_player_is_refused() {
    let service = service();
    let game_id = started_game(&service, 60_000);
    service.kick_player(&game_id, "anna").unwrap();
    service.kick_player(&game_id, "bob").unwrap();
    let survivor = service.get_game(&game_id).unwrap().team("a").unwrap().players()[0].clone();

    let error = service.kick_player(&game_id, &survivor).unwrap_err();

    assert_eq!(error, GameError::CannotKickLastPlayer);
    assert_eq!(error.severity(), Severity::Error);
    assert!(service.get_game(&game_id).is_ok());
}

#[tokio::test]
async fn leaving_when_every_team_is_depleted_closes_the_game() {
    let service = service();
    let game_id = started_game(&service, 60_000);
    service.kick_player(&game_id, "anna").unwrap();
    service.kick_player(&game_id, "bob").unwrap();
    let survivor = service.get_game(&game_id).unwrap().team("a").unwrap().players()[0].clone();

    service.leave_game(&game_id, &survivor, false).unwrap();

    assert!(matches!(
        service.get_game(&game_id),
        Err(GameError::GameNotFound(_))
    ));
}

#[tokio::test]
async fn leaving_player_stays_in_the_scores_as_synthetic() {
    let service = service();
    let game_id = started_game(&service, 60_000);
    let player = current_round_player(&service, &game_id);
    let team = service
        .get_game(&game_id)
        .unwrap()
        .current_round()
        .unwrap()
        .team_name()
        .to_string();
    service.start_round(&game_id, &player).unwrap();
    guess_entries(&service, &game_id, &player, 2);

    service.leave_game(&game_id, &player, false).unwrap();

    let scores = service.get_team_scores(&game_id).unwrap();
    let team_score = scores.iter().find(|score| score.team == team).unwrap();
    assert_eq!(team_score.score, 2);
    let departed = team_score
        .players
        .iter()
        .find(|score| score.player == player)
        .expect("Departed scorer is no longer listed.");
    assert!(departed.synthetic);
    assert_eq!(departed.score, 2);
}

//! Auto-play loop tests with a scripted engine seated in the game.

use chatchess::{
    EngineConfig, EngineTrouble, GameError, SessionRegistry, Side, TurnStatus,
};

const REPLYING_ENGINE: &str = r#"
i=0
while read line; do
  case "$line" in
    uci) echo "uciok";;
    isready) echo "readyok";;
    go*) i=$((i+1)); if [ "$i" -eq 1 ]; then echo "bestmove e7e5"; else echo "bestmove g8f6"; fi;;
    quit) exit 0;;
  esac
done
"#;

const OPENING_ENGINE: &str = r#"
while read line; do
  case "$line" in
    uci) echo "uciok";;
    isready) echo "readyok";;
    go*) echo "bestmove e2e4";;
    quit) exit 0;;
  esac
done
"#;

const CHEATING_ENGINE: &str = r#"
while read line; do
  case "$line" in
    uci) echo "uciok";;
    isready) echo "readyok";;
    go*) echo "bestmove e2e5";;
    quit) exit 0;;
  esac
done
"#;

fn scripted_config(script: &str) -> EngineConfig {
    toml::from_str(&format!(
        r#"
command = "sh"
args = ["-c", {script:?}]
move_time_ms = 50
handshake_timeout_ms = 2000
search_grace_ms = 500
"#
    ))
    .expect("engine config parses")
}

#[tokio::test]
async fn engine_answers_the_human_move() {
    let registry = SessionRegistry::new();
    let config = scripted_config(REPLYING_ENGINE);
    let session = registry
        .create("chan", "alice", "bot", Some("bot"), &config)
        .await
        .expect("create with engine");

    let mut guard = session.lock().await;

    // The engine plays Black, so the opening advance stops at White.
    let report = guard.advance().await.expect("advance");
    assert!(report.plies.is_empty());
    assert!(matches!(
        report.status,
        TurnStatus::AwaitingMove {
            side: Side::White,
            ..
        }
    ));

    // One human move triggers exactly one engine reply, then control
    // returns to the human.
    let report = guard.submit_move("alice", "e4").await.expect("e4");
    assert_eq!(report.plies.len(), 2);
    assert_eq!(report.plies[0].uci, "e2e4");
    assert_eq!(report.plies[1].uci, "e7e5");
    assert!(report.engine_trouble.is_none());
    match report.status {
        TurnStatus::AwaitingMove { side, player_id } => {
            assert_eq!(side, Side::White);
            assert_eq!(player_id, "alice");
        }
        other => panic!("unexpected status: {other:?}"),
    }
    assert_eq!(guard.rules().history().len(), 2);

    drop(guard);
    registry.remove("chan").await;
}

#[tokio::test]
async fn engine_playing_white_opens_the_game() {
    let registry = SessionRegistry::new();
    let config = scripted_config(OPENING_ENGINE);
    let session = registry
        .create("chan", "bot", "alice", Some("bot"), &config)
        .await
        .expect("create with engine as White");

    let mut guard = session.lock().await;
    let report = guard.advance().await.expect("advance");
    assert_eq!(report.plies.len(), 1);
    assert_eq!(report.plies[0].uci, "e2e4");
    assert!(matches!(
        report.status,
        TurnStatus::AwaitingMove {
            side: Side::Black,
            ..
        }
    ));

    drop(guard);
    registry.remove("chan").await;
}

#[tokio::test]
async fn illegal_engine_move_is_recoverable_trouble() {
    let registry = SessionRegistry::new();
    let config = scripted_config(CHEATING_ENGINE);
    let session = registry
        .create("chan", "alice", "bot", Some("bot"), &config)
        .await
        .expect("create");

    let mut guard = session.lock().await;
    let report = guard.submit_move("alice", "e4").await.expect("e4");

    // The human ply stands, the bogus engine ply does not, and the game
    // stays alive with the engine's seat on the move.
    assert_eq!(report.plies.len(), 1);
    assert_eq!(report.engine_trouble, Some(EngineTrouble::Unavailable));
    assert!(matches!(
        report.status,
        TurnStatus::AwaitingMove {
            side: Side::Black,
            ..
        }
    ));
    assert_eq!(guard.rules().history().len(), 1);

    drop(guard);
    registry.remove("chan").await;
}

#[tokio::test]
async fn create_fails_atomically_when_the_engine_is_missing() {
    let registry = SessionRegistry::new();
    let config: EngineConfig = toml::from_str(
        r#"
command = "/no/such/engine/binary"
handshake_timeout_ms = 1000
"#,
    )
    .expect("engine config parses");

    let err = registry
        .create("chan", "alice", "bot", Some("bot"), &config)
        .await
        .expect_err("bridge spawn fails");
    assert!(matches!(err, GameError::EngineUnavailable));

    // Nothing was registered; the channel is free for a human game.
    assert!(registry.lookup("chan").is_none());
    registry
        .create("chan", "alice", "bob", None, &config)
        .await
        .expect("human game still possible");
}

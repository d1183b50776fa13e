//! Bridge tests against scripted fake engines.
//!
//! Each fake is a small `sh` loop speaking just enough UCI for the case
//! under test, so the suite runs anywhere a POSIX shell exists.

use chatchess::{EngineBridge, EngineConfig, EngineError, ProtocolState};
use std::time::Duration;

const COOPERATIVE_ENGINE: &str = r#"
while read line; do
  case "$line" in
    uci) echo "id name fake"; echo "uciok";;
    isready) echo "readyok";;
    go*) echo "info depth 1 score cp 10"; echo "bestmove e2e4";;
    quit) exit 0;;
  esac
done
"#;

const SLOW_SEARCH_ENGINE: &str = r#"
while read line; do
  case "$line" in
    uci) echo "uciok";;
    isready) echo "readyok";;
    go*) sleep 30;;
    quit) exit 0;;
  esac
done
"#;

const MUTE_ENGINE: &str = "sleep 30";

const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

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
async fn handshake_search_and_close() {
    let config = scripted_config(COOPERATIVE_ENGINE);
    let mut bridge = EngineBridge::start(&config).await.expect("handshake");
    assert_eq!(bridge.state(), ProtocolState::Ready);

    let mv = bridge
        .best_move(START_FEN, Duration::from_millis(50))
        .await
        .expect("search answers");
    assert_eq!(mv, "e2e4");
    assert_eq!(bridge.state(), ProtocolState::Ready);

    bridge.close().await;
    assert_eq!(bridge.state(), ProtocolState::Closed);

    // Close is idempotent and a closed bridge refuses to search.
    bridge.close().await;
    let err = bridge
        .best_move(START_FEN, Duration::from_millis(50))
        .await
        .expect_err("closed bridge");
    assert!(matches!(err, EngineError::Unavailable { .. }));
}

#[tokio::test]
async fn missing_binary_is_unavailable() {
    let config: EngineConfig = toml::from_str(
        r#"
command = "/no/such/engine/binary"
handshake_timeout_ms = 1000
"#,
    )
    .expect("engine config parses");
    let err = EngineBridge::start(&config)
        .await
        .expect_err("spawn must fail");
    assert!(matches!(err, EngineError::Unavailable { .. }));
}

#[tokio::test]
async fn silent_handshake_times_out_as_unavailable() {
    // Shortened handshake budget so the test stays fast.
    let config: EngineConfig = toml::from_str(&format!(
        r#"
command = "sh"
args = ["-c", {MUTE_ENGINE:?}]
handshake_timeout_ms = 200
"#
    ))
    .expect("engine config parses");
    let err = EngineBridge::start(&config)
        .await
        .expect_err("no uciok ever arrives");
    assert!(matches!(err, EngineError::Unavailable { .. }));
}

#[tokio::test]
async fn slow_search_times_out_and_leaves_the_bridge_alive() {
    let config = scripted_config(SLOW_SEARCH_ENGINE);
    let mut bridge = EngineBridge::start(&config).await.expect("handshake");

    let err = bridge
        .best_move(START_FEN, Duration::from_millis(50))
        .await
        .expect_err("search never answers");
    assert!(matches!(err, EngineError::Timeout));

    // The subprocess was not killed; the bridge can still be shut down.
    assert_eq!(bridge.state(), ProtocolState::Ready);
    bridge.close().await;
    assert_eq!(bridge.state(), ProtocolState::Closed);
}

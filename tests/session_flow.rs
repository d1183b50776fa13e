//! Registry-level lifecycle tests with human-only games.

use chatchess::{EngineConfig, GameError, SessionRegistry};
use std::sync::Arc;

fn engine_config() -> EngineConfig {
    toml::from_str("").expect("default engine config")
}

#[tokio::test]
async fn one_session_per_channel() {
    let registry = SessionRegistry::new();
    let config = engine_config();

    let first = registry
        .create("chan", "alice", "bob", None, &config)
        .await
        .expect("first create");
    assert_eq!(registry.len(), 1);

    let err = registry
        .create("chan", "carol", "dave", None, &config)
        .await
        .expect_err("channel is occupied");
    match err {
        GameError::GameAlreadyInProgress { white, black } => {
            assert_eq!(white, "alice");
            assert_eq!(black, "bob");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    // The original session is untouched and still the one on record.
    let found = registry.lookup("chan").expect("session still registered");
    assert!(Arc::ptr_eq(&first, &found));

    // Other channels are unaffected.
    registry
        .create("other", "carol", "dave", None, &config)
        .await
        .expect("separate channel");
    assert_eq!(registry.len(), 2);
}

#[tokio::test]
async fn remove_is_idempotent() {
    let registry = SessionRegistry::new();
    let config = engine_config();
    registry
        .create("chan", "alice", "bob", None, &config)
        .await
        .expect("create");

    registry.remove("chan").await;
    assert!(registry.lookup("chan").is_none());
    assert!(registry.is_empty());

    // A second remove, and a remove for a channel never seen, are no-ops.
    registry.remove("chan").await;
    registry.remove("never-existed").await;
    assert!(registry.is_empty());
}

#[tokio::test]
async fn removed_channel_accepts_a_new_game() {
    let registry = SessionRegistry::new();
    let config = engine_config();
    registry
        .create("chan", "alice", "bob", None, &config)
        .await
        .expect("create");
    registry.remove("chan").await;

    let replacement = registry
        .create("chan", "carol", "dave", None, &config)
        .await
        .expect("channel is free again");
    assert_eq!(replacement.lock().await.white_id(), "carol");
}

#[tokio::test]
async fn full_game_through_the_registry_handle() {
    let registry = SessionRegistry::new();
    let config = engine_config();
    let session = registry
        .create("chan", "alice", "bob", None, &config)
        .await
        .expect("create");

    {
        let mut guard = session.lock().await;
        guard.submit_move("alice", "f3").await.expect("f3");
        guard.submit_move("bob", "e5").await.expect("e5");
        guard.submit_move("alice", "g4").await.expect("g4");
        let report = guard.submit_move("bob", "Qh4#").await.expect("mate");
        assert!(report.is_finished());
    }

    // Teardown is the caller's job; the session never removes itself.
    assert!(registry.lookup("chan").is_some());
    registry.remove("chan").await;
    assert!(registry.lookup("chan").is_none());
}

//! Concurrency-safe channel-to-session registry.
//!
//! The map lives behind a short `std::sync::Mutex` critical section that is
//! never held across an await point. Sessions themselves sit behind a
//! per-session `tokio::sync::Mutex`, so commands for the same channel are
//! serialized while other channels proceed, and an engine search only ever
//! blocks its own game.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, instrument, warn};

use crate::config::EngineConfig;
use crate::engine::EngineBridge;
use crate::error::GameError;
use crate::rules::ShakmatyRules;
use crate::session::Session;

/// Shared handle to one session.
pub type SharedSession = Arc<AsyncMutex<Session>>;

#[derive(Debug)]
struct Entry {
    white_id: String,
    black_id: String,
    session: SharedSession,
}

/// All live sessions, keyed by channel id. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<Mutex<HashMap<String, Entry>>>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new session for a channel.
    ///
    /// When `engine_player` is set, the engine bridge is spawned and
    /// handshaken before anything is registered; a bridge failure fails the
    /// whole creation with nothing to clean up. The occupancy check runs
    /// again at insertion time, so two racing creates cannot both win.
    #[instrument(skip(self, engine_config))]
    pub async fn create(
        &self,
        channel_id: &str,
        white_id: &str,
        black_id: &str,
        engine_player: Option<&str>,
        engine_config: &EngineConfig,
    ) -> Result<SharedSession, GameError> {
        // Fast-path occupancy check before paying for an engine spawn.
        if let Some(err) = self.occupied_error(channel_id) {
            return Err(err);
        }
        let engine = match engine_player {
            Some(_) => Some(EngineBridge::start(engine_config).await?),
            None => None,
        };
        let session = Session::new(
            channel_id,
            white_id,
            black_id,
            Box::new(ShakmatyRules::new()),
            engine,
            engine_player.map(str::to_string),
            engine_config.move_budget(),
        );
        let shared = Arc::new(AsyncMutex::new(session));
        let lost_race = {
            let mut sessions = self.sessions.lock().unwrap();
            if sessions.contains_key(channel_id) {
                true
            } else {
                sessions.insert(
                    channel_id.to_string(),
                    Entry {
                        white_id: white_id.to_string(),
                        black_id: black_id.to_string(),
                        session: Arc::clone(&shared),
                    },
                );
                false
            }
        };
        if lost_race {
            warn!(channel_id, "lost a creation race; discarding the new session");
            shared.lock().await.close_engine().await;
            return Err(self.occupied_error(channel_id).unwrap_or(GameError::Internal));
        }
        info!(channel_id, white_id, black_id, "session registered");
        Ok(shared)
    }

    /// Looks up the session for a channel, if any.
    pub fn lookup(&self, channel_id: &str) -> Option<SharedSession> {
        self.sessions
            .lock()
            .unwrap()
            .get(channel_id)
            .map(|entry| Arc::clone(&entry.session))
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    /// Whether no sessions are live.
    pub fn is_empty(&self) -> bool {
        self.sessions.lock().unwrap().is_empty()
    }

    /// Removes a channel's session and shuts its engine down. Idempotent;
    /// the bridge is closed at most once because only one caller can take
    /// the entry out of the map.
    #[instrument(skip(self))]
    pub async fn remove(&self, channel_id: &str) {
        let entry = self.sessions.lock().unwrap().remove(channel_id);
        match entry {
            Some(entry) => {
                entry.session.lock().await.close_engine().await;
                info!(channel_id, "session removed");
            }
            None => debug!(channel_id, "remove on an empty channel"),
        }
    }

    fn occupied_error(&self, channel_id: &str) -> Option<GameError> {
        self.sessions
            .lock()
            .unwrap()
            .get(channel_id)
            .map(|entry| GameError::GameAlreadyInProgress {
                white: entry.white_id.clone(),
                black: entry.black_id.clone(),
            })
    }
}

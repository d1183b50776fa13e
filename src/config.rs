//! Runtime configuration.
//!
//! Loaded from a TOML file when one exists, with serde defaults covering
//! every field so an empty file (or no file) yields a working setup.

use derive_getters::Getters;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, instrument};

/// Configuration error with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// What went wrong.
    pub message: String,
    /// Line where the error was constructed.
    pub line: u32,
    /// File where the error was constructed.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new config error capturing the caller location.
    #[track_caller]
    pub fn new(message: String) -> Self {
        let location = std::panic::Location::caller();
        Self {
            message,
            line: location.line(),
            file: location.file(),
        }
    }
}

/// Settings for the bot as a whole.
#[derive(Debug, Clone, Getters, Serialize, Deserialize)]
pub struct ChessConfig {
    /// Prefix that marks a message as a command, e.g. `!`.
    #[serde(default = "default_command_prefix")]
    command_prefix: String,
    /// Channels whose name starts with this prefix may host games.
    #[serde(default = "default_channel_prefix")]
    channel_prefix: String,
    /// Opaque `guild:role` tokens whose holders may cancel any game.
    #[serde(default)]
    admin_tokens: Vec<String>,
    /// User id the chat platform assigns to this bot. Mentioning it as a
    /// player seats the engine on that side.
    #[serde(default)]
    bot_user_id: Option<String>,
    /// Engine subprocess settings.
    #[serde(default)]
    engine: EngineConfig,
}

/// Settings for the out-of-process opponent.
#[derive(Debug, Clone, Getters, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Executable to spawn.
    #[serde(default = "default_engine_command")]
    command: String,
    /// Arguments passed to the executable.
    #[serde(default)]
    args: Vec<String>,
    /// Budget handed to the engine per search, in milliseconds.
    #[serde(default = "default_move_time_ms")]
    move_time_ms: u64,
    /// How long the startup handshake may take, in milliseconds.
    #[serde(default = "default_handshake_timeout_ms")]
    handshake_timeout_ms: u64,
    /// Extra wall-clock slack granted on top of the search budget before a
    /// search counts as timed out, in milliseconds.
    #[serde(default = "default_search_grace_ms")]
    search_grace_ms: u64,
}

fn default_command_prefix() -> String {
    "!".to_string()
}

fn default_channel_prefix() -> String {
    "chess".to_string()
}

fn default_engine_command() -> String {
    "stockfish".to_string()
}

fn default_move_time_ms() -> u64 {
    100
}

fn default_handshake_timeout_ms() -> u64 {
    5_000
}

fn default_search_grace_ms() -> u64 {
    1_000
}

impl Default for ChessConfig {
    fn default() -> Self {
        Self {
            command_prefix: default_command_prefix(),
            channel_prefix: default_channel_prefix(),
            admin_tokens: Vec::new(),
            bot_user_id: None,
            engine: EngineConfig::default(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command: default_engine_command(),
            args: Vec::new(),
            move_time_ms: default_move_time_ms(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
            search_grace_ms: default_search_grace_ms(),
        }
    }
}

impl ChessConfig {
    /// Loads configuration from a TOML file.
    #[instrument]
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::new(format!("failed to read {}: {e}", path.display()))
        })?;
        let config: Self = toml::from_str(&raw).map_err(|e| {
            ConfigError::new(format!("failed to parse {}: {e}", path.display()))
        })?;
        debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Whether games may be started in a channel with this name.
    pub fn is_game_channel(&self, channel_name: &str) -> bool {
        channel_name.starts_with(&self.channel_prefix)
    }

    /// Whether any of the author's roles in this guild grants cancellation
    /// rights. Tokens are matched as opaque `guild:role` strings.
    pub fn is_admin(&self, guild_id: &str, roles: &[String]) -> bool {
        roles
            .iter()
            .map(|role| format!("{guild_id}:{role}"))
            .any(|token| self.admin_tokens.contains(&token))
    }
}

impl EngineConfig {
    /// Per-search budget as a duration.
    pub fn move_budget(&self) -> Duration {
        Duration::from_millis(self.move_time_ms)
    }

    /// Handshake timeout as a duration.
    pub fn handshake_budget(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    /// Slack granted on top of the search budget.
    pub fn search_grace(&self) -> Duration {
        Duration::from_millis(self.search_grace_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_toml_yields_defaults() {
        let config: ChessConfig = toml::from_str("").expect("empty config parses");
        assert_eq!(config.command_prefix(), "!");
        assert_eq!(config.channel_prefix(), "chess");
        assert_eq!(config.engine().command(), "stockfish");
        assert_eq!(config.engine().move_budget(), Duration::from_millis(100));
    }

    #[test]
    fn file_round_trip() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            r#"
command_prefix = "?"
admin_tokens = ["g1:mods"]
bot_user_id = "bot42"

[engine]
command = "/usr/games/stockfish"
move_time_ms = 250
"#
        )
        .expect("write config");
        let config = ChessConfig::from_file(file.path()).expect("config loads");
        assert_eq!(config.command_prefix(), "?");
        assert_eq!(config.bot_user_id().as_deref(), Some("bot42"));
        assert_eq!(config.engine().command(), "/usr/games/stockfish");
        assert_eq!(config.engine().move_budget(), Duration::from_millis(250));
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = ChessConfig::from_file(Path::new("/no/such/config.toml"))
            .expect_err("missing file fails");
        assert!(err.message.contains("failed to read"));
    }

    #[test]
    fn admin_tokens_are_scoped_to_the_guild() {
        let config: ChessConfig =
            toml::from_str(r#"admin_tokens = ["g1:mods"]"#).expect("config parses");
        assert!(config.is_admin("g1", &["mods".into(), "chess".into()]));
        assert!(!config.is_admin("g2", &["mods".into()]));
        assert!(!config.is_admin("g1", &["plebs".into()]));
    }

    #[test]
    fn channel_prefix_gates_the_venue() {
        let config = ChessConfig::default();
        assert!(config.is_game_channel("chess"));
        assert!(config.is_game_channel("chess-blitz"));
        assert!(!config.is_game_channel("general"));
    }
}

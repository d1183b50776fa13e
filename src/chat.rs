//! Chat-platform boundary.
//!
//! The core never talks to a real chat service; it sees inbound traffic as
//! [`ChatEvent`] values and replies through the [`ChatPort`] trait. The HTTP
//! gateway provides one implementation; tests provide recording fakes.

use async_trait::async_trait;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};

/// An inbound chat message, already stripped of platform detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatEvent {
    /// Platform id of the message, used for reaction markers.
    pub message_id: String,
    /// Channel the message was posted in; doubles as the session key.
    pub channel_id: String,
    /// Human-readable channel name, checked against the venue rule.
    pub channel_name: String,
    /// Organization (guild/server/workspace) the channel belongs to.
    pub guild_id: String,
    /// Author of the message.
    pub author_id: String,
    /// Roles the author holds in the guild.
    #[serde(default)]
    pub author_roles: Vec<String>,
    /// User ids mentioned in the message, in order of appearance.
    #[serde(default)]
    pub mentions: Vec<String>,
    /// Raw message text.
    pub content: String,
}

/// Lightweight acknowledgement attached to the triggering message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Marker {
    /// The command was accepted.
    Accepted,
    /// The command was rejected.
    Rejected,
}

/// Per-side line of a game summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideSummary {
    /// Participant id.
    pub player_id: String,
    /// "Win", "Lose" or "Draw".
    pub status: String,
}

/// Structured game-over card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSummaryCard {
    /// Card title.
    pub title: String,
    /// How the game ended.
    pub method: String,
    /// Winning participant, if the game was decisive.
    pub winner_id: Option<String>,
    /// White's line.
    pub white: SideSummary,
    /// Black's line.
    pub black: SideSummary,
    /// Numbered movetext with the final score.
    pub movetext: String,
}

/// Failure delivering an outbound action.
#[derive(Debug, Display, Error)]
#[display("chat transport error: {message}")]
pub struct ChatError {
    /// Transport-level detail, for the log only.
    pub message: String,
}

impl ChatError {
    /// Wraps a transport failure message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The outbound primitives the core relies on.
#[async_trait]
pub trait ChatPort: Send + Sync {
    /// Posts plain text to a channel.
    async fn send_text(&self, channel_id: &str, text: &str) -> Result<(), ChatError>;

    /// Posts a file attachment to a channel.
    async fn send_file(
        &self,
        channel_id: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<(), ChatError>;

    /// Attaches an acknowledgement marker to a message.
    async fn react(
        &self,
        channel_id: &str,
        message_id: &str,
        marker: Marker,
    ) -> Result<(), ChatError>;

    /// Posts a structured game summary.
    async fn send_card(&self, channel_id: &str, card: &GameSummaryCard) -> Result<(), ChatError>;
}

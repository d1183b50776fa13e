//! HTTP adapter for chat events.
//!
//! A platform connector POSTs each inbound message as JSON; the response
//! body carries the outbound actions the connector should perform. This
//! keeps the crate free of any real chat-platform protocol while exercising
//! the full command path.

use async_trait::async_trait;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::chat::{ChatError, ChatEvent, ChatPort, GameSummaryCard, Marker};
use crate::router::CommandRouter;

/// One outbound action the connector should perform, in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutboundAction {
    /// Post plain text.
    Text {
        /// Message body.
        content: String,
    },
    /// Post a file attachment.
    File {
        /// Attachment filename.
        filename: String,
        /// File bytes, base64 encoded for the JSON body.
        content_base64: String,
    },
    /// Attach a marker to the triggering message.
    Reaction {
        /// Message to mark.
        message_id: String,
        /// Which marker.
        marker: Marker,
    },
    /// Post a structured game summary.
    Card {
        /// The summary.
        card: GameSummaryCard,
    },
}

/// Response body for one processed event.
#[derive(Debug, Serialize, Deserialize)]
pub struct EventResponse {
    /// Actions to perform, in order.
    pub actions: Vec<OutboundAction>,
}

/// ChatPort that records actions for the HTTP response.
#[derive(Default)]
struct CollectingChat {
    actions: Mutex<Vec<OutboundAction>>,
}

impl CollectingChat {
    fn push(&self, action: OutboundAction) {
        if let Ok(mut actions) = self.actions.lock() {
            actions.push(action);
        }
    }

    fn into_actions(self) -> Vec<OutboundAction> {
        self.actions.into_inner().unwrap_or_default()
    }
}

#[async_trait]
impl ChatPort for CollectingChat {
    async fn send_text(&self, _channel_id: &str, text: &str) -> Result<(), ChatError> {
        self.push(OutboundAction::Text {
            content: text.to_string(),
        });
        Ok(())
    }

    async fn send_file(
        &self,
        _channel_id: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<(), ChatError> {
        self.push(OutboundAction::File {
            filename: filename.to_string(),
            content_base64: BASE64.encode(bytes),
        });
        Ok(())
    }

    async fn react(
        &self,
        _channel_id: &str,
        message_id: &str,
        marker: Marker,
    ) -> Result<(), ChatError> {
        self.push(OutboundAction::Reaction {
            message_id: message_id.to_string(),
            marker,
        });
        Ok(())
    }

    async fn send_card(&self, _channel_id: &str, card: &GameSummaryCard) -> Result<(), ChatError> {
        self.push(OutboundAction::Card { card: card.clone() });
        Ok(())
    }
}

#[derive(Clone)]
struct GatewayState {
    router: Arc<CommandRouter>,
}

/// Builds the axum application. Exposed separately from [`serve`] so tests
/// can drive it without binding a socket.
pub fn app(router: CommandRouter) -> Router {
    let state = GatewayState {
        router: Arc::new(router),
    };
    Router::new()
        .route("/health", get(health))
        .route("/events", post(handle_event))
        .with_state(state)
}

/// Binds and serves the gateway until the process exits.
#[instrument(skip(router))]
pub async fn serve(router: CommandRouter, host: &str, port: u16) -> anyhow::Result<()> {
    let listener = TcpListener::bind(format!("{host}:{port}")).await?;
    info!(host, port, "gateway listening");
    axum::serve(listener, app(router)).await?;
    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

async fn handle_event(
    State(state): State<GatewayState>,
    Json(event): Json<ChatEvent>,
) -> Json<EventResponse> {
    let chat = CollectingChat::default();
    state.router.handle(&chat, event).await;
    Json(EventResponse {
        actions: chat.into_actions(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn collecting_chat_records_actions_in_order() {
        let chat = CollectingChat::default();
        chat.send_text("c1", "hello").await.expect("text");
        chat.react("c1", "m1", Marker::Accepted).await.expect("react");
        chat.send_file("c1", "board.png", vec![1, 2, 3])
            .await
            .expect("file");
        let actions = chat.into_actions();
        assert_eq!(actions.len(), 3);
        assert!(matches!(&actions[0], OutboundAction::Text { content } if content == "hello"));
        assert!(matches!(
            &actions[1],
            OutboundAction::Reaction {
                message_id,
                marker: Marker::Accepted,
            } if message_id == "m1"
        ));
        match &actions[2] {
            OutboundAction::File {
                filename,
                content_base64,
            } => {
                assert_eq!(filename, "board.png");
                assert_eq!(content_base64, &BASE64.encode([1u8, 2, 3]));
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }
}

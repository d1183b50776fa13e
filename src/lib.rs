//! Chatchess library - chess games in shared chat channels
//!
//! Players conduct a full chess game inside a shared channel, optionally
//! against an out-of-process UCI engine.
//!
//! # Architecture
//!
//! - **Registry**: one live session per channel, behind a shared map
//! - **Session**: the turn/command state machine (moves, draw handshake,
//!   resignation, privileged cancellation) and the engine auto-play loop
//! - **Rules**: legality, notation and outcomes delegated to `shakmaty`
//!   through the [`GameRules`] trait
//! - **Engine**: UCI bridge to a subprocess, bounded-time searches
//! - **Router/Gateway**: command parsing and an HTTP adapter for inbound
//!   chat events; outbound traffic goes through the [`ChatPort`] trait
//!
//! # Example
//!
//! ```no_run
//! use chatchess::{ChessConfig, CommandRouter, SessionRegistry};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let router = CommandRouter::new(ChessConfig::default(), SessionRegistry::new());
//! chatchess::serve(router, "127.0.0.1", 3000).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod chat;
mod config;
mod engine;
mod error;
mod gateway;
mod registry;
mod render;
mod router;
mod rules;
mod session;

// Crate-level exports - configuration
pub use config::{ChessConfig, ConfigError, EngineConfig};

// Crate-level exports - error taxonomy
pub use error::GameError;

// Crate-level exports - rules seam
pub use rules::{
    AppliedMove, EndMethod, GameOutcome, GameRules, InvalidMove, LegalMove, MoveListing,
    ShakmatyRules, Side,
};

// Crate-level exports - engine bridge
pub use engine::{EngineBridge, EngineError, ProtocolState};

// Crate-level exports - sessions
pub use session::{
    DrawOfferState, DrawStatus, EngineTrouble, Session, SessionPhase, TurnReport, TurnStatus,
};
pub use registry::{SessionRegistry, SharedSession};

// Crate-level exports - chat boundary
pub use chat::{ChatError, ChatEvent, ChatPort, GameSummaryCard, Marker, SideSummary};

// Crate-level exports - rendering boundary
pub use render::{text_board, BoardRenderer, RenderError, RenderedImage};

// Crate-level exports - dispatch and transport
pub use gateway::{app, serve, EventResponse, OutboundAction};
pub use router::CommandRouter;

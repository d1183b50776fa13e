//! One game bound to one channel.
//!
//! The session is the turn/command state machine: it decides whose input is
//! accepted, runs the draw-offer handshake, and drives the engine through
//! the outcome/auto-play loop. It never removes itself from the registry;
//! finished games are reported to the caller, which tears them down.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use crate::engine::{EngineBridge, EngineError};
use crate::error::GameError;
use crate::rules::{AppliedMove, EndMethod, GameOutcome, GameRules, Side};

/// Upper bound on plies applied by one run of the outcome loop. Roughly
/// twice the longest plausible game; hitting it means the loop is stuck,
/// for example with the bot seated on both sides.
const MAX_AUTO_PLIES: usize = 1000;

/// Standing draw offer, if any. Both-sides-offered is not representable:
/// the second offer finalizes the draw immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawOfferState {
    /// No offer on the table.
    None,
    /// White has offered and awaits Black's answer.
    OfferedByWhite,
    /// Black has offered and awaits White's answer.
    OfferedByBlack,
}

impl DrawOfferState {
    fn offered_by(side: Side) -> Self {
        match side {
            Side::White => DrawOfferState::OfferedByWhite,
            Side::Black => DrawOfferState::OfferedByBlack,
        }
    }

    fn is_offered_by(self, side: Side) -> bool {
        self == Self::offered_by(side)
    }
}

/// Lifecycle phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Waiting for the given side's move.
    AwaitingMove(Side),
    /// A bridge search is in flight.
    AwaitingEngineMove,
    /// Terminal; every further command is rejected.
    Finished(GameOutcome),
}

/// Non-fatal engine problem surfaced alongside an otherwise live game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineTrouble {
    /// The subprocess is gone or misbehaving.
    Unavailable,
    /// The search exceeded its budget.
    TimedOut,
}

/// Where play stands after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnStatus {
    /// The game continues; the named participant is to move.
    AwaitingMove {
        /// Side to move.
        side: Side,
        /// Participant controlling that side.
        player_id: String,
    },
    /// The game is over; the caller must tear the session down.
    Finished {
        /// Terminal result.
        outcome: GameOutcome,
        /// How it ended.
        method: EndMethod,
    },
}

/// What a successful transition did, for reporting.
#[derive(Debug)]
pub struct TurnReport {
    /// Every ply applied during the transition, human and engine alike.
    pub plies: Vec<AppliedMove>,
    /// Where play stands now.
    pub status: TurnStatus,
    /// Engine problem encountered mid-loop, if any. The game stays alive.
    pub engine_trouble: Option<EngineTrouble>,
}

impl TurnReport {
    /// Whether the transition ended the game.
    pub fn is_finished(&self) -> bool {
        matches!(self.status, TurnStatus::Finished { .. })
    }
}

/// Result of a draw offer.
#[derive(Debug)]
pub enum DrawStatus {
    /// First offer recorded; the other participant must answer.
    Pending {
        /// Participant whose acceptance is awaited.
        awaiting: String,
    },
    /// Second distinct offer; the draw is final.
    Agreed(TurnReport),
}

/// A live game in one channel.
#[derive(Debug)]
pub struct Session {
    channel_id: String,
    white_id: String,
    black_id: String,
    created_at: DateTime<Utc>,
    last_move_at: DateTime<Utc>,
    draw_offer: DrawOfferState,
    phase: SessionPhase,
    engine: Option<EngineBridge>,
    engine_player: Option<String>,
    engine_budget: Duration,
    rules: Box<dyn GameRules>,
}

impl Session {
    /// Binds a fresh game to a channel. When an engine bridge is supplied,
    /// `engine_player` names the participant id the bridge plays as.
    #[instrument(skip(rules, engine), fields(engine = engine.is_some()))]
    pub fn new(
        channel_id: &str,
        white_id: &str,
        black_id: &str,
        rules: Box<dyn GameRules>,
        engine: Option<EngineBridge>,
        engine_player: Option<String>,
        engine_budget: Duration,
    ) -> Self {
        let now = Utc::now();
        info!("session created");
        Self {
            channel_id: channel_id.to_string(),
            white_id: white_id.to_string(),
            black_id: black_id.to_string(),
            created_at: now,
            last_move_at: now,
            draw_offer: DrawOfferState::None,
            phase: SessionPhase::AwaitingMove(Side::White),
            engine,
            engine_player,
            engine_budget,
            rules,
        }
    }

    /// Channel this session is bound to.
    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// Participant playing White.
    pub fn white_id(&self) -> &str {
        &self.white_id
    }

    /// Participant playing Black.
    pub fn black_id(&self) -> &str {
        &self.black_id
    }

    /// When the session was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// When the last move was accepted. Kept for staleness eviction.
    pub fn last_move_at(&self) -> DateTime<Utc> {
        self.last_move_at
    }

    /// Standing draw offer.
    pub fn draw_offer(&self) -> DrawOfferState {
        self.draw_offer
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Read access to the rules instance, for boards and summaries.
    pub fn rules(&self) -> &dyn GameRules {
        self.rules.as_ref()
    }

    /// Participant controlling `side`.
    pub fn player_id(&self, side: Side) -> &str {
        match side {
            Side::White => &self.white_id,
            Side::Black => &self.black_id,
        }
    }

    /// Participant whose move is currently awaited.
    pub fn current_player_id(&self) -> &str {
        self.player_id(self.rules.turn())
    }

    fn side_of(&self, actor: &str) -> Option<Side> {
        if actor == self.white_id {
            Some(Side::White)
        } else if actor == self.black_id {
            Some(Side::Black)
        } else {
            None
        }
    }

    fn is_engine_seat(&self, side: Side) -> bool {
        self.engine.is_some() && self.engine_player.as_deref() == Some(self.player_id(side))
    }

    fn ensure_active(&self) -> Result<(), GameError> {
        match self.phase {
            SessionPhase::Finished(_) => Err(GameError::NoActiveGame),
            _ => Ok(()),
        }
    }

    /// Applies a move submitted by `actor`, then runs the outcome loop.
    #[instrument(skip(self, text), fields(channel = %self.channel_id))]
    pub async fn submit_move(&mut self, actor: &str, text: &str) -> Result<TurnReport, GameError> {
        self.ensure_active()?;
        let side = self.rules.turn();
        if actor != self.player_id(side) {
            debug!(actor, "move out of turn");
            return Err(GameError::NotYourTurn);
        }
        let applied = match self.rules.apply_san(text) {
            Ok(applied) => applied,
            Err(invalid) => {
                debug!(%invalid, "move rejected");
                return Err(GameError::IllegalMove {
                    legal: self.rules.legal_moves(),
                });
            }
        };
        info!(san = %applied.san, "move accepted");
        self.draw_offer = DrawOfferState::None;
        self.last_move_at = Utc::now();
        let mut plies = vec![applied];
        let (status, engine_trouble) = self.run_outcome_loop(&mut plies).await?;
        Ok(TurnReport {
            plies,
            status,
            engine_trouble,
        })
    }

    /// Runs the outcome loop without a preceding human move. Called once
    /// right after creation so an engine playing White opens the game.
    #[instrument(skip(self), fields(channel = %self.channel_id))]
    pub async fn advance(&mut self) -> Result<TurnReport, GameError> {
        self.ensure_active()?;
        let mut plies = Vec::new();
        let (status, engine_trouble) = self.run_outcome_loop(&mut plies).await?;
        Ok(TurnReport {
            plies,
            status,
            engine_trouble,
        })
    }

    /// Records a draw offer from `actor`. The second distinct offer
    /// finalizes the draw; repeating one's own offer stays pending.
    #[instrument(skip(self), fields(channel = %self.channel_id))]
    pub fn offer_draw(&mut self, actor: &str) -> Result<DrawStatus, GameError> {
        self.ensure_active()?;
        let side = self
            .side_of(actor)
            .ok_or(GameError::InsufficientPermission)?;
        if self.draw_offer.is_offered_by(side.other()) {
            info!("draw agreed");
            self.rules.declare_draw(EndMethod::DrawAgreement);
            return Ok(DrawStatus::Agreed(self.finish(EndMethod::DrawAgreement)));
        }
        self.draw_offer = DrawOfferState::offered_by(side);
        let awaiting = self.player_id(side.other()).to_string();
        debug!(%side, "draw offer pending");
        Ok(DrawStatus::Pending { awaiting })
    }

    /// Resigns the game for the side `actor` controls. Only the side to
    /// move may resign; the opposing side is credited with the win.
    #[instrument(skip(self), fields(channel = %self.channel_id))]
    pub fn resign(&mut self, actor: &str) -> Result<TurnReport, GameError> {
        self.ensure_active()?;
        let side = self.rules.turn();
        if actor != self.player_id(side) {
            return Err(GameError::NotYourTurn);
        }
        info!(%side, "resignation");
        self.rules.resign(side);
        Ok(self.finish(EndMethod::Resignation))
    }

    /// Ends the game without a winner. The router decides privilege; an
    /// unprivileged call changes nothing.
    #[instrument(skip(self), fields(channel = %self.channel_id))]
    pub fn cancel(&mut self, has_privilege: bool) -> Result<TurnReport, GameError> {
        self.ensure_active()?;
        if !has_privilege {
            warn!("cancellation without privilege");
            return Err(GameError::InsufficientPermission);
        }
        info!("game cancelled");
        self.rules.declare_draw(EndMethod::Cancellation);
        Ok(self.finish(EndMethod::Cancellation))
    }

    /// Shuts down the engine bridge, if one is attached. Idempotent.
    pub async fn close_engine(&mut self) {
        if let Some(engine) = self.engine.as_mut() {
            engine.close().await;
        }
    }

    fn finish(&mut self, fallback: EndMethod) -> TurnReport {
        self.draw_offer = DrawOfferState::None;
        let outcome = self.rules.outcome().unwrap_or(GameOutcome::Drawn);
        let method = self.rules.method().unwrap_or(fallback);
        self.phase = SessionPhase::Finished(outcome);
        TurnReport {
            plies: Vec::new(),
            status: TurnStatus::Finished { outcome, method },
            engine_trouble: None,
        }
    }

    /// Evaluates the outcome and plays engine moves until a human is to
    /// move or the game ends. Bounded by [`MAX_AUTO_PLIES`].
    async fn run_outcome_loop(
        &mut self,
        plies: &mut Vec<AppliedMove>,
    ) -> Result<(TurnStatus, Option<EngineTrouble>), GameError> {
        for _ in 0..MAX_AUTO_PLIES {
            if let Some(outcome) = self.rules.outcome() {
                let method = match self.rules.method() {
                    Some(method) => method,
                    None => {
                        error!("finished game reported no end method");
                        return Err(GameError::Internal);
                    }
                };
                self.phase = SessionPhase::Finished(outcome);
                info!(?outcome, %method, "game over");
                return Ok((TurnStatus::Finished { outcome, method }, None));
            }
            let side = self.rules.turn();
            if !self.is_engine_seat(side) {
                self.phase = SessionPhase::AwaitingMove(side);
                return Ok((
                    TurnStatus::AwaitingMove {
                        side,
                        player_id: self.player_id(side).to_string(),
                    },
                    None,
                ));
            }

            self.phase = SessionPhase::AwaitingEngineMove;
            let fen = self.rules.fen();
            let budget = self.engine_budget;
            let Some(engine) = self.engine.as_mut() else {
                error!("engine seat without a bridge");
                return Err(GameError::Internal);
            };
            let trouble = match engine.best_move(&fen, budget).await {
                Ok(uci) => match self.rules.apply_uci(&uci) {
                    Ok(applied) => {
                        debug!(san = %applied.san, "engine move applied");
                        self.draw_offer = DrawOfferState::None;
                        self.last_move_at = Utc::now();
                        plies.push(applied);
                        continue;
                    }
                    Err(invalid) => {
                        warn!(%invalid, "engine produced an illegal move");
                        EngineTrouble::Unavailable
                    }
                },
                Err(EngineError::Timeout) => {
                    warn!("engine search timed out");
                    EngineTrouble::TimedOut
                }
                Err(EngineError::Unavailable { reason }) => {
                    warn!(reason = %reason, "engine unavailable mid-game");
                    EngineTrouble::Unavailable
                }
            };
            // The game stays alive; the engine's seat keeps the turn and a
            // later command retries the search.
            self.phase = SessionPhase::AwaitingMove(side);
            return Ok((
                TurnStatus::AwaitingMove {
                    side,
                    player_id: self.player_id(side).to_string(),
                },
                Some(trouble),
            ));
        }
        error!("auto-play loop exceeded its ply cap");
        Err(GameError::Internal)
    }
}

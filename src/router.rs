//! Turns inbound chat text into game commands and reports the results.
//!
//! The router owns the policy that is not the session's business: command
//! parsing, the venue rule, privilege, acknowledgement markers, board
//! posting with its text fallback, and teardown of finished games.

use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use crate::chat::{ChatError, ChatEvent, ChatPort, GameSummaryCard, Marker, SideSummary};
use crate::config::ChessConfig;
use crate::error::GameError;
use crate::registry::{SessionRegistry, SharedSession};
use crate::render::{text_board, BoardRenderer};
use crate::rules::GameOutcome;
use crate::session::{DrawStatus, EngineTrouble, TurnReport, TurnStatus};

/// FEN of the standard starting position, the first frame of any replay.
const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// A classified inbound command.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Intent {
    Help,
    Play,
    Move(Option<String>),
    Board,
    Draw,
    Resign,
    Cancel,
    Replay,
    Say(String),
}

enum Failure {
    Game(GameError),
    Chat(ChatError),
}

impl From<GameError> for Failure {
    fn from(err: GameError) -> Self {
        Failure::Game(err)
    }
}

impl From<ChatError> for Failure {
    fn from(err: ChatError) -> Self {
        Failure::Chat(err)
    }
}

/// Stateless-per-event command dispatcher. Cheap to share behind an `Arc`.
pub struct CommandRouter {
    config: ChessConfig,
    registry: SessionRegistry,
    renderer: Option<Arc<dyn BoardRenderer>>,
}

impl CommandRouter {
    /// Builds a router with no renderer wired in; boards fall back to text.
    pub fn new(config: ChessConfig, registry: SessionRegistry) -> Self {
        Self {
            config,
            registry,
            renderer: None,
        }
    }

    /// Attaches a board renderer.
    pub fn with_renderer(mut self, renderer: Arc<dyn BoardRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// The registry this router dispatches into.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Entry point for one inbound event. Never returns an error to the
    /// transport: rejections become markers and replies, transport failures
    /// become log lines.
    #[instrument(skip(self, chat, event), fields(channel = %event.channel_id, author = %event.author_id))]
    pub async fn handle(&self, chat: &dyn ChatPort, event: ChatEvent) {
        let Some(intent) = self.classify(&event.content) else {
            return;
        };
        debug!(?intent, "dispatching command");
        match self.dispatch(chat, &event, intent).await {
            Ok(()) => {}
            Err(Failure::Game(err)) => self.report_rejection(chat, &event, err).await,
            Err(Failure::Chat(err)) => error!(error = %err, "chat transport failure"),
        }
    }

    fn classify(&self, content: &str) -> Option<Intent> {
        let rest = content.strip_prefix(self.config.command_prefix())?.trim();
        let (verb, tail) = match rest.split_once(char::is_whitespace) {
            Some((verb, tail)) => (verb, tail.trim()),
            None => (rest, ""),
        };
        let intent = match verb {
            "help" => Intent::Help,
            "play" => Intent::Play,
            "move" => Intent::Move(tail.split_whitespace().next().map(str::to_string)),
            "board" => Intent::Board,
            "draw" => Intent::Draw,
            "resign" => Intent::Resign,
            "cancel" => Intent::Cancel,
            "replay" => Intent::Replay,
            "say" if !tail.is_empty() => Intent::Say(tail.to_string()),
            _ => return None,
        };
        Some(intent)
    }

    async fn dispatch(
        &self,
        chat: &dyn ChatPort,
        event: &ChatEvent,
        intent: Intent,
    ) -> Result<(), Failure> {
        match intent {
            Intent::Help => {
                chat.send_text(&event.channel_id, &self.help_text()).await?;
            }
            Intent::Say(text) => {
                chat.send_text(&event.channel_id, &text).await?;
            }
            Intent::Play => self.start_game(chat, event).await?,
            Intent::Move(arg) => self.make_move(chat, event, arg).await?,
            Intent::Board => self.show_board(chat, event).await?,
            Intent::Draw => self.offer_draw(chat, event).await?,
            Intent::Resign => self.resign(chat, event).await?,
            Intent::Cancel => self.cancel(chat, event).await?,
            Intent::Replay => self.replay(chat, event).await?,
        }
        Ok(())
    }

    fn help_text(&self) -> String {
        let p = self.config.command_prefix();
        format!(
            "`{p}play @white @black` starts a game; mention me as a player to face the engine\n\
             `{p}move e4` plays a move in standard algebraic notation\n\
             `{p}move` lists the legal moves\n\
             `{p}board` shows the current position\n\
             `{p}draw` offers a draw, or accepts the standing offer\n\
             `{p}resign` resigns on your turn\n\
             `{p}cancel` ends the game without a result (admins only)\n\
             `{p}replay` replays the game so far as an animation\n\
             `{p}say ...` makes me repeat something"
        )
    }

    async fn start_game(&self, chat: &dyn ChatPort, event: &ChatEvent) -> Result<(), Failure> {
        if !self.config.is_game_channel(&event.channel_name) {
            return Err(GameError::WrongVenue.into());
        }
        if event.mentions.len() != 2 {
            chat.react(&event.channel_id, &event.message_id, Marker::Rejected)
                .await?;
            chat.send_text(
                &event.channel_id,
                &format!(
                    "Mention both players: `{}play @white @black`",
                    self.config.command_prefix()
                ),
            )
            .await?;
            return Ok(());
        }
        let engine_player = event
            .mentions
            .iter()
            .find(|mention| Some(mention.as_str()) == self.config.bot_user_id().as_deref())
            .map(String::as_str);
        if engine_player.is_some() {
            debug!("seating the engine");
        }
        let session = self
            .registry
            .create(
                &event.channel_id,
                &event.mentions[0],
                &event.mentions[1],
                engine_player,
                self.config.engine(),
            )
            .await?;
        chat.react(&event.channel_id, &event.message_id, Marker::Accepted)
            .await?;
        info!("game started");
        // Run the outcome loop once so an engine playing White opens.
        let report = { session.lock().await.advance().await? };
        self.report_turn(chat, event, &session, report).await
    }

    async fn make_move(
        &self,
        chat: &dyn ChatPort,
        event: &ChatEvent,
        arg: Option<String>,
    ) -> Result<(), Failure> {
        let session = self
            .registry
            .lookup(&event.channel_id)
            .ok_or(GameError::NoActiveGame)?;
        let Some(text) = arg else {
            let listing = {
                let guard = session.lock().await;
                guard.rules().legal_moves()
            };
            chat.send_text(&event.channel_id, &format!("Valid moves:{listing}"))
                .await?;
            return Ok(());
        };
        let report = {
            let mut guard = session.lock().await;
            guard.submit_move(&event.author_id, &text).await?
        };
        chat.react(&event.channel_id, &event.message_id, Marker::Accepted)
            .await?;
        self.report_turn(chat, event, &session, report).await
    }

    async fn show_board(&self, chat: &dyn ChatPort, event: &ChatEvent) -> Result<(), Failure> {
        let session = self
            .registry
            .lookup(&event.channel_id)
            .ok_or(GameError::NoActiveGame)?;
        let (fen, ascii, highlight, current) = {
            let guard = session.lock().await;
            (
                guard.rules().fen(),
                guard.rules().ascii_board(),
                last_move_highlight(guard.rules().history()),
                guard.current_player_id().to_string(),
            )
        };
        self.send_board(chat, &event.channel_id, &fen, &ascii, highlight)
            .await?;
        chat.send_text(&event.channel_id, &format!("<@{current}> to move"))
            .await?;
        Ok(())
    }

    async fn offer_draw(&self, chat: &dyn ChatPort, event: &ChatEvent) -> Result<(), Failure> {
        let session = self
            .registry
            .lookup(&event.channel_id)
            .ok_or(GameError::NoActiveGame)?;
        let status = {
            let mut guard = session.lock().await;
            guard.offer_draw(&event.author_id)?
        };
        chat.react(&event.channel_id, &event.message_id, Marker::Accepted)
            .await?;
        match status {
            DrawStatus::Pending { awaiting } => {
                chat.send_text(
                    &event.channel_id,
                    &format!(
                        "<@{awaiting}> a draw is on offer; send `{}draw` to accept",
                        self.config.command_prefix()
                    ),
                )
                .await?;
                Ok(())
            }
            DrawStatus::Agreed(report) => self.report_turn(chat, event, &session, report).await,
        }
    }

    async fn resign(&self, chat: &dyn ChatPort, event: &ChatEvent) -> Result<(), Failure> {
        let session = self
            .registry
            .lookup(&event.channel_id)
            .ok_or(GameError::NoActiveGame)?;
        let report = {
            let mut guard = session.lock().await;
            guard.resign(&event.author_id)?
        };
        chat.react(&event.channel_id, &event.message_id, Marker::Accepted)
            .await?;
        self.report_turn(chat, event, &session, report).await
    }

    async fn cancel(&self, chat: &dyn ChatPort, event: &ChatEvent) -> Result<(), Failure> {
        let session = self
            .registry
            .lookup(&event.channel_id)
            .ok_or(GameError::NoActiveGame)?;
        let privileged = self.config.is_admin(&event.guild_id, &event.author_roles);
        let report = {
            let mut guard = session.lock().await;
            guard.cancel(privileged)?
        };
        chat.react(&event.channel_id, &event.message_id, Marker::Accepted)
            .await?;
        self.report_turn(chat, event, &session, report).await
    }

    async fn replay(&self, chat: &dyn ChatPort, event: &ChatEvent) -> Result<(), Failure> {
        let session = self
            .registry
            .lookup(&event.channel_id)
            .ok_or(GameError::NoActiveGame)?;
        let (fens, movetext) = {
            let guard = session.lock().await;
            (replay_frames(guard.rules().history()), guard.rules().movetext())
        };
        if let Some(renderer) = &self.renderer {
            match renderer.render_sequence(&fens) {
                Ok(image) => {
                    chat.send_file(&event.channel_id, &image.filename, image.bytes)
                        .await?;
                    return Ok(());
                }
                Err(err) => warn!(error = %err, "replay render failed; sending movetext"),
            }
        }
        chat.send_text(&event.channel_id, &movetext).await?;
        Ok(())
    }

    /// Posts the board, any engine trouble, and either the turn prompt or
    /// the full game-over sequence (card, replay, registry teardown).
    async fn report_turn(
        &self,
        chat: &dyn ChatPort,
        event: &ChatEvent,
        session: &SharedSession,
        report: TurnReport,
    ) -> Result<(), Failure> {
        let (fen, ascii, highlight) = {
            let guard = session.lock().await;
            (
                guard.rules().fen(),
                guard.rules().ascii_board(),
                last_move_highlight(guard.rules().history()),
            )
        };
        self.send_board(chat, &event.channel_id, &fen, &ascii, highlight)
            .await?;
        if let Some(trouble) = report.engine_trouble {
            let notice = match trouble {
                EngineTrouble::Unavailable => GameError::EngineUnavailable.to_string(),
                EngineTrouble::TimedOut => GameError::EngineTimeout.to_string(),
            };
            chat.send_text(&event.channel_id, &notice).await?;
        }
        match report.status {
            TurnStatus::AwaitingMove { player_id, .. } => {
                chat.send_text(&event.channel_id, &format!("<@{player_id}> your turn!"))
                    .await?;
                Ok(())
            }
            TurnStatus::Finished { outcome, method } => {
                self.finish_game(chat, event, session, outcome, method.to_string())
                    .await;
                Ok(())
            }
        }
    }

    /// Game-over reporting is best effort: the session comes out of the
    /// registry even when the card or the animation cannot be delivered.
    async fn finish_game(
        &self,
        chat: &dyn ChatPort,
        event: &ChatEvent,
        session: &SharedSession,
        outcome: GameOutcome,
        method: String,
    ) {
        let (card, fens) = {
            let guard = session.lock().await;
            let (white_status, black_status) = match outcome {
                GameOutcome::WhiteWon => ("Win", "Lose"),
                GameOutcome::BlackWon => ("Lose", "Win"),
                GameOutcome::Drawn => ("Draw", "Draw"),
            };
            let card = GameSummaryCard {
                title: "Game over!".to_string(),
                method,
                winner_id: outcome
                    .winner()
                    .map(|side| guard.player_id(side).to_string()),
                white: SideSummary {
                    player_id: guard.white_id().to_string(),
                    status: white_status.to_string(),
                },
                black: SideSummary {
                    player_id: guard.black_id().to_string(),
                    status: black_status.to_string(),
                },
                movetext: guard.rules().movetext(),
            };
            (card, replay_frames(guard.rules().history()))
        };
        if let Err(err) = chat.send_card(&event.channel_id, &card).await {
            error!(error = %err, "failed to deliver the game summary");
        }
        if let Some(renderer) = &self.renderer {
            match renderer.render_sequence(&fens) {
                Ok(image) => {
                    if let Err(err) = chat
                        .send_file(&event.channel_id, &image.filename, image.bytes)
                        .await
                    {
                        error!(error = %err, "failed to deliver the replay animation");
                    }
                }
                Err(err) => debug!(error = %err, "no replay animation for this game"),
            }
        }
        self.registry.remove(&event.channel_id).await;
    }

    async fn send_board(
        &self,
        chat: &dyn ChatPort,
        channel_id: &str,
        fen: &str,
        ascii: &str,
        highlight: Option<(String, String)>,
    ) -> Result<(), Failure> {
        if let Some(renderer) = &self.renderer {
            let squares = highlight
                .as_ref()
                .map(|(from, to)| (from.as_str(), to.as_str()));
            match renderer.render(fen, squares) {
                Ok(image) => {
                    chat.send_file(channel_id, &image.filename, image.bytes)
                        .await?;
                    return Ok(());
                }
                Err(err) => warn!(error = %err, "board render failed; falling back to text"),
            }
        }
        chat.send_text(channel_id, &text_board(ascii)).await?;
        Ok(())
    }

    async fn report_rejection(&self, chat: &dyn ChatPort, event: &ChatEvent, err: GameError) {
        info!(error = %err, "command rejected");
        if let Err(mark_err) = chat
            .react(&event.channel_id, &event.message_id, Marker::Rejected)
            .await
        {
            error!(error = %mark_err, "failed to mark the rejection");
        }
        if err.is_silent() {
            return;
        }
        if let Err(send_err) = chat.send_text(&event.channel_id, &err.to_string()).await {
            error!(error = %send_err, "failed to deliver the rejection reply");
        }
    }
}

fn last_move_highlight(history: &[crate::rules::AppliedMove]) -> Option<(String, String)> {
    history.last().and_then(|mv| {
        mv.from
            .as_ref()
            .map(|from| (from.clone(), mv.to.clone()))
    })
}

fn replay_frames(history: &[crate::rules::AppliedMove]) -> Vec<String> {
    let mut fens = Vec::with_capacity(history.len() + 1);
    fens.push(START_FEN.to_string());
    fens.extend(history.iter().map(|mv| mv.fen_after.clone()));
    fens
}

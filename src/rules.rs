//! Narrow interface to the chess-rules collaborator.
//!
//! Sessions own a rules instance behind the [`GameRules`] trait (composition,
//! never inheritance) so the implementation can be swapped or mocked in
//! tests. The shipped adapter, [`ShakmatyRules`], delegates move legality,
//! notation and outcome detection to the `shakmaty` crate; resignations,
//! agreed draws and cancellations are adjudicated results layered on top.

use derive_more::{Display, Error};
use shakmaty::fen::Fen;
use shakmaty::san::{San, SanPlus};
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, Color, EnPassantMode, File, Outcome, Position, Rank, Square};
use std::fmt;
use tracing::instrument;

/// The two sides of the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Side {
    /// The side that moves first.
    #[display("white")]
    White,
    /// The side that moves second.
    #[display("black")]
    Black,
}

impl Side {
    /// Returns the opposing side.
    pub fn other(self) -> Self {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }
}

impl From<Color> for Side {
    fn from(color: Color) -> Self {
        match color {
            Color::White => Side::White,
            Color::Black => Side::Black,
        }
    }
}

/// Terminal result of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameOutcome {
    /// White won.
    WhiteWon,
    /// Black won.
    BlackWon,
    /// Neither side won.
    Drawn,
}

impl GameOutcome {
    /// The winning side, if the game was decisive.
    pub fn winner(self) -> Option<Side> {
        match self {
            GameOutcome::WhiteWon => Some(Side::White),
            GameOutcome::BlackWon => Some(Side::Black),
            GameOutcome::Drawn => None,
        }
    }

    /// Conventional score string for game summaries.
    pub fn score(self) -> &'static str {
        match self {
            GameOutcome::WhiteWon => "1-0",
            GameOutcome::BlackWon => "0-1",
            GameOutcome::Drawn => "1/2-1/2",
        }
    }

    /// The outcome in which `side` wins.
    pub fn win_for(side: Side) -> Self {
        match side {
            Side::White => GameOutcome::WhiteWon,
            Side::Black => GameOutcome::BlackWon,
        }
    }
}

/// Textual reason a game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum EndMethod {
    /// The side to move has no legal reply to a check.
    #[display("checkmate")]
    Checkmate,
    /// The side to move has no legal move but is not in check.
    #[display("stalemate")]
    Stalemate,
    /// Neither side retains mating material.
    #[display("insufficient material")]
    InsufficientMaterial,
    /// The side to move gave up.
    #[display("resignation")]
    Resignation,
    /// Both participants offered or accepted a draw.
    #[display("draw by agreement")]
    DrawAgreement,
    /// An administrator ended the game.
    #[display("cancellation")]
    Cancellation,
}

/// One accepted move, carrying everything reporting needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMove {
    /// Standard algebraic notation, with check/mate suffix.
    pub san: String,
    /// Long algebraic (UCI) notation.
    pub uci: String,
    /// Origin square name, when the move has one.
    pub from: Option<String>,
    /// Destination square name.
    pub to: String,
    /// FEN of the position after the move, usable as a rendering key.
    pub fen_after: String,
}

/// A currently legal move and the piece that makes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegalMove {
    /// Upper-case letter of the moving piece.
    pub piece: char,
    /// The move in standard algebraic notation.
    pub san: String,
    from_index: u32,
}

/// Legal moves grouped by moving piece, in board order.
///
/// `Display` renders the code-block listing shown to players after an
/// illegal or empty move command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveListing(Vec<LegalMove>);

impl MoveListing {
    /// Builds a listing, sorting by origin square so pieces group naturally.
    pub fn new(mut moves: Vec<LegalMove>) -> Self {
        moves.sort_by(|a, b| {
            (a.piece, a.from_index, &a.san).cmp(&(b.piece, b.from_index, &b.san))
        });
        Self(moves)
    }

    /// Number of legal moves in the listing.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the side to move has no legal moves at all.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for MoveListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n```")?;
        let mut last_piece = None;
        for mv in &self.0 {
            if last_piece != Some(mv.piece) {
                if last_piece.is_some() {
                    writeln!(f)?;
                }
                write!(f, "{} -", mv.piece)?;
                last_piece = Some(mv.piece);
            }
            write!(f, " {}", mv.san)?;
        }
        write!(f, "\n```")
    }
}

/// A move the rules collaborator refused to apply.
#[derive(Debug, Clone, Display, Error)]
#[display("move '{text}' is not legal in this position")]
pub struct InvalidMove {
    /// The rejected move text.
    pub text: String,
}

/// What the session needs from a rules engine, and nothing more.
///
/// Legality, notation and automatic outcome detection belong to the
/// implementation; the session layers turn ownership, draw handshakes and
/// privileges on top.
pub trait GameRules: Send + fmt::Debug {
    /// The side whose move is currently legal.
    fn turn(&self) -> Side;

    /// Applies a move given in standard algebraic notation.
    fn apply_san(&mut self, text: &str) -> Result<AppliedMove, InvalidMove>;

    /// Applies a move given in long algebraic (UCI) notation.
    fn apply_uci(&mut self, text: &str) -> Result<AppliedMove, InvalidMove>;

    /// All currently legal moves, grouped for diagnostics.
    fn legal_moves(&self) -> MoveListing;

    /// Terminal result, if the game has ended.
    fn outcome(&self) -> Option<GameOutcome>;

    /// Reason the game ended; `Some` whenever [`GameRules::outcome`] is.
    fn method(&self) -> Option<EndMethod>;

    /// Records a drawn result reached outside the rules themselves
    /// (agreement or cancellation).
    fn declare_draw(&mut self, method: EndMethod);

    /// Records a resignation by `side`, crediting the opposing side.
    fn resign(&mut self, side: Side);

    /// FEN of the current position, usable as a rendering key.
    fn fen(&self) -> String;

    /// Monospace diagram of the current position for the text fallback.
    fn ascii_board(&self) -> String;

    /// Every move accepted so far, in order.
    fn history(&self) -> &[AppliedMove];

    /// Numbered movetext plus the score marker, for game summaries.
    fn movetext(&self) -> String;
}

/// Rules adapter backed by `shakmaty`.
#[derive(Debug)]
pub struct ShakmatyRules {
    pos: Chess,
    history: Vec<AppliedMove>,
    adjudged: Option<(GameOutcome, EndMethod)>,
}

impl ShakmatyRules {
    /// Starts a game from the standard initial position.
    #[instrument]
    pub fn new() -> Self {
        Self {
            pos: Chess::default(),
            history: Vec::new(),
            adjudged: None,
        }
    }

    fn record(&mut self, mv: shakmaty::Move, text: &str) -> Result<AppliedMove, InvalidMove> {
        if self.adjudged.is_some() {
            return Err(InvalidMove {
                text: text.to_string(),
            });
        }
        let uci = mv.to_uci(CastlingMode::Standard).to_string();
        let from = mv.from().map(|sq| sq.to_string());
        let to = mv.to().to_string();
        let san = SanPlus::from_move_and_play_unchecked(&mut self.pos, &mv).to_string();
        let applied = AppliedMove {
            san,
            uci,
            from,
            to,
            fen_after: fen_of(&self.pos),
        };
        self.history.push(applied.clone());
        Ok(applied)
    }
}

impl Default for ShakmatyRules {
    fn default() -> Self {
        Self::new()
    }
}

fn fen_of(pos: &Chess) -> String {
    Fen::from_position(pos.clone(), EnPassantMode::Legal).to_string()
}

impl GameRules for ShakmatyRules {
    fn turn(&self) -> Side {
        self.pos.turn().into()
    }

    fn apply_san(&mut self, text: &str) -> Result<AppliedMove, InvalidMove> {
        let mv = text
            .parse::<San>()
            .ok()
            .and_then(|san| san.to_move(&self.pos).ok())
            .ok_or_else(|| InvalidMove {
                text: text.to_string(),
            })?;
        self.record(mv, text)
    }

    fn apply_uci(&mut self, text: &str) -> Result<AppliedMove, InvalidMove> {
        let mv = text
            .parse::<UciMove>()
            .ok()
            .and_then(|uci| uci.to_move(&self.pos).ok())
            .ok_or_else(|| InvalidMove {
                text: text.to_string(),
            })?;
        self.record(mv, text)
    }

    fn legal_moves(&self) -> MoveListing {
        let moves = self
            .pos
            .legal_moves()
            .into_iter()
            .map(|mv| {
                let mut scratch = self.pos.clone();
                let san = SanPlus::from_move_and_play_unchecked(&mut scratch, &mv).to_string();
                LegalMove {
                    piece: mv.role().upper_char(),
                    san,
                    from_index: mv.from().map(u32::from).unwrap_or(64),
                }
            })
            .collect();
        MoveListing::new(moves)
    }

    fn outcome(&self) -> Option<GameOutcome> {
        if let Some((outcome, _)) = self.adjudged {
            return Some(outcome);
        }
        self.pos.outcome().map(|outcome| match outcome {
            Outcome::Decisive {
                winner: Color::White,
            } => GameOutcome::WhiteWon,
            Outcome::Decisive {
                winner: Color::Black,
            } => GameOutcome::BlackWon,
            Outcome::Draw => GameOutcome::Drawn,
        })
    }

    fn method(&self) -> Option<EndMethod> {
        if let Some((_, method)) = self.adjudged {
            return Some(method);
        }
        if self.pos.is_checkmate() {
            Some(EndMethod::Checkmate)
        } else if self.pos.is_stalemate() {
            Some(EndMethod::Stalemate)
        } else if self.pos.is_insufficient_material() {
            Some(EndMethod::InsufficientMaterial)
        } else {
            None
        }
    }

    fn declare_draw(&mut self, method: EndMethod) {
        if self.adjudged.is_none() {
            self.adjudged = Some((GameOutcome::Drawn, method));
        }
    }

    fn resign(&mut self, side: Side) {
        if self.adjudged.is_none() {
            self.adjudged = Some((GameOutcome::win_for(side.other()), EndMethod::Resignation));
        }
    }

    fn fen(&self) -> String {
        fen_of(&self.pos)
    }

    fn ascii_board(&self) -> String {
        let board = self.pos.board();
        let mut out = String::new();
        for rank in (0..8u32).rev() {
            out.push_str(&format!("{} ", rank + 1));
            for file in 0..8u32 {
                let square = Square::from_coords(File::new(file), Rank::new(rank));
                let glyph = board.piece_at(square).map(|p| p.char()).unwrap_or('.');
                out.push(glyph);
                if file != 7 {
                    out.push(' ');
                }
            }
            out.push('\n');
        }
        out.push_str("  a b c d e f g h");
        out
    }

    fn history(&self) -> &[AppliedMove] {
        &self.history
    }

    fn movetext(&self) -> String {
        let mut parts = Vec::with_capacity(self.history.len() + 1);
        for (index, mv) in self.history.iter().enumerate() {
            if index % 2 == 0 {
                parts.push(format!("{}.", index / 2 + 1));
            }
            parts.push(mv.san.clone());
        }
        parts.push(
            self.outcome()
                .map(GameOutcome::score)
                .unwrap_or("*")
                .to_string(),
        );
        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opening_move_round_trips_both_notations() {
        let mut rules = ShakmatyRules::new();
        let applied = rules.apply_san("e4").expect("e4 is legal");
        assert_eq!(applied.san, "e4");
        assert_eq!(applied.uci, "e2e4");
        assert_eq!(applied.from.as_deref(), Some("e2"));
        assert_eq!(applied.to, "e4");
        assert_eq!(rules.turn(), Side::Black);

        let reply = rules.apply_uci("e7e5").expect("e7e5 is legal");
        assert_eq!(reply.san, "e5");
        assert_eq!(rules.turn(), Side::White);
        assert_eq!(rules.history().len(), 2);
    }

    #[test]
    fn illegal_move_is_rejected_without_mutation() {
        let mut rules = ShakmatyRules::new();
        assert!(rules.apply_san("e5").is_err());
        assert!(rules.apply_san("Qh5").is_err());
        assert!(rules.apply_uci("e2e5").is_err());
        assert_eq!(rules.history().len(), 0);
        assert_eq!(rules.turn(), Side::White);
    }

    #[test]
    fn fools_mate_is_detected_as_checkmate() {
        let mut rules = ShakmatyRules::new();
        for mv in ["f3", "e5", "g4", "Qh4#"] {
            rules.apply_san(mv).expect("scripted move is legal");
        }
        assert_eq!(rules.outcome(), Some(GameOutcome::BlackWon));
        assert_eq!(rules.method(), Some(EndMethod::Checkmate));
        assert!(rules.apply_san("a3").is_err());
        assert!(rules.movetext().ends_with("0-1"));
    }

    #[test]
    fn resignation_credits_the_other_side() {
        let mut rules = ShakmatyRules::new();
        rules.resign(Side::White);
        assert_eq!(rules.outcome(), Some(GameOutcome::BlackWon));
        assert_eq!(rules.method(), Some(EndMethod::Resignation));
    }

    #[test]
    fn declared_draw_takes_priority_and_sticks() {
        let mut rules = ShakmatyRules::new();
        rules.declare_draw(EndMethod::DrawAgreement);
        assert_eq!(rules.outcome(), Some(GameOutcome::Drawn));
        assert_eq!(rules.method(), Some(EndMethod::DrawAgreement));
        // A later resignation must not overwrite the recorded result.
        rules.resign(Side::Black);
        assert_eq!(rules.outcome(), Some(GameOutcome::Drawn));
    }

    #[test]
    fn listing_groups_moves_by_piece() {
        let rules = ShakmatyRules::new();
        let listing = rules.legal_moves();
        assert_eq!(listing.len(), 20);
        let rendered = listing.to_string();
        assert!(rendered.contains("P -"));
        assert!(rendered.contains("N -"));
        assert!(rendered.contains("e4"));
        assert!(rendered.starts_with("\n```"));
    }

    #[test]
    fn ascii_board_shows_initial_position() {
        let rules = ShakmatyRules::new();
        let board = rules.ascii_board();
        assert!(board.starts_with("8 r n b q k b n r"));
        assert!(board.ends_with("  a b c d e f g h"));
        assert!(board.contains("1 R N B Q K B N R"));
    }
}

//! Board-rendering boundary.
//!
//! Rasterization is a collaborator concern; this crate only defines the
//! seam. When no renderer is wired in, or a render fails, the caller falls
//! back to the monospace diagram from the rules adapter.

use derive_more::{Display, Error};

/// A rendered image ready to post as a file attachment.
#[derive(Debug, Clone)]
pub struct RenderedImage {
    /// Suggested attachment filename, extension included.
    pub filename: String,
    /// Encoded image bytes.
    pub bytes: Vec<u8>,
}

/// Failure producing an image. Always recoverable; callers degrade to text.
#[derive(Debug, Display, Error)]
#[display("render failure: {message}")]
pub struct RenderError {
    /// Renderer-side detail, for the log only.
    pub message: String,
}

impl RenderError {
    /// Wraps a renderer failure message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Position-to-image collaborator. Implementations live outside this crate.
pub trait BoardRenderer: Send + Sync {
    /// Renders one position. `highlight` carries the last move's origin and
    /// destination square names.
    fn render(
        &self,
        fen: &str,
        highlight: Option<(&str, &str)>,
    ) -> Result<RenderedImage, RenderError>;

    /// Renders a finished game as an animated sequence, one frame per
    /// position in order.
    fn render_sequence(&self, fens: &[String]) -> Result<RenderedImage, RenderError>;
}

/// Wraps a monospace diagram in a code block for the text fallback path.
pub fn text_board(ascii: &str) -> String {
    format!("```\n{ascii}\n```")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_board_is_fenced() {
        let block = text_board("8 . . .\n  a b c");
        assert!(block.starts_with("```\n8"));
        assert!(block.ends_with("a b c\n```"));
    }
}

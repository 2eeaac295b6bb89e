// Domain errors - Rejections raised by timeline edits

use thiserror::Error;

/// Reasons an edit on the timeline can be rejected
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EditError {
    /// Range start is not before range end
    #[error("Empty range: start ({start:.3}s) must be before end ({end:.3}s)")]
    EmptyRange { start: f64, end: f64 },
    /// Nothing on the timeline to operate on
    #[error("Timeline is empty")]
    EmptyTimeline,
    /// Position lies outside the timeline
    #[error("Position {position:.3}s is outside the timeline (0 - {duration:.3}s)")]
    OutOfBounds { position: f64, duration: f64 },
    /// Paste requested with nothing copied
    #[error("Clipboard is empty")]
    ClipboardEmpty,
    /// Undo stack exhausted
    #[error("Nothing to undo")]
    NothingToUndo,
    /// Redo stack exhausted
    #[error("Nothing to redo")]
    NothingToRedo,
    /// Segment violates end > start or has no source to fall back to
    #[error("Invalid segment: {0}")]
    InvalidSegment(String),
    /// Argument could not be parsed
    #[error("Bad arguments: {0}")]
    BadArgs(String),
}

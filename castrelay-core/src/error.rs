//! Domain-specific error types for the castrelay core.
//!
//! All fallible operations return `Result<T, RelayError>`.
//! No panics on invalid input; every error is typed and contained to
//! the connection or comparison that caused it.

use thiserror::Error;

use crate::frame::PixelFormat;

/// The canonical error type for the relay core.
#[derive(Debug, Error)]
pub enum RelayError {
    // ── Frame Errors ─────────────────────────────────────────────
    /// The two frames handed to the differ are not the same size.
    #[error(
        "frame dimensions differ: current {current_width}x{current_height}, \
         previous {previous_width}x{previous_height}"
    )]
    DimensionMismatch {
        current_width: u32,
        current_height: u32,
        previous_width: u32,
        previous_height: u32,
    },

    /// The two frames handed to the differ use different pixel layouts.
    #[error("frame formats differ: current {current:?}, previous {previous:?}")]
    FormatMismatch {
        current: PixelFormat,
        previous: PixelFormat,
    },

    /// A pixel buffer does not hold exactly `width * height * 4` bytes.
    #[error("invalid frame buffer: expected {expected} bytes, got {actual}")]
    InvalidFrameBuffer { expected: usize, actual: usize },

    // ── Session Errors ───────────────────────────────────────────
    /// No session is registered for the calling connection.
    #[error("no session for connection {0}")]
    SessionNotFound(String),

    /// The session has no agent service connection recorded.
    #[error("session {0} has no agent service registered")]
    MissingAgent(String),

    // ── Connection Errors ────────────────────────────────────────
    /// The TCP/IO layer reported an error.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    // ── Protocol Errors ──────────────────────────────────────────
    /// An inbound invocation was well-formed but not allowed.
    #[error("invalid invocation: {0}")]
    InvalidInvocation(String),
}

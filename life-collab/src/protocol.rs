//! Text frames exchanged with the server.
//!
//! ```text
//! server → client   [[…], …]           snapshot, first frame on every connection
//! server → client   {"x":{"y":"#…"}}   diff, part of a burst
//! server → client   {}                 end of burst
//! client → server   {"x":{"y":"#…"}}   one diff per submit
//! ```
//!
//! Every close the client starts uses code 1000 with a readable reason.

use std::fmt;

use life_core::DiffError;

/// Close code used for every client-initiated disconnect.
pub const NORMAL_CLOSURE: u16 = 1000;

pub const REASON_PAGE_HIDDEN: &str = "page hidden";
pub const REASON_BUFFER_OVERFLOW: &str = "buffer overflow";
pub const REASON_REPLACED: &str = "replaced";
pub const REASON_SHUTDOWN: &str = "session shutdown";

/// Kind of an inbound text frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Full board, applied immediately.
    Snapshot,
    /// Board diff, buffered and applied on the dequeue cadence.
    Diff,
}

impl FrameKind {
    /// Classify a frame by its first character.
    pub fn classify(payload: &str) -> Self {
        if payload.starts_with('[') {
            FrameKind::Snapshot
        } else {
            FrameKind::Diff
        }
    }
}

/// Errors surfaced by the sync client.
#[derive(Debug, Clone)]
pub enum SyncError {
    /// A frame could not be decoded or did not fit the grid
    Frame(DiffError),
    /// A binary frame was not valid UTF-8
    InvalidEncoding,
    /// Opening the WebSocket failed
    Connect(String),
    ConnectionClosed,
    /// The session task is gone
    SessionClosed,
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Frame(e) => write!(f, "Malformed frame: {e}"),
            Self::InvalidEncoding => write!(f, "Frame is not valid UTF-8"),
            Self::Connect(e) => write!(f, "Connect failed: {e}"),
            Self::ConnectionClosed => write!(f, "Connection closed"),
            Self::SessionClosed => write!(f, "Session closed"),
        }
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Frame(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DiffError> for SyncError {
    fn from(e: DiffError) -> Self {
        Self::Frame(e)
    }
}

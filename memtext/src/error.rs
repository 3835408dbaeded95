//! Errors surfaced by a memtext connection.

use protocol_memtext::ParseError;

/// Errors returned to callers of a [`Connection`](crate::Connection) and
/// delivered to completion handlers.
///
/// Server-reported failures (`ERROR`, `CLIENT_ERROR`, `SERVER_ERROR`) are not
/// errors: they arrive as a [`Reply::Status`](protocol_memtext::Reply) with
/// `ok == false` and leave the connection usable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Too many requests are awaiting replies on this connection.
    #[error("request queue full ({max} outstanding)")]
    QueueFull { max: usize },

    /// The server sent a reply when no request was outstanding.
    #[error("reply received with no outstanding request")]
    UnmatchedReply,

    /// The reply stream could not be decoded.
    #[error("framing error: {0}")]
    Framing(#[from] ParseError),

    /// An earlier framing or alignment error left the connection unusable.
    #[error("connection desynchronized")]
    Desynchronized,

    /// The connection was closed before a reply was received.
    #[error("connection closed")]
    ConnectionClosed,
}

impl Error {
    /// Returns true if the connection must be discarded rather than reused.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::QueueFull { .. })
    }
}

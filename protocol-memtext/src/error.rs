//! Error types for memcache reply decoding.

/// A reply stream that cannot be decoded.
///
/// Running out of input is not an error: the decoder reports it as
/// `Ok(None)` and resumes once more bytes are buffered. Every variant here
/// means the stream has lost alignment with the request sequence.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Malformed reply framing.
    #[error("protocol error: {0}")]
    Protocol(&'static str),

    /// A numeric field was not a valid decimal number.
    #[error("invalid number")]
    InvalidNumber,
}

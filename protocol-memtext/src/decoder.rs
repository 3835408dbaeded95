//! Incremental reply decoder.
//!
//! The decoder alternates between two modes. In line mode it reads
//! `\r\n`-terminated reply lines and classifies them by their first token.
//! A `VALUE` header switches it to payload mode, where it waits for the
//! declared number of bytes to be buffered before taking them in one piece.
//!
//! All state that must survive a short read lives in [`FrameDecoder`], so a
//! decode can stop at any byte boundary and pick up on the next call.
//!
//! # Example
//!
//! ```
//! use protocol_memtext::{FrameDecoder, RecvBuffer};
//!
//! let mut buf = RecvBuffer::new(64);
//! let mut decoder = FrameDecoder::default();
//!
//! buf.append(b"VALUE greeting 0 5\r\nhel");
//! assert_eq!(decoder.decode(&mut buf).unwrap(), None);
//!
//! buf.append(b"lo\r\nEND\r\n");
//! let reply = decoder.decode(&mut buf).unwrap().unwrap();
//! assert_eq!(reply.as_value().unwrap().data.as_ref(), b"hello");
//! ```

use bytes::Bytes;

use crate::buffer::{LINE_WATERMARK, RecvBuffer};
use crate::error::ParseError;
use crate::reply::{Reply, Stats, StatusKind, StatusReply, ValueReply};

/// Default maximum length of a reply line, excluding the terminator.
pub const DEFAULT_MAX_LINE_LEN: usize = 8 * 1024;

/// Default maximum declared payload length (1MB, memcached's item size limit).
pub const DEFAULT_MAX_VALUE_LEN: usize = 1024 * 1024;

/// How much of an error line is kept as the status message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MessageCapture {
    /// Only the first word after the status token.
    #[default]
    FirstToken,
    /// Everything after the status token.
    Remainder,
}

/// Options for reply decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Longest reply line accepted before the stream is declared corrupt.
    pub max_line_len: usize,
    /// Largest `VALUE` payload accepted.
    pub max_value_len: usize,
    /// Which part of an error line becomes the status message.
    pub message_capture: MessageCapture,
    /// Treat `NOT_STORED`, `NOT_FOUND`, `EXISTS`, `OK` and `TOUCHED` as
    /// terminal statuses instead of ignoring them.
    pub extended_status: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_line_len: DEFAULT_MAX_LINE_LEN,
            max_value_len: DEFAULT_MAX_VALUE_LEN,
            message_capture: MessageCapture::default(),
            extended_status: false,
        }
    }
}

/// Header of a value whose payload has not been read yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingValue {
    pub key: Bytes,
    pub flags: u32,
    pub length: usize,
}

/// Which kind of frame the decoder is waiting for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DecoderState {
    #[default]
    ReadingLine,
    ReadingPayload(PendingValue),
}

/// Result being assembled for the current request cycle.
#[derive(Debug)]
enum Partial {
    Value(ValueReply),
    Stats(Stats),
}

enum LineOutcome {
    Reply(Reply),
    Payload,
    Incomplete,
}

/// Stateful decoder for one connection's reply stream.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    options: ParseOptions,
    state: DecoderState,
    partial: Option<Partial>,
    // The CRLF that follows a payload has not been consumed yet.
    terminator_pending: bool,
}

impl FrameDecoder {
    pub fn new(options: ParseOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    pub fn state(&self) -> &DecoderState {
        &self.state
    }

    /// Returns true when no frame is partially decoded.
    pub fn is_idle(&self) -> bool {
        self.state == DecoderState::ReadingLine
            && self.partial.is_none()
            && !self.terminator_pending
    }

    /// Forget any partially decoded reply.
    pub fn reset(&mut self) {
        self.state = DecoderState::ReadingLine;
        self.partial = None;
        self.terminator_pending = false;
    }

    /// Decode the next complete reply from `buf`.
    ///
    /// Returns `Ok(None)` when the buffer does not yet hold a complete
    /// reply; everything consumed so far is remembered. Call repeatedly
    /// until it returns `Ok(None)` to drain pipelined replies.
    pub fn decode(&mut self, buf: &mut RecvBuffer) -> Result<Option<Reply>, ParseError> {
        loop {
            match std::mem::take(&mut self.state) {
                DecoderState::ReadingLine => match self.read_lines(buf)? {
                    LineOutcome::Reply(reply) => return Ok(Some(reply)),
                    LineOutcome::Payload => continue,
                    LineOutcome::Incomplete => return Ok(None),
                },
                DecoderState::ReadingPayload(pending) => {
                    let Some(data) = buf.read_exact(pending.length) else {
                        self.state = DecoderState::ReadingPayload(pending);
                        return Ok(None);
                    };
                    buf.set_watermark(LINE_WATERMARK);
                    self.terminator_pending = true;
                    self.partial = Some(Partial::Value(ValueReply {
                        key: pending.key,
                        flags: pending.flags,
                        data,
                    }));
                }
            }
        }
    }

    /// Decode every complete reply currently buffered.
    pub fn decode_all(&mut self, buf: &mut RecvBuffer) -> Result<Vec<Reply>, ParseError> {
        let mut replies = Vec::new();
        while let Some(reply) = self.decode(buf)? {
            replies.push(reply);
        }
        Ok(replies)
    }

    fn read_lines(&mut self, buf: &mut RecvBuffer) -> Result<LineOutcome, ParseError> {
        loop {
            let Some(line) = self.next_line(buf)? else {
                return Ok(LineOutcome::Incomplete);
            };

            if self.terminator_pending {
                if !line.is_empty() {
                    return Err(ParseError::Protocol("missing data terminator"));
                }
                self.terminator_pending = false;
                continue;
            }

            let mut parts = line.splitn(3, |&b| b == b' ');
            let token = parts.next().unwrap_or_default();

            if token == b"VALUE" {
                let fields = line.get(6..).unwrap_or_default();
                let pending = parse_value_header(fields, &self.options)?;
                buf.set_watermark(pending.length);
                self.state = DecoderState::ReadingPayload(pending);
                return Ok(LineOutcome::Payload);
            }

            if token == b"STAT" {
                let name = match parts.next() {
                    Some(name) if !name.is_empty() => lossy(name),
                    _ => return Err(ParseError::Protocol("invalid STAT line")),
                };
                let value = parts.next().map(lossy).unwrap_or_default();
                match &mut self.partial {
                    Some(Partial::Stats(stats)) => stats.insert(name, value),
                    partial => {
                        let mut stats = Stats::new();
                        stats.insert(name, value);
                        *partial = Some(Partial::Stats(stats));
                    }
                }
                continue;
            }

            let Some(kind) = StatusKind::from_token(token, self.options.extended_status) else {
                // Unknown lines are skipped so newer servers stay readable.
                continue;
            };

            let reply = match (kind, self.partial.take()) {
                (StatusKind::End, Some(Partial::Value(value))) => Reply::Value(value),
                (StatusKind::End, Some(Partial::Stats(stats))) => Reply::Stats(stats),
                (kind, _) => {
                    let message = if kind.is_success() {
                        None
                    } else {
                        self.capture_message(&line, token.len())
                    };
                    Reply::Status(StatusReply::new(kind, message))
                }
            };
            return Ok(LineOutcome::Reply(reply));
        }
    }

    fn next_line(&self, buf: &mut RecvBuffer) -> Result<Option<Bytes>, ParseError> {
        match buf.read_line() {
            Some(line) => Ok(Some(line)),
            None if buf.len() > self.options.max_line_len => {
                Err(ParseError::Protocol("line too long"))
            }
            None => Ok(None),
        }
    }

    fn capture_message(&self, line: &[u8], token_len: usize) -> Option<String> {
        let rest = line.get(token_len + 1..)?;
        let message = match self.options.message_capture {
            MessageCapture::FirstToken => rest
                .split(|&b| b == b' ')
                .find(|t| !t.is_empty())
                .unwrap_or_default(),
            MessageCapture::Remainder => rest,
        };
        if message.is_empty() {
            None
        } else {
            Some(lossy(message))
        }
    }
}

/// Parse the fields after `VALUE `: `<key> <flags> <bytes> [<cas unique>]`.
fn parse_value_header(fields: &[u8], options: &ParseOptions) -> Result<PendingValue, ParseError> {
    let mut parts = fields.split(|&b| b == b' ');
    let key = parts.next().filter(|k| !k.is_empty());
    let flags = parts.next();
    let length = parts.next();
    let (Some(key), Some(flags), Some(length)) = (key, flags, length) else {
        return Err(ParseError::Protocol("invalid VALUE line"));
    };

    let flags = parse_u32(flags)?;
    let length = parse_usize(length)?;
    if length > options.max_value_len {
        return Err(ParseError::Protocol("value data too large"));
    }

    Ok(PendingValue {
        key: Bytes::copy_from_slice(key),
        flags,
        length,
    })
}

fn lossy(data: &[u8]) -> String {
    String::from_utf8_lossy(data).into_owned()
}

/// Parse a u32 from ASCII decimal.
fn parse_u32(data: &[u8]) -> Result<u32, ParseError> {
    std::str::from_utf8(data)
        .map_err(|_| ParseError::InvalidNumber)?
        .parse()
        .map_err(|_| ParseError::InvalidNumber)
}

/// Parse a usize from ASCII decimal.
fn parse_usize(data: &[u8]) -> Result<usize, ParseError> {
    std::str::from_utf8(data)
        .map_err(|_| ParseError::InvalidNumber)?
        .parse()
        .map_err(|_| ParseError::InvalidNumber)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(input: &[u8]) -> Vec<Reply> {
        decode_all_with(input, ParseOptions::default())
    }

    fn decode_all_with(input: &[u8], options: ParseOptions) -> Vec<Reply> {
        let mut buf = RecvBuffer::new(64);
        let mut decoder = FrameDecoder::new(options);
        buf.append(input);
        let replies = decoder.decode_all(&mut buf).unwrap();
        assert!(buf.is_empty(), "unconsumed: {:?}", buf.data());
        replies
    }

    fn status(reply: &Reply) -> &StatusReply {
        reply.as_status().expect("expected status reply")
    }

    #[test]
    fn test_value_then_end() {
        let replies = decode_all(b"VALUE k 0 5\r\nhello\r\nEND\r\n");
        assert_eq!(
            replies,
            vec![Reply::Value(ValueReply {
                key: Bytes::from_static(b"k"),
                flags: 0,
                data: Bytes::from_static(b"hello"),
            })]
        );
    }

    #[test]
    fn test_value_with_flags_and_cas() {
        let replies = decode_all(b"VALUE key 42 3 99\r\nabc\r\nEND\r\n");
        let value = replies[0].as_value().unwrap();
        assert_eq!(value.key.as_ref(), b"key");
        assert_eq!(value.flags, 42);
        assert_eq!(value.data.as_ref(), b"abc");
    }

    #[test]
    fn test_payload_may_contain_crlf() {
        let replies = decode_all(b"VALUE k 0 6\r\na\r\nb\r\n\r\nEND\r\n");
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].as_value().unwrap().data.as_ref(), b"a\r\nb\r\n");
    }

    #[test]
    fn test_zero_length_value() {
        let replies = decode_all(b"VALUE empty 0 0\r\n\r\nEND\r\n");
        assert_eq!(replies.len(), 1);
        let value = replies[0].as_value().unwrap();
        assert_eq!(value.key.as_ref(), b"empty");
        assert!(value.data.is_empty());
    }

    #[test]
    fn test_miss() {
        let replies = decode_all(b"END\r\n");
        assert_eq!(replies.len(), 1);
        assert!(replies[0].is_miss());
        assert_eq!(status(&replies[0]).message, None);
    }

    #[test]
    fn test_stats_aggregate() {
        let replies = decode_all(b"STAT a 1\r\nSTAT b 2\r\nEND\r\n");
        assert_eq!(replies.len(), 1);
        let stats = replies[0].as_stats().unwrap();
        let entries: Vec<_> = stats.iter().collect();
        assert_eq!(entries, [("a", "1"), ("b", "2")]);
    }

    #[test]
    fn test_stat_value_keeps_spaces() {
        let replies = decode_all(b"STAT version 1.6 beta\r\nSTAT empty\r\nEND\r\n");
        let stats = replies[0].as_stats().unwrap();
        assert_eq!(stats.get("version"), Some("1.6 beta"));
        assert_eq!(stats.get("empty"), Some(""));
    }

    #[test]
    fn test_simple_statuses() {
        let replies = decode_all(b"STORED\r\nDELETED\r\nERROR\r\n");
        assert_eq!(replies.len(), 3);
        assert_eq!(status(&replies[0]).kind, StatusKind::Stored);
        assert!(status(&replies[0]).ok);
        assert_eq!(status(&replies[1]).kind, StatusKind::Deleted);
        assert!(status(&replies[1]).ok);
        assert_eq!(status(&replies[2]).kind, StatusKind::Error);
        assert!(!status(&replies[2]).ok);
        assert_eq!(status(&replies[2]).message, None);
    }

    #[test]
    fn test_client_error_first_token() {
        let replies = decode_all(b"CLIENT_ERROR bad command line format\r\n");
        let status = status(&replies[0]);
        assert_eq!(status.kind, StatusKind::ClientError);
        assert!(!status.ok);
        assert_eq!(status.message.as_deref(), Some("bad"));
    }

    #[test]
    fn test_first_token_skips_repeated_spaces() {
        let replies = decode_all(b"CLIENT_ERROR  bad  format\r\nSERVER_ERROR   \r\n");
        assert_eq!(status(&replies[0]).message.as_deref(), Some("bad"));
        assert_eq!(status(&replies[1]).message, None);
    }

    #[test]
    fn test_server_error_remainder() {
        let options = ParseOptions {
            message_capture: MessageCapture::Remainder,
            ..ParseOptions::default()
        };
        let replies = decode_all_with(b"SERVER_ERROR out of memory\r\n", options);
        assert_eq!(status(&replies[0]).message.as_deref(), Some("out of memory"));
    }

    #[test]
    fn test_error_without_message() {
        let replies = decode_all(b"SERVER_ERROR\r\nCLIENT_ERROR \r\n");
        assert_eq!(status(&replies[0]).message, None);
        assert_eq!(status(&replies[1]).message, None);
    }

    #[test]
    fn test_unknown_lines_ignored() {
        let replies = decode_all(b"VERSION 1.6.21\r\nNOT_FOUND\r\nSTORED\r\n");
        assert_eq!(replies.len(), 1);
        assert_eq!(status(&replies[0]).kind, StatusKind::Stored);
    }

    #[test]
    fn test_extended_status() {
        let options = ParseOptions {
            extended_status: true,
            ..ParseOptions::default()
        };
        let replies = decode_all_with(b"NOT_FOUND\r\nOK\r\nNOT_STORED\r\n", options);
        assert_eq!(replies.len(), 3);
        assert_eq!(status(&replies[0]).kind, StatusKind::NotFound);
        assert!(!status(&replies[0]).ok);
        assert!(status(&replies[1]).ok);
        assert!(!status(&replies[2]).ok);
    }

    #[test]
    fn test_error_discards_partial() {
        let replies = decode_all(b"STAT a 1\r\nSERVER_ERROR busy\r\nEND\r\n");
        assert_eq!(replies.len(), 2);
        assert_eq!(status(&replies[0]).kind, StatusKind::ServerError);
        assert!(replies[1].is_miss());
    }

    #[test]
    fn test_last_value_wins() {
        let replies = decode_all(b"VALUE a 0 1\r\nx\r\nVALUE b 0 1\r\ny\r\nEND\r\n");
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].as_value().unwrap().key.as_ref(), b"b");
    }

    #[test]
    fn test_pipelined_mix() {
        let replies = decode_all(
            b"STORED\r\nVALUE k 1 2\r\nhi\r\nEND\r\nEND\r\nSTAT pid 7\r\nEND\r\nDELETED\r\n",
        );
        assert_eq!(replies.len(), 5);
        assert_eq!(status(&replies[0]).kind, StatusKind::Stored);
        assert_eq!(replies[1].as_value().unwrap().data.as_ref(), b"hi");
        assert!(replies[2].is_miss());
        assert_eq!(replies[3].as_stats().unwrap().get("pid"), Some("7"));
        assert_eq!(status(&replies[4]).kind, StatusKind::Deleted);
    }

    #[test]
    fn test_resume_across_every_split() {
        let input: &[u8] = b"VALUE k 0 5\r\nhello\r\nEND\r\nSTAT a 1\r\nEND\r\nCLIENT_ERROR x y\r\n";
        let expected = decode_all(input);
        for split in 0..=input.len() {
            let mut buf = RecvBuffer::new(16);
            let mut decoder = FrameDecoder::default();
            buf.append(&input[..split]);
            let mut replies = decoder.decode_all(&mut buf).unwrap();
            buf.append(&input[split..]);
            replies.extend(decoder.decode_all(&mut buf).unwrap());
            assert_eq!(replies, expected, "split at {split}");
            assert!(decoder.is_idle());
        }
    }

    #[test]
    fn test_watermark_tracks_state() {
        let mut buf = RecvBuffer::new(64);
        let mut decoder = FrameDecoder::default();
        buf.append(b"VALUE k 0 10\r\nabc");
        assert_eq!(decoder.decode(&mut buf).unwrap(), None);
        assert_eq!(buf.watermark(), 10);
        assert!(!buf.is_ready());
        assert_eq!(
            decoder.state(),
            &DecoderState::ReadingPayload(PendingValue {
                key: Bytes::from_static(b"k"),
                flags: 0,
                length: 10,
            })
        );

        buf.append(b"defghij");
        assert_eq!(decoder.decode(&mut buf).unwrap(), None);
        assert_eq!(buf.watermark(), LINE_WATERMARK);
        assert_eq!(decoder.state(), &DecoderState::ReadingLine);
        assert!(!decoder.is_idle());

        buf.append(b"\r\nEND\r\n");
        let reply = decoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(reply.as_value().unwrap().data.as_ref(), b"abcdefghij");
        assert!(decoder.is_idle());
    }

    #[test]
    fn test_missing_terminator() {
        let mut buf = RecvBuffer::new(64);
        let mut decoder = FrameDecoder::default();
        buf.append(b"VALUE k 0 3\r\nabcdEND\r\n");
        assert_eq!(
            decoder.decode(&mut buf),
            Err(ParseError::Protocol("missing data terminator"))
        );
    }

    #[test]
    fn test_invalid_value_header() {
        for input in [
            &b"VALUE\r\n"[..],
            b"VALUE k 0\r\n",
            b"VALUE  0 5\r\n",
        ] {
            let mut buf = RecvBuffer::new(64);
            buf.append(input);
            assert_eq!(
                FrameDecoder::default().decode(&mut buf),
                Err(ParseError::Protocol("invalid VALUE line")),
                "{:?}",
                input
            );
        }

        let mut buf = RecvBuffer::new(64);
        buf.append(b"VALUE k x 5\r\n");
        assert_eq!(
            FrameDecoder::default().decode(&mut buf),
            Err(ParseError::InvalidNumber)
        );
    }

    #[test]
    fn test_value_too_large() {
        let options = ParseOptions {
            max_value_len: 4,
            ..ParseOptions::default()
        };
        let mut buf = RecvBuffer::new(64);
        buf.append(b"VALUE k 0 5\r\n");
        assert_eq!(
            FrameDecoder::new(options).decode(&mut buf),
            Err(ParseError::Protocol("value data too large"))
        );
    }

    #[test]
    fn test_invalid_stat_line() {
        let mut buf = RecvBuffer::new(64);
        buf.append(b"STAT\r\n");
        assert_eq!(
            FrameDecoder::default().decode(&mut buf),
            Err(ParseError::Protocol("invalid STAT line"))
        );
    }

    #[test]
    fn test_line_too_long() {
        let options = ParseOptions {
            max_line_len: 8,
            ..ParseOptions::default()
        };
        let mut decoder = FrameDecoder::new(options);
        let mut buf = RecvBuffer::new(64);
        buf.append(b"STORED");
        assert_eq!(decoder.decode(&mut buf), Ok(None));
        buf.append(b"XXXXXX");
        assert_eq!(
            decoder.decode(&mut buf),
            Err(ParseError::Protocol("line too long"))
        );
    }

    #[test]
    fn test_reset() {
        let mut buf = RecvBuffer::new(64);
        let mut decoder = FrameDecoder::default();
        buf.append(b"STAT a 1\r\n");
        assert_eq!(decoder.decode(&mut buf).unwrap(), None);
        assert!(!decoder.is_idle());
        decoder.reset();
        assert!(decoder.is_idle());
        buf.append(b"END\r\n");
        assert!(decoder.decode(&mut buf).unwrap().unwrap().is_miss());
    }
}

//! Memcache text protocol reply decoding for pipelined clients.
//!
//! This crate is sans-IO. A transport appends received bytes to a
//! [`RecvBuffer`]; a [`FrameDecoder`] turns the buffered stream into one
//! [`Reply`] per request cycle, however the bytes were chunked on arrival.
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use protocol_memtext::{FrameDecoder, RecvBuffer, Request};
//!
//! // Encode a pipelined pair of commands
//! let mut out = BytesMut::new();
//! Request::set(b"k", b"hello").build().encode(&mut out);
//! Request::get(b"k").encode(&mut out);
//! assert_eq!(&out[..], b"set k 0 0 5\r\nhello\r\nget k\r\n");
//!
//! // Decode the replies
//! let mut buf = RecvBuffer::new(1024);
//! let mut decoder = FrameDecoder::default();
//! buf.append(b"STORED\r\nVALUE k 0 5\r\nhello\r\nEND\r\n");
//!
//! let stored = decoder.decode(&mut buf).unwrap().unwrap();
//! assert!(stored.is_ok());
//! let value = decoder.decode(&mut buf).unwrap().unwrap();
//! assert_eq!(value.as_value().unwrap().data.as_ref(), b"hello");
//! assert!(decoder.decode(&mut buf).unwrap().is_none());
//! ```

mod buffer;
mod decoder;
mod error;
mod reply;
mod request;

pub use buffer::{LINE_WATERMARK, RecvBuffer};
pub use decoder::{
    DEFAULT_MAX_LINE_LEN, DEFAULT_MAX_VALUE_LEN, DecoderState, FrameDecoder, MessageCapture,
    ParseOptions, PendingValue,
};
pub use error::ParseError;
pub use reply::{Reply, Stats, StatusKind, StatusReply, ValueReply};
pub use request::{Request, StorageCommand, StorageRequest};

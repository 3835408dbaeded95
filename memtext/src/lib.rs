//! Pipelined memcache text protocol connection.
//!
//! A [`Connection`] pairs the incremental reply decoder from
//! [`protocol_memtext`] with a [`Dispatcher`] that hands each reply to the
//! request that caused it, in submission order. It performs no I/O: the
//! transport writes [`Connection::pending_send`] and feeds received bytes to
//! [`Connection::on_read`], in whatever chunks the socket produced them.
//!
//! Handlers run synchronously inside `on_read`, so they must not block.
//! Each handler is called exactly once, with a [`Reply`] or an [`Error`].
//!
//! # Example
//!
//! ```
//! use memtext::{Config, Connection, Deferred, Request};
//!
//! let mut conn = Connection::new(Config::default());
//!
//! let stored = Deferred::new();
//! let fetched = Deferred::new();
//! conn.submit(Request::set(b"greeting", b"hello"), stored.completer())?;
//! conn.submit(Request::get(b"greeting"), fetched.completer())?;
//!
//! // Hand the encoded requests to the transport
//! let out = conn.take_send();
//! assert!(out.starts_with(b"set greeting 0 0 5\r\n"));
//!
//! // Replies may arrive in any fragmentation
//! conn.on_read(b"STORED\r\nVALUE greeting 0 5\r\nhel")?;
//! conn.on_read(b"lo\r\nEND\r\n")?;
//!
//! assert!(stored.take().unwrap()?.is_ok());
//! let reply = fetched.take().unwrap()?;
//! assert_eq!(reply.as_value().unwrap().data.as_ref(), b"hello");
//! # Ok::<(), memtext::Error>(())
//! ```

mod config;
mod connection;
mod dispatch;
mod error;
pub mod metrics;

pub use config::{Config, DEFAULT_MAX_QUEUE};
pub use connection::{Connection, ConnectionState};
pub use dispatch::{Completion, Deferred, Dispatcher, RequestId};
pub use error::Error;
pub use protocol_memtext::{
    MessageCapture, ParseError, ParseOptions, Reply, Request, Stats, StatusKind, StatusReply,
    ValueReply,
};

//! One pipelined memcache connection, independent of the transport.
//!
//! The transport owns the socket. It writes out whatever
//! [`Connection::pending_send`] returns, feeds every chunk it reads to
//! [`Connection::on_read`], and closes the socket when the connection stops
//! being [`Open`](ConnectionState::Open).

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::{Buf, Bytes, BytesMut};
use protocol_memtext::{FrameDecoder, ParseError, RecvBuffer, Reply, Request};
use tracing::{debug, trace, warn};

use crate::dispatch::{Dispatcher, RequestId};
use crate::metrics::{FRAMING_ERRORS, REPLIES_SERVER_FAILURE, REPLIES_STATS, REPLIES_VALUE};
use crate::{Config, Error};

static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(0);

/// Lifecycle of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Requests may be submitted and replies are being decoded.
    Open,
    /// Replies no longer line up with requests. The connection must be
    /// discarded, not returned to a pool.
    Desynchronized,
    /// Closed by the owner.
    Closed,
}

/// Protocol state for one memcache connection.
pub struct Connection {
    id: u64,
    state: ConnectionState,
    recv: RecvBuffer,
    send: BytesMut,
    decoder: FrameDecoder,
    queue: Dispatcher,
}

impl Connection {
    /// Replies are always decoded with
    /// [`extended_status`](protocol_memtext::ParseOptions::extended_status)
    /// on, since `delete`, `add` and `replace` answer with those tokens and
    /// each must complete its own request.
    pub fn new(config: Config) -> Self {
        let id = NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed);
        debug!(conn = id, max_queue = config.max_queue, "connection created");
        let mut parse = config.parse;
        parse.extended_status = true;
        Self {
            id,
            state: ConnectionState::Open,
            recv: RecvBuffer::new(config.recv_capacity),
            send: BytesMut::with_capacity(config.send_capacity),
            decoder: FrameDecoder::new(parse),
            queue: Dispatcher::new(config.max_queue),
        }
    }

    /// Process-unique id, used in log events.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// Number of requests awaiting replies.
    pub fn queue_depth(&self) -> usize {
        self.queue.depth()
    }

    pub fn max_queue(&self) -> usize {
        self.queue.max_queue()
    }

    /// Returns true when nothing is outstanding and nothing is buffered in
    /// either direction.
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
            && self.decoder.is_idle()
            && self.recv.is_empty()
            && self.send.is_empty()
    }

    /// Bytes that must be buffered before decoding resumes.
    pub fn watermark(&self) -> usize {
        self.recv.watermark()
    }

    /// Register a callback fired whenever the last outstanding reply has
    /// been delivered. A pool can use it to reclaim the connection.
    pub fn on_drain<F: FnMut() + 'static>(&mut self, mut f: F) {
        let id = self.id;
        self.queue.set_on_drain(move || {
            debug!(conn = id, "connection drained");
            f();
        });
    }

    /// Reserve a place in the reply queue for a request the caller writes
    /// to the transport itself.
    pub fn enqueue<F>(&mut self, handler: F) -> Result<RequestId, Error>
    where
        F: FnOnce(Result<Reply, Error>) + 'static,
    {
        self.ensure_open()?;
        self.queue.enqueue(handler)
    }

    /// Encode `request` into the outbound buffer and queue `handler` for
    /// its reply. Nothing is written if the queue is full.
    pub fn submit<'a, R, F>(&mut self, request: R, handler: F) -> Result<RequestId, Error>
    where
        R: Into<Request<'a>>,
        F: FnOnce(Result<Reply, Error>) + 'static,
    {
        self.ensure_open()?;
        let id = self.queue.enqueue(handler)?;
        request.into().encode(&mut self.send);
        trace!(conn = self.id, %id, pending = self.send.len(), "request buffered");
        Ok(id)
    }

    /// Withdraw interest in an outstanding request. Its reply is still read
    /// and discarded in order.
    pub fn cancel(&mut self, id: RequestId) -> bool {
        self.queue.cancel(id)
    }

    /// Encoded requests not yet handed to the transport.
    pub fn pending_send(&self) -> &[u8] {
        &self.send[..]
    }

    /// Mark `n` bytes of [`pending_send`](Self::pending_send) as written.
    pub fn advance_send(&mut self, n: usize) {
        let n = n.min(self.send.len());
        self.send.advance(n);
    }

    /// Take every pending outbound byte at once.
    pub fn take_send(&mut self) -> Bytes {
        self.send.split().freeze()
    }

    /// Feed bytes read from the transport.
    ///
    /// Decodes as many replies as are complete and delivers each to its
    /// handler before returning. Returns the number of replies delivered.
    ///
    /// A framing error is delivered to the oldest outstanding request,
    /// every other outstanding request fails with
    /// [`Error::Desynchronized`], and the error is returned. A reply with
    /// nothing outstanding returns [`Error::UnmatchedReply`]. Either way the
    /// connection is left [`Desynchronized`](ConnectionState::Desynchronized).
    pub fn on_read(&mut self, data: &[u8]) -> Result<usize, Error> {
        self.ensure_open()?;
        self.recv.append(data);

        let mut delivered = 0;
        while self.recv.is_ready() {
            let reply = match self.decoder.decode(&mut self.recv) {
                Ok(Some(reply)) => reply,
                Ok(None) => break,
                Err(e) => return Err(self.framing_error(e)),
            };
            record(&reply);
            trace!(conn = self.id, reply = describe(&reply), "reply decoded");

            if let Err(e) = self.queue.dispatch(Ok(reply)) {
                warn!(conn = self.id, "unmatched reply, connection desynchronized");
                self.desynchronize();
                return Err(e);
            }
            delivered += 1;
        }

        if !self.recv.is_empty() {
            trace!(
                conn = self.id,
                buffered = self.recv.len(),
                watermark = self.recv.watermark(),
                "awaiting more data"
            );
        }
        Ok(delivered)
    }

    /// Close the connection, failing every outstanding request with
    /// [`Error::ConnectionClosed`]. Returns how many were failed.
    pub fn close(&mut self) -> usize {
        if self.state == ConnectionState::Closed {
            return 0;
        }
        self.state = ConnectionState::Closed;
        self.recv.reset();
        self.send.clear();
        self.decoder.reset();
        let failed = self.queue.fail_all(|| Error::ConnectionClosed);
        debug!(conn = self.id, failed, "connection closed");
        failed
    }

    fn ensure_open(&self) -> Result<(), Error> {
        match self.state {
            ConnectionState::Open => Ok(()),
            ConnectionState::Desynchronized => Err(Error::Desynchronized),
            ConnectionState::Closed => Err(Error::ConnectionClosed),
        }
    }

    fn framing_error(&mut self, e: ParseError) -> Error {
        FRAMING_ERRORS.increment();
        warn!(conn = self.id, error = %e, "framing error, connection desynchronized");
        self.queue.fail_oldest(Error::Framing(e.clone()));
        self.desynchronize();
        Error::Framing(e)
    }

    fn desynchronize(&mut self) {
        self.state = ConnectionState::Desynchronized;
        self.recv.reset();
        self.decoder.reset();
        self.queue.fail_all(|| Error::Desynchronized);
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("queue", &self.queue)
            .field("buffered", &self.recv.len())
            .field("pending_send", &self.send.len())
            .finish()
    }
}

fn record(reply: &Reply) {
    let counter = match reply {
        Reply::Value(_) => &REPLIES_VALUE,
        Reply::Stats(_) => &REPLIES_STATS,
        Reply::Status(status) if !status.ok => &REPLIES_SERVER_FAILURE,
        Reply::Status(_) => return,
    };
    counter.increment();
}

fn describe(reply: &Reply) -> &'static str {
    match reply {
        Reply::Value(_) => "VALUE",
        Reply::Stats(_) => "STATS",
        Reply::Status(status) => status.kind.as_str(),
    }
}

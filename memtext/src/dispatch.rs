//! Ordered delivery of replies to the requests that caused them.
//!
//! The server answers pipelined requests in the order it received them, so
//! every decoded reply belongs to the oldest request still waiting. The
//! [`Dispatcher`] is a FIFO of completion handlers: enqueue one per request
//! written, dispatch one per reply decoded.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use protocol_memtext::Reply;
use tracing::{debug, trace, warn};

use crate::Error;
use crate::metrics::{CANCELLED, OUTSTANDING, QUEUE_FULL, REPLIES_DISPATCHED, UNMATCHED_REPLIES};

/// Callback receiving the outcome of one request.
pub type Completion = Box<dyn FnOnce(Result<Reply, Error>)>;

/// Identifies an enqueued request for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

impl RequestId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct Slot {
    id: RequestId,
    // `None` once cancelled. The slot still waits for its reply.
    handler: Option<Completion>,
}

/// FIFO of outstanding request completions.
pub struct Dispatcher {
    slots: VecDeque<Slot>,
    max_queue: usize,
    next_id: u64,
    on_drain: Option<Box<dyn FnMut()>>,
}

impl Dispatcher {
    pub fn new(max_queue: usize) -> Self {
        Self {
            slots: VecDeque::with_capacity(max_queue),
            max_queue,
            next_id: 0,
            on_drain: None,
        }
    }

    /// Number of requests awaiting replies, cancelled ones included.
    pub fn depth(&self) -> usize {
        self.slots.len()
    }

    pub fn max_queue(&self) -> usize {
        self.max_queue
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The request the next reply will be delivered to.
    pub fn oldest(&self) -> Option<RequestId> {
        self.slots.front().map(|slot| slot.id)
    }

    /// Register a callback fired each time the queue empties through
    /// [`dispatch`](Self::dispatch).
    pub fn set_on_drain<F: FnMut() + 'static>(&mut self, f: F) {
        self.on_drain = Some(Box::new(f));
    }

    /// Fails with [`Error::QueueFull`] when another request would exceed
    /// `max_queue`.
    pub fn check_capacity(&self) -> Result<(), Error> {
        if self.slots.len() >= self.max_queue {
            return Err(Error::QueueFull {
                max: self.max_queue,
            });
        }
        Ok(())
    }

    /// Append a completion handler for a request about to be written.
    pub fn enqueue<F>(&mut self, handler: F) -> Result<RequestId, Error>
    where
        F: FnOnce(Result<Reply, Error>) + 'static,
    {
        if let Err(e) = self.check_capacity() {
            QUEUE_FULL.increment();
            debug!(depth = self.slots.len(), "request rejected, queue full");
            return Err(e);
        }
        let id = RequestId(self.next_id);
        self.next_id += 1;
        self.slots.push_back(Slot {
            id,
            handler: Some(Box::new(handler)),
        });
        OUTSTANDING.increment();
        trace!(%id, depth = self.slots.len(), "request enqueued");
        Ok(id)
    }

    /// Deliver a result to the oldest outstanding request.
    ///
    /// Returns the id of the request that was completed. An empty queue
    /// means the server answered more requests than were sent; that is
    /// reported as [`Error::UnmatchedReply`] and the result is dropped.
    pub fn dispatch(&mut self, result: Result<Reply, Error>) -> Result<RequestId, Error> {
        let Some(id) = self.complete_oldest(result) else {
            UNMATCHED_REPLIES.increment();
            warn!("reply received with no outstanding request");
            return Err(Error::UnmatchedReply);
        };
        REPLIES_DISPATCHED.increment();
        if self.slots.is_empty() {
            trace!("queue drained");
            if let Some(on_drain) = self.on_drain.as_mut() {
                on_drain();
            }
        }
        Ok(id)
    }

    /// Deliver an error to the oldest outstanding request without treating
    /// it as a completed exchange. The drain callback does not fire.
    pub fn fail_oldest(&mut self, error: Error) -> Option<RequestId> {
        self.complete_oldest(Err(error))
    }

    /// Fail every outstanding request, oldest first. Returns how many were
    /// failed. The drain callback does not fire.
    pub fn fail_all<F: FnMut() -> Error>(&mut self, mut error: F) -> usize {
        let mut failed = 0;
        while self.complete_oldest(Err(error())).is_some() {
            failed += 1;
        }
        failed
    }

    /// Withdraw interest in a request.
    ///
    /// The handler is dropped without being called, but the request keeps
    /// its place in the queue until its reply arrives. Returns false if the
    /// request is not outstanding or was already cancelled.
    pub fn cancel(&mut self, id: RequestId) -> bool {
        let Some(slot) = self.slots.iter_mut().find(|slot| slot.id == id) else {
            return false;
        };
        let cancelled = slot.handler.take().is_some();
        if cancelled {
            debug!(%id, "request cancelled");
        }
        cancelled
    }

    fn complete_oldest(&mut self, result: Result<Reply, Error>) -> Option<RequestId> {
        let slot = self.slots.pop_front()?;
        OUTSTANDING.decrement();
        match slot.handler {
            Some(handler) => handler(result),
            None => {
                CANCELLED.increment();
                trace!(id = %slot.id, "reply discarded for cancelled request");
            }
        }
        Some(slot.id)
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.fail_all(|| Error::ConnectionClosed);
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("depth", &self.slots.len())
            .field("max_queue", &self.max_queue)
            .field("oldest", &self.oldest())
            .finish()
    }
}

/// A completion slot that can be polled instead of supplying a callback.
///
/// Hand [`completer`](Self::completer) to the dispatcher and keep the
/// `Deferred` to collect the result once the reply has been read.
#[derive(Debug, Clone, Default)]
pub struct Deferred {
    slot: Rc<RefCell<Option<Result<Reply, Error>>>>,
}

impl Deferred {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handler that stores its result in this slot.
    pub fn completer(&self) -> Completion {
        let slot = Rc::clone(&self.slot);
        Box::new(move |result| {
            *slot.borrow_mut() = Some(result);
        })
    }

    pub fn is_complete(&self) -> bool {
        self.slot.borrow().is_some()
    }

    /// Take the result if it has arrived.
    pub fn take(&self) -> Option<Result<Reply, Error>> {
        self.slot.borrow_mut().take()
    }
}

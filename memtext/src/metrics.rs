//! memtext connection metrics.
//!
//! Process-wide counters shared by every connection. Exposed through
//! `metriken` for whatever exporter the application registers.

use metriken::{Counter, Gauge, metric};

// ── Replies ──────────────────────────────────────────────────────

#[metric(
    name = "memtext/replies/dispatched",
    description = "Replies matched to an outstanding request"
)]
pub static REPLIES_DISPATCHED: Counter = Counter::new();

#[metric(name = "memtext/replies/value", description = "VALUE replies decoded")]
pub static REPLIES_VALUE: Counter = Counter::new();

#[metric(name = "memtext/replies/stats", description = "STAT listings decoded")]
pub static REPLIES_STATS: Counter = Counter::new();

#[metric(
    name = "memtext/replies/server_failure",
    description = "ERROR, CLIENT_ERROR and SERVER_ERROR replies"
)]
pub static REPLIES_SERVER_FAILURE: Counter = Counter::new();

// ── Errors ───────────────────────────────────────────────────────

#[metric(
    name = "memtext/errors/framing",
    description = "Reply streams that failed to decode"
)]
pub static FRAMING_ERRORS: Counter = Counter::new();

#[metric(
    name = "memtext/errors/unmatched",
    description = "Replies received with no outstanding request"
)]
pub static UNMATCHED_REPLIES: Counter = Counter::new();

#[metric(
    name = "memtext/errors/queue_full",
    description = "Requests rejected because the queue was full"
)]
pub static QUEUE_FULL: Counter = Counter::new();

// ── Queue ────────────────────────────────────────────────────────

#[metric(
    name = "memtext/requests/cancelled",
    description = "Replies consumed by a cancelled request"
)]
pub static CANCELLED: Counter = Counter::new();

#[metric(
    name = "memtext/requests/outstanding",
    description = "Requests currently awaiting a reply"
)]
pub static OUTSTANDING: Gauge = Gauge::new();

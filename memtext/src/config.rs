use protocol_memtext::ParseOptions;

/// Default bound on requests awaiting replies.
pub const DEFAULT_MAX_QUEUE: usize = 10;

/// Configuration for a single connection.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of requests awaiting replies. Submitting beyond this
    /// fails with [`Error::QueueFull`](crate::Error::QueueFull).
    pub max_queue: usize,
    /// Initial capacity of the receive buffer.
    pub recv_capacity: usize,
    /// Initial capacity of the outbound request buffer.
    pub send_capacity: usize,
    /// Reply decoding options. The connection always turns on
    /// `extended_status`.
    pub parse: ParseOptions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_queue: DEFAULT_MAX_QUEUE,
            recv_capacity: 16 * 1024,
            send_capacity: 16 * 1024,
            parse: ParseOptions::default(),
        }
    }
}

//! Client-side request encoding.
//!
//! Covers the commands whose replies [`FrameDecoder`](crate::FrameDecoder)
//! understands. Keys and values are written as given; validating them is up
//! to the caller.

use bytes::{BufMut, BytesMut};

/// Storage command verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageCommand {
    Set,
    Add,
    Replace,
}

impl StorageCommand {
    fn verb(&self) -> &'static [u8] {
        match self {
            StorageCommand::Set => b"set",
            StorageCommand::Add => b"add",
            StorageCommand::Replace => b"replace",
        }
    }
}

/// A request to be written to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request<'a> {
    /// `get <key>\r\n`
    Get { key: &'a [u8] },
    /// `<verb> <key> <flags> <exptime> <bytes>\r\n<data>\r\n`
    Storage {
        command: StorageCommand,
        key: &'a [u8],
        value: &'a [u8],
        flags: u32,
        exptime: u32,
    },
    /// `delete <key>\r\n`
    Delete { key: &'a [u8] },
    /// `stats [<group>]\r\n`
    Stats { group: Option<&'a [u8]> },
}

impl<'a> Request<'a> {
    #[inline]
    pub fn get(key: &'a [u8]) -> Self {
        Request::Get { key }
    }

    #[inline]
    pub fn set(key: &'a [u8], value: &'a [u8]) -> StorageRequest<'a> {
        StorageRequest::new(StorageCommand::Set, key, value)
    }

    /// Store only if the key does not exist yet.
    #[inline]
    pub fn add(key: &'a [u8], value: &'a [u8]) -> StorageRequest<'a> {
        StorageRequest::new(StorageCommand::Add, key, value)
    }

    /// Store only if the key already exists.
    #[inline]
    pub fn replace(key: &'a [u8], value: &'a [u8]) -> StorageRequest<'a> {
        StorageRequest::new(StorageCommand::Replace, key, value)
    }

    #[inline]
    pub fn delete(key: &'a [u8]) -> Self {
        Request::Delete { key }
    }

    /// General-purpose statistics.
    #[inline]
    pub fn stats() -> Self {
        Request::Stats { group: None }
    }

    /// A statistics group such as `slabs` or `items`.
    #[inline]
    pub fn stats_group(group: &'a [u8]) -> Self {
        Request::Stats { group: Some(group) }
    }

    /// Exact number of bytes [`encode`](Self::encode) will write.
    pub fn encoded_len(&self) -> usize {
        match self {
            Request::Get { key } => 4 + key.len() + 2,
            Request::Storage {
                command,
                key,
                value,
                flags,
                exptime,
            } => {
                command.verb().len()
                    + 1
                    + key.len()
                    + 1
                    + decimal_len(*flags as u64)
                    + 1
                    + decimal_len(*exptime as u64)
                    + 1
                    + decimal_len(value.len() as u64)
                    + 2
                    + value.len()
                    + 2
            }
            Request::Delete { key } => 7 + key.len() + 2,
            Request::Stats { group: None } => 7,
            Request::Stats { group: Some(group) } => 6 + group.len() + 2,
        }
    }

    /// Append the wire form of this request to `buf`.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.reserve(self.encoded_len());
        match self {
            Request::Get { key } => {
                buf.put_slice(b"get ");
                buf.put_slice(key);
            }
            Request::Storage {
                command,
                key,
                value,
                flags,
                exptime,
            } => {
                buf.put_slice(command.verb());
                buf.put_u8(b' ');
                buf.put_slice(key);
                buf.put_u8(b' ');
                put_decimal(buf, *flags as u64);
                buf.put_u8(b' ');
                put_decimal(buf, *exptime as u64);
                buf.put_u8(b' ');
                put_decimal(buf, value.len() as u64);
                buf.put_slice(b"\r\n");
                buf.put_slice(value);
            }
            Request::Delete { key } => {
                buf.put_slice(b"delete ");
                buf.put_slice(key);
            }
            Request::Stats { group } => {
                buf.put_slice(b"stats");
                if let Some(group) = group {
                    buf.put_u8(b' ');
                    buf.put_slice(group);
                }
            }
        }
        buf.put_slice(b"\r\n");
    }
}

/// Builder for storage requests with optional flags and exptime.
#[derive(Debug, Clone)]
pub struct StorageRequest<'a> {
    command: StorageCommand,
    key: &'a [u8],
    value: &'a [u8],
    flags: u32,
    exptime: u32,
}

impl<'a> StorageRequest<'a> {
    fn new(command: StorageCommand, key: &'a [u8], value: &'a [u8]) -> Self {
        Self {
            command,
            key,
            value,
            flags: 0,
            exptime: 0,
        }
    }

    /// Set the flags value.
    #[inline]
    pub fn flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    /// Set the expiration time in seconds.
    #[inline]
    pub fn exptime(mut self, exptime: u32) -> Self {
        self.exptime = exptime;
        self
    }

    #[inline]
    pub fn build(self) -> Request<'a> {
        Request::Storage {
            command: self.command,
            key: self.key,
            value: self.value,
            flags: self.flags,
            exptime: self.exptime,
        }
    }
}

impl<'a> From<StorageRequest<'a>> for Request<'a> {
    fn from(request: StorageRequest<'a>) -> Self {
        request.build()
    }
}

fn decimal_len(mut n: u64) -> usize {
    let mut len = 1;
    while n >= 10 {
        n /= 10;
        len += 1;
    }
    len
}

fn put_decimal(buf: &mut BytesMut, mut n: u64) {
    let mut digits = [0u8; 20];
    let mut pos = digits.len();
    loop {
        pos -= 1;
        digits[pos] = b'0' + (n % 10) as u8;
        n /= 10;
        if n == 0 {
            break;
        }
    }
    buf.put_slice(&digits[pos..]);
}

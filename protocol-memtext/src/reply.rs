//! Decoded memcache replies.
//!
//! A [`Reply`] is the single logical result of one request cycle, however
//! many wire lines it took to build:
//! - `VALUE <key> <flags> <bytes>\r\n<data>\r\nEND\r\n` - [`Reply::Value`]
//! - `STAT <name> <value>\r\n ... END\r\n` - [`Reply::Stats`]
//! - `END`, `STORED`, `DELETED`, `ERROR`, `CLIENT_ERROR <msg>`,
//!   `SERVER_ERROR <msg>` - [`Reply::Status`]

use bytes::Bytes;

/// A single value delivered by a GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueReply {
    pub key: Bytes,
    pub flags: u32,
    pub data: Bytes,
}

/// Statistics accumulated from a run of `STAT` lines.
///
/// Entries keep first-seen order. A name reported twice keeps its original
/// position and takes the later value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stats {
    entries: Vec<(String, String)>,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite an entry.
    pub fn insert(&mut self, name: String, value: String) {
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Look up a statistic by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

/// The status token that ended a request cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusKind {
    /// `END` with nothing accumulated (cache miss or empty listing).
    End,
    Stored,
    Deleted,
    /// Unknown command.
    Error,
    ClientError,
    ServerError,
    // Only recognized with `ParseOptions::extended_status`.
    NotStored,
    NotFound,
    Exists,
    Ok,
    Touched,
}

impl StatusKind {
    /// Classify a reply token.
    ///
    /// `extended` enables the status words beyond the core grammar.
    pub fn from_token(token: &[u8], extended: bool) -> Option<Self> {
        let kind = match token {
            b"END" => StatusKind::End,
            b"STORED" => StatusKind::Stored,
            b"DELETED" => StatusKind::Deleted,
            b"ERROR" => StatusKind::Error,
            b"CLIENT_ERROR" => StatusKind::ClientError,
            b"SERVER_ERROR" => StatusKind::ServerError,
            _ if !extended => return None,
            b"NOT_STORED" => StatusKind::NotStored,
            b"NOT_FOUND" => StatusKind::NotFound,
            b"EXISTS" => StatusKind::Exists,
            b"OK" => StatusKind::Ok,
            b"TOUCHED" => StatusKind::Touched,
            _ => return None,
        };
        Some(kind)
    }

    /// Whether this status acknowledges success.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            StatusKind::End
                | StatusKind::Stored
                | StatusKind::Deleted
                | StatusKind::Ok
                | StatusKind::Touched
        )
    }

    /// The wire token for this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusKind::End => "END",
            StatusKind::Stored => "STORED",
            StatusKind::Deleted => "DELETED",
            StatusKind::Error => "ERROR",
            StatusKind::ClientError => "CLIENT_ERROR",
            StatusKind::ServerError => "SERVER_ERROR",
            StatusKind::NotStored => "NOT_STORED",
            StatusKind::NotFound => "NOT_FOUND",
            StatusKind::Exists => "EXISTS",
            StatusKind::Ok => "OK",
            StatusKind::Touched => "TOUCHED",
        }
    }
}

/// A simple acknowledgement or server-reported failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReply {
    pub kind: StatusKind,
    pub ok: bool,
    /// Text following the status token, if the server sent any.
    pub message: Option<String>,
}

impl StatusReply {
    pub fn new(kind: StatusKind, message: Option<String>) -> Self {
        Self {
            kind,
            ok: kind.is_success(),
            message,
        }
    }
}

/// The aggregate result of one request cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Value(ValueReply),
    Stats(Stats),
    Status(StatusReply),
}

impl Reply {
    /// Returns false only for server-reported failures.
    pub fn is_ok(&self) -> bool {
        match self {
            Reply::Status(status) => status.ok,
            _ => true,
        }
    }

    /// Returns true for an `END` that carried no value or stats.
    pub fn is_miss(&self) -> bool {
        matches!(
            self,
            Reply::Status(StatusReply {
                kind: StatusKind::End,
                ..
            })
        )
    }

    pub fn as_value(&self) -> Option<&ValueReply> {
        match self {
            Reply::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_stats(&self) -> Option<&Stats> {
        match self {
            Reply::Stats(stats) => Some(stats),
            _ => None,
        }
    }

    pub fn as_status(&self) -> Option<&StatusReply> {
        match self {
            Reply::Status(status) => Some(status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_keep_first_seen_order() {
        let mut stats = Stats::new();
        stats.insert("b".into(), "1".into());
        stats.insert("a".into(), "2".into());
        stats.insert("b".into(), "3".into());
        assert_eq!(stats.len(), 2);
        assert_eq!(stats.get("b"), Some("3"));
        let names: Vec<_> = stats.iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["b", "a"]);
        assert_eq!(stats.get("missing"), None);
    }

    #[test]
    fn core_tokens() {
        assert_eq!(StatusKind::from_token(b"END", false), Some(StatusKind::End));
        assert_eq!(
            StatusKind::from_token(b"SERVER_ERROR", false),
            Some(StatusKind::ServerError)
        );
        assert_eq!(StatusKind::from_token(b"NOT_FOUND", false), None);
        assert_eq!(StatusKind::from_token(b"end", false), None);
    }

    #[test]
    fn extended_tokens() {
        assert_eq!(
            StatusKind::from_token(b"NOT_FOUND", true),
            Some(StatusKind::NotFound)
        );
        assert_eq!(StatusKind::from_token(b"OK", true), Some(StatusKind::Ok));
        assert_eq!(StatusKind::from_token(b"STORED", true), Some(StatusKind::Stored));
        assert_eq!(StatusKind::from_token(b"VERSION", true), None);
    }

    #[test]
    fn success_classification() {
        assert!(StatusReply::new(StatusKind::Stored, None).ok);
        assert!(StatusReply::new(StatusKind::Deleted, None).ok);
        assert!(!StatusReply::new(StatusKind::Error, None).ok);
        assert!(!StatusReply::new(StatusKind::ClientError, Some("bad".into())).ok);
        assert!(!StatusReply::new(StatusKind::NotStored, None).ok);
    }

    #[test]
    fn reply_helpers() {
        let miss = Reply::Status(StatusReply::new(StatusKind::End, None));
        assert!(miss.is_miss());
        assert!(miss.is_ok());

        let stored = Reply::Status(StatusReply::new(StatusKind::Stored, None));
        assert!(!stored.is_miss());

        let failed = Reply::Status(StatusReply::new(StatusKind::ServerError, None));
        assert!(!failed.is_ok());

        let value = Reply::Value(ValueReply {
            key: Bytes::from_static(b"k"),
            flags: 0,
            data: Bytes::from_static(b"v"),
        });
        assert!(value.is_ok());
        assert_eq!(value.as_value().unwrap().data.as_ref(), b"v");
        assert!(value.as_stats().is_none());
    }
}

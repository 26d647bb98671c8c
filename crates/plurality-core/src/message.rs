//! Log messages and assertions
//!
//! A [`RawMessage`] is what the log hands back from a query. An
//! [`Assertion`] is the (author, key, payload) triple the aggregation
//! engine folds over, projected out of a raw message for one key.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Content, FeedId, MsgId, Payload};

/// Position in the log's total order.
///
/// "Latest" always means highest position; wall-clock timestamps play no part.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct LogPosition(pub u64);

impl LogPosition {
    pub const ZERO: LogPosition = LogPosition(0);

    #[inline]
    pub fn new(pos: u64) -> Self {
        LogPosition(pos)
    }

    #[inline]
    pub fn next(self) -> Self {
        LogPosition(self.0 + 1)
    }
}

impl fmt::Debug for LogPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pos({})", self.0)
    }
}

/// A message as stored in the log
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawMessage {
    pub key: MsgId,
    pub author: FeedId,
    pub position: LogPosition,
    pub content: Option<Content>,
}

impl RawMessage {
    /// The `type` field of the content, if any
    pub fn content_type(&self) -> Option<&str> {
        self.content.as_ref()?.get("type")?.as_str()
    }

    /// Does `content[field]` point at `dest`, either directly or as `{ link: dest }`?
    pub fn targets(&self, field: &str, dest: &str) -> bool {
        let Some(target) = self.content.as_ref().and_then(|c| c.get(field)) else {
            return false;
        };

        match target {
            Value::String(s) => s == dest,
            Value::Object(obj) => obj.get("link").and_then(Value::as_str) == Some(dest),
            _ => false,
        }
    }

    /// Project the assertion this message makes about `key`, if any
    pub fn assertion(&self, key: &str) -> Option<Assertion> {
        let payload = Payload::extract(self.content.as_ref()?, key)?;
        Some(Assertion {
            author: self.author.clone(),
            key: key.to_owned(),
            payload,
            position: self.position,
        })
    }
}

/// One author's claim (or retraction) of a value for a key
#[derive(Clone, Debug, PartialEq)]
pub struct Assertion {
    pub author: FeedId,
    pub key: String,
    pub payload: Payload,
    pub position: LogPosition,
}

impl Assertion {
    pub fn new(author: FeedId, key: impl Into<String>, payload: Payload, position: LogPosition) -> Self {
        Assertion {
            author,
            key: key.into(),
            payload,
            position,
        }
    }

    #[inline]
    pub fn is_tombstone(&self) -> bool {
        self.payload.is_tombstone()
    }
}

/// An item of a log query
#[derive(Clone, Debug, PartialEq)]
pub enum LogEvent {
    Message(RawMessage),
    /// Phase marker: backlog exhausted, everything after this is live
    Synced,
}

impl LogEvent {
    #[inline]
    pub fn is_synced(&self) -> bool {
        matches!(self, LogEvent::Synced)
    }

    pub fn message(&self) -> Option<&RawMessage> {
        match self {
            LogEvent::Message(msg) => Some(msg),
            LogEvent::Synced => None,
        }
    }
}

//! Reference types
//!
//! Every identifier in the log is a sigil-prefixed, base64 encoded 32-byte
//! body with a type suffix:
//! - `@<body>.ed25519` - a feed (author)
//! - `%<body>.sha256` - a message
//! - `&<body>.sha256` - a blob

use std::borrow::Borrow;
use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::{IndexError, IndexResult};

/// Decoded size of every reference body
pub const REF_BODY_LEN: usize = 32;

/// Reference classification
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RefKind {
    Feed,
    Message,
    Blob,
}

impl RefKind {
    #[inline]
    pub fn sigil(self) -> char {
        match self {
            RefKind::Feed => '@',
            RefKind::Message => '%',
            RefKind::Blob => '&',
        }
    }

    #[inline]
    pub fn suffix(self) -> &'static str {
        match self {
            RefKind::Feed => "ed25519",
            RefKind::Message | RefKind::Blob => "sha256",
        }
    }

    /// Classify a reference string, or `None` if it is not a well-formed reference
    pub fn classify(s: &str) -> Option<RefKind> {
        let kind = match s.chars().next()? {
            '@' => RefKind::Feed,
            '%' => RefKind::Message,
            '&' => RefKind::Blob,
            _ => return None,
        };

        let (body, suffix) = s[1..].rsplit_once('.')?;
        if suffix != kind.suffix() {
            return None;
        }

        let decoded = STANDARD.decode(body).ok()?;
        (decoded.len() == REF_BODY_LEN).then_some(kind)
    }

    /// Encode raw bytes as a reference of this kind
    pub fn encode(self, bytes: &[u8; REF_BODY_LEN]) -> String {
        format!("{}{}.{}", self.sigil(), STANDARD.encode(bytes), self.suffix())
    }
}

/// Is this string a valid feed, message or blob reference?
#[inline]
pub fn is_link(s: &str) -> bool {
    RefKind::classify(s).is_some()
}

#[inline]
pub fn is_feed(s: &str) -> bool {
    RefKind::classify(s) == Some(RefKind::Feed)
}

#[inline]
pub fn is_msg(s: &str) -> bool {
    RefKind::classify(s) == Some(RefKind::Message)
}

/// Feed identity - the author of messages in the log
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeedId(String);

impl FeedId {
    /// Parse and validate a feed reference
    pub fn parse(s: &str) -> IndexResult<Self> {
        if is_feed(s) {
            Ok(FeedId(s.to_owned()))
        } else {
            Err(IndexError::InvalidRef(s.to_owned()))
        }
    }

    /// Build a feed reference from a public key
    pub fn from_public_key(key: &[u8; REF_BODY_LEN]) -> Self {
        FeedId(RefKind::Feed.encode(key))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for FeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Feed({})", short(&self.0))
    }
}

impl fmt::Display for FeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for FeedId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// Lets author-keyed maps be probed with identifiers that never parsed as feeds.
impl Borrow<str> for FeedId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Message identity - content hash of a log entry
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MsgId(String);

impl MsgId {
    /// Parse and validate a message reference
    pub fn parse(s: &str) -> IndexResult<Self> {
        if is_msg(s) {
            Ok(MsgId(s.to_owned()))
        } else {
            Err(IndexError::InvalidRef(s.to_owned()))
        }
    }

    /// Build a message reference from a content hash
    pub fn from_hash(hash: &[u8; REF_BODY_LEN]) -> Self {
        MsgId(RefKind::Message.encode(hash))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for MsgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Msg({})", short(&self.0))
    }
}

impl fmt::Display for MsgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for MsgId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The entity an assertion is about.
///
/// A destination names either an author directly, a message (whose author
/// owns it), or something else entirely (a blob, a hashtag, a free string)
/// which has no owning author.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Destination {
    Feed(FeedId),
    Message(MsgId),
    Other(String),
}

impl Destination {
    pub fn classify(s: &str) -> Self {
        match RefKind::classify(s) {
            Some(RefKind::Feed) => Destination::Feed(FeedId(s.to_owned())),
            Some(RefKind::Message) => Destination::Message(MsgId(s.to_owned())),
            _ => Destination::Other(s.to_owned()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Destination::Feed(id) => id.as_str(),
            Destination::Message(id) => id.as_str(),
            Destination::Other(s) => s,
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn short(s: &str) -> &str {
    s.get(..9).unwrap_or(s)
}

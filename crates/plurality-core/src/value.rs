//! Assertion payloads
//!
//! Message content is a JSON object. The value an author asserts for a key
//! is whatever JSON sits under that key, except that an object carrying a
//! truthy `remove` field retracts the author's earlier assertion instead.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::is_link;

/// Message content
pub type Content = Map<String, Value>;

/// JSON truthiness: `null`, `false`, `0` and `""` are falsy, everything else is truthy
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Does this JSON value mark a retraction?
pub fn is_tombstone(value: &Value) -> bool {
    value
        .as_object()
        .and_then(|o| o.get("remove"))
        .is_some_and(is_truthy)
}

/// One author's payload for a key: a value or a retraction
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    Value(Value),
    Tombstone,
}

impl Payload {
    /// Classify a raw JSON value
    pub fn from_value(value: Value) -> Self {
        if is_tombstone(&value) {
            Payload::Tombstone
        } else {
            Payload::Value(value)
        }
    }

    /// Extract the payload for `key` from message content.
    ///
    /// Absent and falsy values yield `None`; the message asserts nothing
    /// about that key.
    pub fn extract(content: &Content, key: &str) -> Option<Self> {
        content
            .get(key)
            .filter(|v| is_truthy(v))
            .map(|v| Payload::from_value(v.clone()))
    }

    #[inline]
    pub fn is_tombstone(&self) -> bool {
        matches!(self, Payload::Tombstone)
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Payload::Value(v) => Some(v),
            Payload::Tombstone => None,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Payload::Value(v) => Some(v),
            Payload::Tombstone => None,
        }
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::from_value(value)
    }
}

/// Normalize a value into the form used for vote counting.
///
/// Strings count as themselves. A `{ link }` object counts as its link when
/// the link is a valid reference. Everything else does not vote.
pub fn comparable(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s),
        Value::Object(obj) if !is_tombstone(value) => obj
            .get("link")
            .and_then(Value::as_str)
            .filter(|link| is_link(link)),
        _ => None,
    }
}

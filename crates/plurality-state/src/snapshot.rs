//! Aggregate snapshot - every author's live value for one key

use indexmap::IndexMap;
use serde_json::Value;

use plurality_core::{Assertion, FeedId, Payload};

/// Mapping from author to their currently live value.
///
/// An author is present iff their latest assertion was not a tombstone.
/// Iteration follows first-insertion order; overwriting keeps an author's
/// slot, retracting and re-asserting moves it to the end.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AggregateSnapshot {
    entries: IndexMap<FeedId, Value>,
}

impl AggregateSnapshot {
    pub fn new() -> Self {
        AggregateSnapshot::default()
    }

    /// Get an author's value
    pub fn get(&self, author: &str) -> Option<&Value> {
        self.entries.get(author)
    }

    pub fn contains(&self, author: &str) -> bool {
        self.entries.contains_key(author)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&FeedId, &Value)> {
        self.entries.iter()
    }

    pub fn authors(&self) -> impl Iterator<Item = &FeedId> {
        self.entries.keys()
    }

    /// Insert or overwrite an author's value
    pub fn insert(&mut self, author: FeedId, value: Value) -> Option<Value> {
        self.entries.insert(author, value)
    }

    /// Remove an author's value. Removing an absent author is a no-op.
    pub fn remove(&mut self, author: &str) -> Option<Value> {
        self.entries.shift_remove(author)
    }

    /// Apply one author's payload with the snapshot update rule
    pub fn apply(&mut self, author: &FeedId, payload: &Payload) {
        match payload {
            Payload::Value(value) => {
                self.insert(author.clone(), value.clone());
            }
            Payload::Tombstone => {
                self.remove(author.as_str());
            }
        }
    }

    /// Apply an assertion
    pub fn apply_assertion(&mut self, assertion: &Assertion) {
        self.apply(&assertion.author, &assertion.payload);
    }

    /// Merge a stream update into this snapshot
    pub fn merge(&mut self, update: &AggregateUpdate) {
        match update {
            AggregateUpdate::Snapshot(snapshot) => {
                for (author, value) in snapshot.iter() {
                    self.insert(author.clone(), value.clone());
                }
            }
            AggregateUpdate::Delta { author, payload } => self.apply(author, payload),
        }
    }

    pub fn into_inner(self) -> IndexMap<FeedId, Value> {
        self.entries
    }
}

impl FromIterator<(FeedId, Value)> for AggregateSnapshot {
    fn from_iter<I: IntoIterator<Item = (FeedId, Value)>>(iter: I) -> Self {
        AggregateSnapshot {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a AggregateSnapshot {
    type Item = (&'a FeedId, &'a Value);
    type IntoIter = indexmap::map::Iter<'a, FeedId, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Item of a live aggregate stream.
///
/// The first item is always the snapshot accumulated over the backlog;
/// every later item is a single-author delta.
#[derive(Clone, Debug, PartialEq)]
pub enum AggregateUpdate {
    Snapshot(AggregateSnapshot),
    Delta { author: FeedId, payload: Payload },
}

impl AggregateUpdate {
    #[inline]
    pub fn is_snapshot(&self) -> bool {
        matches!(self, AggregateUpdate::Snapshot(_))
    }
}

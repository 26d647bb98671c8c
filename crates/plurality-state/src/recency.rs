//! Recency tracking for "latest value" semantics
//!
//! "Latest" is the value of the author who most recently asserted something
//! they have not since retracted. A retraction therefore falls back to the
//! next most recent live author instead of clearing the answer.

use serde_json::Value;

use plurality_core::{Assertion, FeedId, LogEvent, Payload};

use crate::{AggregateSnapshot, Phase};

/// Authors ordered by ascending recency of their last live assertion,
/// alongside the values they asserted.
#[derive(Clone, Debug, Default)]
pub struct RecencyTracker {
    /// No duplicates; the last element is the most recent live author
    authors: Vec<FeedId>,
    snapshot: AggregateSnapshot,
}

impl RecencyTracker {
    pub fn new() -> Self {
        RecencyTracker::default()
    }

    /// Record a live assertion: the author moves to the most recent slot
    pub fn record_assertion(&mut self, author: FeedId, value: Value) {
        self.forget(&author);
        self.authors.push(author.clone());
        self.snapshot.insert(author, value);
    }

    /// Record a retraction: the author drops out entirely
    pub fn record_tombstone(&mut self, author: &FeedId) {
        self.forget(author);
        self.snapshot.remove(author.as_str());
    }

    pub fn record(&mut self, assertion: &Assertion) {
        match &assertion.payload {
            Payload::Value(value) => self.record_assertion(assertion.author.clone(), value.clone()),
            Payload::Tombstone => self.record_tombstone(&assertion.author),
        }
    }

    /// Value of the most recent live author, or `None` when nobody has one
    pub fn current_latest(&self) -> Option<&Value> {
        self.snapshot.get(self.authors.last()?.as_str())
    }

    pub fn latest_author(&self) -> Option<&FeedId> {
        self.authors.last()
    }

    /// Authors from least to most recent
    pub fn authors(&self) -> &[FeedId] {
        &self.authors
    }

    pub fn snapshot(&self) -> &AggregateSnapshot {
        &self.snapshot
    }

    pub fn len(&self) -> usize {
        self.authors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.authors.is_empty()
    }

    fn forget(&mut self, author: &FeedId) {
        if let Some(index) = self.authors.iter().position(|a| a == author) {
            self.authors.remove(index);
        }
    }
}

/// Streaming fold for the latest value of one key.
///
/// Backlog assertions feed the tracker silently. The phase marker emits the
/// current latest value; every live assertion after it emits the updated one.
#[derive(Debug)]
pub struct LatestFold {
    key: String,
    phase: Phase,
    tracker: RecencyTracker,
}

impl LatestFold {
    pub fn new(key: impl Into<String>) -> Self {
        LatestFold {
            key: key.into(),
            phase: Phase::Backlog,
            tracker: RecencyTracker::new(),
        }
    }

    /// Feed one log event.
    ///
    /// The outer `Option` says whether anything is emitted; the inner one is
    /// the latest value, which may be absent.
    pub fn step(&mut self, event: &LogEvent) -> Option<Option<Value>> {
        match event {
            LogEvent::Synced => {
                if self.phase == Phase::Live {
                    return None;
                }
                self.phase = Phase::Live;
                tracing::debug!(
                    key = %self.key,
                    authors = self.tracker.len(),
                    "latest value backlog synced"
                );
                Some(self.tracker.current_latest().cloned())
            }
            LogEvent::Message(msg) => {
                let assertion = msg.assertion(&self.key)?;
                self.tracker.record(&assertion);
                match self.phase {
                    Phase::Backlog => None,
                    Phase::Live => Some(self.tracker.current_latest().cloned()),
                }
            }
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn tracker(&self) -> &RecencyTracker {
        &self.tracker
    }
}

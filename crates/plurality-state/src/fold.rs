//! Aggregate fold - the streaming reducer over one key's assertions
//!
//! Two modes share the same snapshot update rule:
//! - Snapshot mode: accumulate the backlog and hand back one final snapshot
//! - Streaming mode: accumulate the backlog silently, emit the snapshot at
//!   the phase marker, then emit every live assertion as a single delta

use plurality_core::{Assertion, FeedId, LogEvent, RawMessage};

use crate::{AggregateSnapshot, AggregateUpdate};

/// Which side of the phase marker a stream is on
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Backlog,
    Live,
}

/// Counters for one fold
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FoldStats {
    /// Messages carrying no assertion for the key
    pub skipped: u64,
    pub asserted: u64,
    pub retracted: u64,
    /// Live assertions emitted as deltas
    pub deltas: u64,
}

/// Streaming reducer for one key.
///
/// The fold owns its snapshot for the lifetime of one query; nothing is
/// shared between queries.
#[derive(Debug)]
pub struct AggregateFold {
    key: String,
    phase: Phase,
    snapshot: AggregateSnapshot,
    stats: FoldStats,
}

impl AggregateFold {
    pub fn new(key: impl Into<String>) -> Self {
        AggregateFold {
            key: key.into(),
            phase: Phase::Backlog,
            snapshot: AggregateSnapshot::new(),
            stats: FoldStats::default(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn stats(&self) -> &FoldStats {
        &self.stats
    }

    /// Snapshot accumulated so far (empty once handed out at the phase marker)
    pub fn snapshot(&self) -> &AggregateSnapshot {
        &self.snapshot
    }

    /// Snapshot mode: fold one backlog message into the snapshot
    pub fn accumulate(&mut self, msg: &RawMessage) {
        match msg.assertion(&self.key) {
            Some(assertion) => self.apply(&assertion),
            None => self.stats.skipped += 1,
        }
    }

    /// Snapshot mode: the final snapshot
    pub fn finish(self) -> AggregateSnapshot {
        tracing::debug!(
            key = %self.key,
            authors = self.snapshot.len(),
            asserted = self.stats.asserted,
            retracted = self.stats.retracted,
            "aggregate fold finished"
        );
        self.snapshot
    }

    /// Streaming mode: feed one log event, returning what to emit (if anything)
    pub fn step(&mut self, event: &LogEvent) -> Option<AggregateUpdate> {
        match event {
            LogEvent::Synced => {
                if self.phase == Phase::Live {
                    // Only the first marker carries the backlog
                    return None;
                }
                self.phase = Phase::Live;
                tracing::debug!(
                    key = %self.key,
                    authors = self.snapshot.len(),
                    "aggregate backlog synced"
                );
                Some(AggregateUpdate::Snapshot(std::mem::take(&mut self.snapshot)))
            }
            LogEvent::Message(msg) => {
                let Some(assertion) = msg.assertion(&self.key) else {
                    self.stats.skipped += 1;
                    return None;
                };

                match self.phase {
                    Phase::Backlog => {
                        self.apply(&assertion);
                        None
                    }
                    Phase::Live => {
                        self.stats.deltas += 1;
                        Some(AggregateUpdate::Delta {
                            author: assertion.author,
                            payload: assertion.payload,
                        })
                    }
                }
            }
        }
    }

    fn apply(&mut self, assertion: &Assertion) {
        tracing::trace!(
            key = %self.key,
            author = ?assertion.author,
            position = ?assertion.position,
            tombstone = assertion.is_tombstone(),
            "apply assertion"
        );
        if assertion.is_tombstone() {
            self.stats.retracted += 1;
        } else {
            self.stats.asserted += 1;
        }
        self.snapshot.apply_assertion(assertion);
    }
}

/// Follows a snapshot-then-deltas stream, keeping the running snapshot.
///
/// Stream consumers that need the whole picture after every item (the
/// resolved-value and single-author streams) merge through this.
#[derive(Clone, Debug, Default)]
pub struct RunningSnapshot {
    snapshot: AggregateSnapshot,
}

impl RunningSnapshot {
    pub fn new() -> Self {
        RunningSnapshot::default()
    }

    /// Merge one stream item and return the updated snapshot
    pub fn merge(&mut self, update: &AggregateUpdate) -> &AggregateSnapshot {
        self.snapshot.merge(update);
        &self.snapshot
    }

    /// Value currently held by one author
    pub fn value_of(&self, author: &FeedId) -> Option<&serde_json::Value> {
        self.snapshot.get(author.as_str())
    }

    pub fn snapshot(&self) -> &AggregateSnapshot {
        &self.snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plurality_core::{LogPosition, MsgId, Payload};
    use serde_json::{json, Value};

    fn feed(n: u8) -> FeedId {
        FeedId::from_public_key(&[n; 32])
    }

    fn message(author: u8, pos: u64, content: Value) -> RawMessage {
        RawMessage {
            key: MsgId::from_hash(&[pos as u8; 32]),
            author: feed(author),
            position: LogPosition::new(pos),
            content: content.as_object().cloned(),
        }
    }

    fn name(author: u8, pos: u64, value: Value) -> LogEvent {
        LogEvent::Message(message(author, pos, json!({ "type": "about", "name": value })))
    }

    #[test]
    fn test_snapshot_mode_last_writer_wins() {
        let mut fold = AggregateFold::new("name");
        fold.accumulate(&message(1, 1, json!({ "name": "a" })));
        fold.accumulate(&message(2, 2, json!({ "name": "b" })));
        fold.accumulate(&message(1, 3, json!({ "name": "c" })));
        fold.accumulate(&message(3, 4, json!({ "image": "x" })));

        assert_eq!(fold.stats().skipped, 1);
        let snapshot = fold.finish();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get(feed(1).as_str()), Some(&json!("c")));
        assert_eq!(snapshot.get(feed(2).as_str()), Some(&json!("b")));
    }

    #[test]
    fn test_snapshot_mode_tombstone() {
        let mut fold = AggregateFold::new("name");
        fold.accumulate(&message(1, 1, json!({ "name": "a" })));
        fold.accumulate(&message(1, 2, json!({ "name": { "remove": true } })));
        fold.accumulate(&message(2, 3, json!({ "name": { "remove": true } })));

        assert!(fold.finish().is_empty());
    }

    #[test]
    fn test_streaming_backlog_is_silent() {
        let mut fold = AggregateFold::new("name");
        assert_eq!(fold.step(&name(1, 1, json!("a"))), None);
        assert_eq!(fold.step(&name(2, 2, json!("b"))), None);
        assert_eq!(fold.phase(), Phase::Backlog);

        let Some(AggregateUpdate::Snapshot(snapshot)) = fold.step(&LogEvent::Synced) else {
            panic!("expected snapshot at phase marker");
        };
        assert_eq!(snapshot.len(), 2);
        assert_eq!(fold.phase(), Phase::Live);
        assert!(fold.snapshot().is_empty());
    }

    #[test]
    fn test_streaming_live_deltas() {
        let mut fold = AggregateFold::new("name");
        fold.step(&name(1, 1, json!("a")));
        fold.step(&LogEvent::Synced);

        assert_eq!(
            fold.step(&name(2, 2, json!("b"))),
            Some(AggregateUpdate::Delta {
                author: feed(2),
                payload: Payload::Value(json!("b")),
            })
        );
        assert_eq!(
            fold.step(&name(1, 3, json!({ "remove": true }))),
            Some(AggregateUpdate::Delta {
                author: feed(1),
                payload: Payload::Tombstone,
            })
        );
        assert_eq!(fold.step(&name(3, 4, json!(""))), None);
        assert_eq!(fold.stats().deltas, 2);
    }

    #[test]
    fn test_second_marker_ignored() {
        let mut fold = AggregateFold::new("name");
        assert!(fold.step(&LogEvent::Synced).is_some());
        assert!(fold.step(&LogEvent::Synced).is_none());
    }

    #[test]
    fn test_running_snapshot_matches_point_fold() {
        let events = vec![
            name(1, 1, json!("a")),
            name(2, 2, json!("b")),
            LogEvent::Synced,
            name(1, 3, json!({ "remove": true })),
            name(3, 4, json!("c")),
            name(2, 5, json!("d")),
        ];

        let mut fold = AggregateFold::new("name");
        let mut running = RunningSnapshot::new();
        for event in &events {
            if let Some(update) = fold.step(event) {
                running.merge(&update);
            }
        }

        let mut point = AggregateFold::new("name");
        for msg in events.iter().filter_map(LogEvent::message) {
            point.accumulate(msg);
        }

        assert_eq!(
            running.snapshot().iter().collect::<std::collections::HashMap<_, _>>(),
            point.finish().iter().collect::<std::collections::HashMap<_, _>>()
        );
        assert_eq!(running.value_of(&feed(2)), Some(&json!("d")));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        /// (author, value index or tombstone) pairs; values drawn from a tiny alphabet
        fn assertions() -> impl Strategy<Value = Vec<(u8, Option<u8>)>> {
            prop::collection::vec((0u8..5, prop::option::weighted(0.8, 0u8..4)), 0..60)
        }

        fn to_event(pos: usize, (author, value): (u8, Option<u8>)) -> LogEvent {
            let payload = match value {
                Some(v) => json!(format!("v{v}")),
                None => json!({ "remove": true }),
            };
            name(author, pos as u64 + 1, payload)
        }

        proptest! {
            #[test]
            fn prop_last_writer_wins(seq in assertions()) {
                let mut fold = AggregateFold::new("name");
                for (pos, item) in seq.iter().enumerate() {
                    if let LogEvent::Message(msg) = to_event(pos, *item) {
                        fold.accumulate(&msg);
                    }
                }
                let snapshot = fold.finish();

                for author in 0u8..5 {
                    let last = seq.iter().rev().find(|(a, _)| *a == author);
                    let expected = match last {
                        Some((_, Some(v))) => Some(json!(format!("v{v}"))),
                        _ => None,
                    };
                    prop_assert_eq!(snapshot.get(feed(author).as_str()).cloned(), expected);
                }
            }

            #[test]
            fn prop_snapshot_delta_equivalence(seq in assertions(), split in 0usize..60) {
                let split = split.min(seq.len());
                let mut events: Vec<LogEvent> =
                    seq.iter().enumerate().map(|(pos, item)| to_event(pos, *item)).collect();
                events.insert(split, LogEvent::Synced);

                let mut fold = AggregateFold::new("name");
                let mut running = RunningSnapshot::new();
                for event in &events {
                    if let Some(update) = fold.step(event) {
                        running.merge(&update);
                    }
                }

                let mut point = AggregateFold::new("name");
                for msg in events.iter().filter_map(LogEvent::message) {
                    point.accumulate(msg);
                }

                prop_assert_eq!(running.snapshot(), &point.finish());
            }

            #[test]
            fn prop_tombstone_idempotent(seq in assertions(), author in 0u8..5) {
                let mut snapshot = AggregateSnapshot::new();
                for (a, v) in &seq {
                    let payload = match v {
                        Some(v) => Payload::Value(json!(v)),
                        None => Payload::Tombstone,
                    };
                    snapshot.apply(&feed(*a), &payload);
                }

                snapshot.apply(&feed(author), &Payload::Tombstone);
                let once = snapshot.clone();
                snapshot.apply(&feed(author), &Payload::Tombstone);
                prop_assert_eq!(snapshot, once);
            }
        }
    }
}

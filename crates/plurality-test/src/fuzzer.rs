//! Assertion Fuzzer - Randomized validation of the aggregation engine
//!
//! Tests:
//! - Snapshot/delta equivalence between point and streaming folds
//! - Last-writer-wins per author
//! - Latest value falling back past retractions
//! - Resolver precedence and plurality maximality

use std::collections::{HashMap, HashSet};

use plurality_core::{comparable, Content, FeedId, LogEvent, LogPosition, MsgId, Payload, RawMessage};
use plurality_state::{resolve, AggregateFold, AggregateSnapshot, LatestFold, RunningSnapshot};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};

/// Key every generated assertion is about
pub const FUZZ_KEY: &str = "name";

/// Fuzzer configuration
#[derive(Clone, Debug)]
pub struct FuzzerConfig {
    /// Number of asserting authors
    pub author_count: usize,
    /// Size of the string value pool
    pub value_count: usize,
    /// Number of messages to generate
    pub event_count: usize,
    /// Probability an assertion is a retraction
    pub tombstone_prob: f64,
    /// Probability a message carries nothing usable for the key
    pub noise_prob: f64,
    /// Share of messages delivered after the phase marker
    pub live_fraction: f64,
    /// Random seed
    pub seed: u64,
}

impl Default for FuzzerConfig {
    fn default() -> Self {
        FuzzerConfig {
            author_count: 5,
            value_count: 4,
            event_count: 1000,
            tombstone_prob: 0.2,
            noise_prob: 0.1,
            live_fraction: 0.5,
            seed: 42,
        }
    }
}

impl FuzzerConfig {
    /// Light fuzzing for quick tests
    pub fn light() -> Self {
        FuzzerConfig {
            author_count: 3,
            value_count: 3,
            event_count: 100,
            tombstone_prob: 0.2,
            noise_prob: 0.1,
            live_fraction: 0.5,
            seed: 42,
        }
    }

    /// Heavy fuzzing for thorough testing
    pub fn heavy() -> Self {
        FuzzerConfig {
            author_count: 20,
            value_count: 8,
            event_count: 5000,
            tombstone_prob: 0.3,
            noise_prob: 0.2,
            live_fraction: 0.7,
            seed: 42,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Randomized assertion sequences about one destination
pub struct AssertionFuzzer {
    config: FuzzerConfig,
    authors: Vec<FeedId>,
    dest: FeedId,
    rng: StdRng,
}

impl AssertionFuzzer {
    pub fn new(config: FuzzerConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        let authors = (0..config.author_count.max(1))
            .map(|i| FeedId::from_public_key(&[i as u8 + 1; 32]))
            .collect();

        AssertionFuzzer {
            config,
            authors,
            dest: FeedId::from_public_key(&[0u8; 32]),
            rng,
        }
    }

    pub fn authors(&self) -> &[FeedId] {
        &self.authors
    }

    /// Generate one message at `position`
    fn generate_message(&mut self, position: u64) -> RawMessage {
        let author = self.authors[self.rng.gen_range(0..self.authors.len())].clone();

        let payload = if self.rng.gen::<f64>() < self.config.noise_prob {
            self.generate_noise()
        } else if self.rng.gen::<f64>() < self.config.tombstone_prob {
            Some(json!({ "remove": true }))
        } else {
            Some(self.generate_value())
        };

        let mut content = Content::new();
        content.insert("type".to_owned(), json!("about"));
        content.insert("about".to_owned(), json!(self.dest.as_str()));
        if let Some(payload) = payload {
            content.insert(FUZZ_KEY.to_owned(), payload);
        }

        let mut hash = [0u8; 32];
        hash[..8].copy_from_slice(&position.to_be_bytes());

        RawMessage {
            key: MsgId::from_hash(&hash),
            author,
            position: LogPosition::new(position),
            content: Some(content),
        }
    }

    /// A value the engine must treat as "no assertion"
    fn generate_noise(&mut self) -> Option<Value> {
        match self.rng.gen_range(0..4) {
            0 => None,
            1 => Some(json!("")),
            2 => Some(json!(0)),
            _ => Some(json!(false)),
        }
    }

    fn generate_value(&mut self) -> Value {
        match self.rng.gen_range(0..10) {
            0 => {
                let target = &self.authors[self.rng.gen_range(0..self.authors.len())];
                json!({ "link": target.as_str() })
            }
            // Truthy, not a tombstone, never comparable
            1 => json!({ "remove": false }),
            2 => json!(self.rng.gen_range(1..100)),
            _ => json!(format!("v{}", self.rng.gen_range(0..self.config.value_count.max(1)))),
        }
    }

    /// Run the fuzzer
    pub fn run(&mut self) -> FuzzResult {
        let messages: Vec<RawMessage> = (1..=self.config.event_count as u64)
            .map(|position| self.generate_message(position))
            .collect();
        let live = (messages.len() as f64 * self.config.live_fraction) as usize;
        let split = messages.len() - live.min(messages.len());

        let mut result = FuzzResult::new();
        result.events = messages.len();

        let mut point = AggregateFold::new(FUZZ_KEY);
        for msg in &messages {
            point.accumulate(msg);
        }
        let point = point.finish();

        let mut streaming = AggregateFold::new(FUZZ_KEY);
        let mut running = RunningSnapshot::new();
        let mut latest = LatestFold::new(FUZZ_KEY);

        let events = messages[..split]
            .iter()
            .cloned()
            .map(LogEvent::Message)
            .chain(std::iter::once(LogEvent::Synced))
            .chain(messages[split..].iter().cloned().map(LogEvent::Message));

        let mut seen = 0;
        for event in events {
            if !event.is_synced() {
                seen += 1;
            }

            if let Some(update) = streaming.step(&event) {
                if !update.is_snapshot() {
                    result.deltas += 1;
                }
                running.merge(&update);
            }

            if let Some(value) = latest.step(&event) {
                if value != expected_latest(&messages[..seen]) {
                    result.recency_violations += 1;
                }
            }
        }

        if running.snapshot() != &point {
            result.equivalence_violations += 1;
        }
        if point != expected_snapshot(&messages) {
            result.lww_violations += 1;
        }
        result.precedence_violations = self.check_precedence(&point);

        result
    }

    /// Resolve from a handful of viewer/owner pairings and check which rule applied
    fn check_precedence(&mut self, snapshot: &AggregateSnapshot) -> u32 {
        let stranger = FeedId::from_public_key(&[0xff; 32]);
        let mut candidates: Vec<Option<&FeedId>> = self.authors.iter().map(Some).collect();
        candidates.push(Some(&stranger));
        candidates.push(None);

        let mut violations = 0;
        for _ in 0..self.authors.len() * 2 {
            let viewer = candidates[self.rng.gen_range(0..candidates.len())].unwrap_or(&stranger);
            let owner = candidates[self.rng.gen_range(0..candidates.len())].map(FeedId::as_str);

            let resolved = resolve(snapshot, viewer.as_str(), owner);
            let ok = if let Some(value) = snapshot.get(viewer.as_str()) {
                resolved.as_ref() == Some(value)
            } else if let Some(value) = owner.and_then(|o| snapshot.get(o)) {
                resolved.as_ref() == Some(value)
            } else {
                plurality_is_maximal(snapshot, resolved.as_ref())
            };

            if !ok {
                violations += 1;
            }
        }
        violations
    }
}

/// Each author's final word, computed without the fold
fn expected_snapshot(messages: &[RawMessage]) -> AggregateSnapshot {
    let mut last_word: HashMap<&FeedId, Payload> = HashMap::new();
    for msg in messages {
        if let Some(payload) = msg.content.as_ref().and_then(|c| Payload::extract(c, FUZZ_KEY)) {
            last_word.insert(&msg.author, payload);
        }
    }

    last_word
        .into_iter()
        .filter_map(|(author, payload)| payload.into_value().map(|v| (author.clone(), v)))
        .collect()
}

/// Walking backwards, the first author whose final word is a value
fn expected_latest(messages: &[RawMessage]) -> Option<Value> {
    let mut settled = HashSet::new();
    for msg in messages.iter().rev() {
        let Some(payload) = msg.content.as_ref().and_then(|c| Payload::extract(c, FUZZ_KEY)) else {
            continue;
        };
        if !settled.insert(&msg.author) {
            continue;
        }
        if let Payload::Value(value) = payload {
            return Some(value);
        }
    }
    None
}

/// The plurality pick must carry the highest count of any comparable value
fn plurality_is_maximal(snapshot: &AggregateSnapshot, resolved: Option<&Value>) -> bool {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for (_, value) in snapshot.iter() {
        if let Some(candidate) = comparable(value) {
            *counts.entry(candidate).or_default() += 1;
        }
    }

    let best = counts.values().copied().max();
    match (resolved.and_then(Value::as_str), best) {
        (None, None) => true,
        (Some(pick), Some(best)) => counts.get(pick) == Some(&best),
        _ => false,
    }
}

/// Fuzzing result
#[derive(Debug, Default)]
pub struct FuzzResult {
    pub events: usize,
    pub deltas: usize,
    pub equivalence_violations: u32,
    pub lww_violations: u32,
    pub recency_violations: u32,
    pub precedence_violations: u32,
}

impl FuzzResult {
    pub fn new() -> Self {
        FuzzResult::default()
    }

    pub fn is_valid(&self) -> bool {
        self.equivalence_violations == 0
            && self.lww_violations == 0
            && self.recency_violations == 0
            && self.precedence_violations == 0
    }
}

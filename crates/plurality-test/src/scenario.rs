//! Scenario harness - scripted assertions against a real index
//!
//! A scenario owns an in-memory log and one destination. Authors are
//! numbered; `author(n)` is always the same feed.

use serde_json::{json, Value};

use plurality_core::{Content, FeedId, IndexResult, RawMessage, SourceResult};
use plurality_index::{IndexConfig, SocialIndex};
use plurality_source::{FaultPlan, FaultySource, MemoryLog};

/// Feed number `n`
pub fn author(n: u8) -> FeedId {
    FeedId::from_public_key(&[n; 32])
}

/// Scripted log about one destination
pub struct Scenario {
    log: MemoryLog,
    config: IndexConfig,
    dest: String,
}

impl Scenario {
    pub fn new(dest: impl Into<String>) -> Self {
        Scenario {
            log: MemoryLog::new(),
            config: IndexConfig::default(),
            dest: dest.into(),
        }
    }

    /// Scenario about feed `n`, which is then also the destination's owner
    pub fn about_author(n: u8) -> Self {
        Scenario::new(author(n).as_str())
    }

    pub fn with_config(mut self, config: IndexConfig) -> Self {
        self.config = config;
        self
    }

    pub fn dest(&self) -> &str {
        &self.dest
    }

    pub fn log(&self) -> &MemoryLog {
        &self.log
    }

    /// `author` sets every field of `fields` on the destination
    pub fn assert_fields(&self, author: &FeedId, fields: Value) -> SourceResult<RawMessage> {
        let mut content = Content::new();
        content.insert("type".to_owned(), json!(self.config.assertion_type));
        content.insert(self.config.dest_field.clone(), json!(self.dest));
        if let Value::Object(fields) = fields {
            content.extend(fields);
        }
        self.log.append(author, Value::Object(content))
    }

    /// `author` sets `key` to `value`
    pub fn assert(&self, author: &FeedId, key: &str, value: impl Into<Value>) -> SourceResult<RawMessage> {
        self.assert_fields(author, json!({ key: value.into() }))
    }

    /// `author` retracts their value for `key`
    pub fn retract(&self, author: &FeedId, key: &str) -> SourceResult<RawMessage> {
        self.assert_fields(author, json!({ key: { "remove": true } }))
    }

    /// Append arbitrary content, matching or not
    pub fn append_raw(&self, author: &FeedId, content: Value) -> SourceResult<RawMessage> {
        self.log.append(author, content)
    }

    /// Index over the scenario log as seen by `viewer`
    pub fn index(&self, viewer: &FeedId) -> IndexResult<SocialIndex<MemoryLog>> {
        SocialIndex::new(self.config.clone(), viewer.clone(), self.log.clone())
    }

    /// Index over the scenario log with faults injected
    pub fn faulty_index(&self, viewer: &FeedId, plan: FaultPlan) -> IndexResult<SocialIndex<FaultySource<MemoryLog>>> {
        let source = FaultySource::new(self.log.clone(), plan);
        SocialIndex::new(self.config.clone(), viewer.clone(), source)
    }
}

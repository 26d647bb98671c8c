//! The social index query facade
//!
//! Point queries fold the backlog once and return. Stream queries hand back
//! a lazy stream whose only suspension point is the wait for the next log
//! event; dropping it drops the underlying source query and with it any live
//! subscription.

use std::pin::Pin;
use std::sync::Arc;

use futures::stream::{self, Stream, StreamExt};
use indexmap::IndexMap;
use serde_json::Value;

use plurality_core::{Destination, FeedId, IndexError, IndexResult, LogEvent};
use plurality_source::{MessageSource, MessageStream, QueryFilter, QueryOptions};
use plurality_state::{resolve, AggregateFold, AggregateUpdate, AggregateSnapshot, LatestFold, RunningSnapshot};

use crate::{IndexConfig, Manifest};

/// Stream of query results; ends after the first error
pub type ValueStream<T> = Pin<Box<dyn Stream<Item = IndexResult<T>> + Send>>;

/// Socially resolved values over one message source
pub struct SocialIndex<S> {
    config: IndexConfig,
    viewer: FeedId,
    source: Arc<S>,
}

impl<S> Clone for SocialIndex<S> {
    fn clone(&self) -> Self {
        SocialIndex {
            config: self.config.clone(),
            viewer: self.viewer.clone(),
            source: Arc::clone(&self.source),
        }
    }
}

impl<S: MessageSource + 'static> SocialIndex<S> {
    /// Create an index resolving values from `viewer`'s point of view
    pub fn new(config: IndexConfig, viewer: FeedId, source: S) -> IndexResult<Self> {
        Self::with_shared(config, viewer, Arc::new(source))
    }

    /// Create an index over a source shared with other owners
    pub fn with_shared(config: IndexConfig, viewer: FeedId, source: Arc<S>) -> IndexResult<Self> {
        config.validate()?;
        tracing::debug!(
            namespace = %config.namespace,
            assertion_type = %config.assertion_type,
            viewer = ?viewer,
            "social index created"
        );
        Ok(SocialIndex { config, viewer, source })
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn viewer(&self) -> &FeedId {
        &self.viewer
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn manifest(&self) -> Manifest {
        Manifest::new(&self.config)
    }

    fn filter(&self, dest: &str) -> QueryFilter {
        QueryFilter::new(&self.config.assertion_type, &self.config.dest_field, dest)
    }

    fn query(&self, dest: &str, options: QueryOptions) -> MessageStream {
        self.source.query(&self.filter(dest), options)
    }

    /// The author owning `dest`, if it has one.
    ///
    /// A message whose author cannot be looked up is treated as owned by the
    /// destination string itself.
    pub async fn owner_of(&self, dest: &str) -> Option<String> {
        match Destination::classify(dest) {
            Destination::Feed(feed) => Some(feed.as_str().to_owned()),
            Destination::Message(msg) => match self.source.resolve_author(&msg).await {
                Ok(author) => Some(author.as_str().to_owned()),
                Err(err) => {
                    tracing::warn!(dest, error = %err, "owner lookup failed, using destination as owner");
                    Some(dest.to_owned())
                }
            },
            Destination::Other(_) => None,
        }
    }

    /// Raw assertion messages about `dest`
    pub fn read(&self, dest: &str, options: QueryOptions) -> ValueStream<LogEvent> {
        until_error(self.query(dest, options), |event| Some(event.clone()))
    }

    /// Every author's current assertion of `key` about `dest`
    pub async fn social_values(&self, key: &str, dest: &str) -> IndexResult<AggregateSnapshot> {
        let mut fold = AggregateFold::new(key);
        let mut events = self.query(dest, QueryOptions::backlog());

        while let Some(event) = events.next().await {
            if let LogEvent::Message(msg) = event? {
                fold.accumulate(&msg);
            }
        }

        let snapshot = fold.finish();
        tracing::debug!(key, dest, authors = snapshot.len(), "social values");
        Ok(snapshot)
    }

    /// The value of `key` for `dest` as this index's viewer should see it
    pub async fn social_value(&self, key: &str, dest: &str) -> IndexResult<Option<Value>> {
        let owner = self.owner_of(dest).await;
        let snapshot = self.social_values(key, dest).await?;
        Ok(resolve(&snapshot, self.viewer.as_str(), owner.as_deref()))
    }

    /// Most recent live assertion of `key` about `dest`, whoever made it
    pub async fn latest_value(&self, key: &str, dest: &str) -> IndexResult<Option<Value>> {
        let mut events = self.query(dest, QueryOptions::backlog().reversed());

        while let Some(event) = events.next().await {
            let LogEvent::Message(msg) = event? else {
                continue;
            };
            if let Some(value) = msg.assertion(key).and_then(|a| a.payload.into_value()) {
                tracing::debug!(key, dest, position = ?msg.position, "latest value");
                return Ok(Some(value));
            }
        }

        tracing::debug!(key, dest, "latest value absent");
        Ok(None)
    }

    /// Most recent live assertion of each of `keys` about `dest`.
    ///
    /// Keys nobody asserted are left out; the rest come back in the order
    /// they were asked for.
    pub async fn latest_values(&self, keys: &[&str], dest: &str) -> IndexResult<IndexMap<String, Value>> {
        let mut found: IndexMap<&str, Value> = IndexMap::new();
        let mut events = self.query(dest, QueryOptions::backlog().reversed());

        while found.len() < keys.len() {
            let Some(event) = events.next().await else {
                break;
            };
            let LogEvent::Message(msg) = event? else {
                continue;
            };

            for &key in keys {
                if found.contains_key(key) {
                    continue;
                }
                if let Some(value) = msg.assertion(key).and_then(|a| a.payload.into_value()) {
                    found.insert(key, value);
                }
            }
        }

        tracing::debug!(dest, requested = keys.len(), found = found.len(), "latest values");
        Ok(keys
            .iter()
            .filter_map(|&key| found.get(key).map(|v| (key.to_owned(), v.clone())))
            .collect())
    }

    /// The backlog snapshot of `key` about `dest`, then one delta per live assertion
    pub fn social_values_stream(&self, key: &str, dest: &str) -> ValueStream<AggregateUpdate> {
        let mut fold = AggregateFold::new(key);
        until_error(self.query(dest, QueryOptions::live()), move |event| fold.step(event))
    }

    /// Latest value of `key` about `dest`: once when the backlog is done, then
    /// after every live assertion.
    ///
    /// With an `author`, follows only that author's value instead, emitting on
    /// every item of the underlying snapshot-then-deltas stream.
    pub fn latest_value_stream(
        &self,
        key: &str,
        dest: &str,
        author: Option<FeedId>,
    ) -> ValueStream<Option<Value>> {
        let events = self.query(dest, QueryOptions::live());

        match author {
            Some(author) => {
                let mut fold = AggregateFold::new(key);
                let mut running = RunningSnapshot::new();
                until_error(events, move |event| {
                    let update = fold.step(event)?;
                    running.merge(&update);
                    Some(running.value_of(&author).cloned())
                })
            }
            None => {
                let mut fold = LatestFold::new(key);
                until_error(events, move |event| fold.step(event))
            }
        }
    }

    /// Resolved value of `key` about `dest`, re-resolved after every live assertion
    pub fn social_value_stream(&self, key: &str, dest: &str) -> ValueStream<Option<Value>> {
        let index = self.clone();
        let key = key.to_owned();
        let dest = dest.to_owned();

        stream::once(async move {
            let owner = index.owner_of(&dest).await;
            let viewer = index.viewer.clone();
            let mut fold = AggregateFold::new(key);
            let mut running = RunningSnapshot::new();

            until_error(index.query(&dest, QueryOptions::live()), move |event| {
                let update = fold.step(event)?;
                Some(resolve(running.merge(&update), viewer.as_str(), owner.as_deref()))
            })
        })
        .flatten()
        .boxed()
    }
}

/// Run a per-query step over a source stream, emitting what it returns.
///
/// The first source error is passed through and ends the stream; the source
/// stream is dropped with it.
fn until_error<T, F>(events: MessageStream, step: F) -> ValueStream<T>
where
    T: Send + 'static,
    F: FnMut(&LogEvent) -> Option<T> + Send + 'static,
{
    stream::unfold(Some((events, step)), |state| async move {
        let (mut events, mut step) = state?;
        loop {
            match events.next().await? {
                Ok(event) => {
                    if let Some(item) = step(&event) {
                        return Some((Ok(item), Some((events, step))));
                    }
                }
                Err(err) => {
                    tracing::debug!(error = %err, "source failed, ending stream");
                    return Some((Err(IndexError::from(err)), None));
                }
            }
        }
    })
    .boxed()
}

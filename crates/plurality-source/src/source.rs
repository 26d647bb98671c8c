//! Message source trait and query parameters

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;

use plurality_core::{FeedId, LogEvent, MsgId, RawMessage, SourceResult};

/// Stream of log events answering one query.
///
/// Dropping the stream releases any live subscription behind it.
pub type MessageStream = Pin<Box<dyn Stream<Item = SourceResult<LogEvent>> + Send>>;

/// Which messages a query selects
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct QueryFilter {
    /// Required `content.type`
    pub assertion_type: String,
    /// Content field naming the entity
    pub dest_field: String,
    /// Entity the messages must be about
    pub dest: String,
}

impl QueryFilter {
    pub fn new(
        assertion_type: impl Into<String>,
        dest_field: impl Into<String>,
        dest: impl Into<String>,
    ) -> Self {
        QueryFilter {
            assertion_type: assertion_type.into(),
            dest_field: dest_field.into(),
            dest: dest.into(),
        }
    }

    pub fn matches(&self, msg: &RawMessage) -> bool {
        msg.content_type() == Some(self.assertion_type.as_str())
            && msg.targets(&self.dest_field, &self.dest)
    }
}

/// How a query walks the log
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueryOptions {
    /// Walk the backlog newest first
    pub reverse: bool,
    /// Cap on backlog messages
    pub limit: Option<usize>,
    /// Keep streaming after the backlog, behind a phase marker
    pub live: bool,
    /// Include the backlog at all
    pub old: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        QueryOptions {
            reverse: false,
            limit: None,
            live: false,
            old: true,
        }
    }
}

impl QueryOptions {
    /// Backlog only, in log order
    pub fn backlog() -> Self {
        QueryOptions::default()
    }

    /// Backlog then live tail
    pub fn live() -> Self {
        QueryOptions {
            live: true,
            ..QueryOptions::default()
        }
    }

    /// Live tail only: the phase marker comes first
    pub fn live_only() -> Self {
        QueryOptions {
            live: true,
            old: false,
            ..QueryOptions::default()
        }
    }

    pub fn reversed(mut self) -> Self {
        self.reverse = true;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// An ordered, optionally live, queryable log.
///
/// Implementations deliver a query's messages in non-decreasing position
/// order (or the reverse, when asked), followed by exactly one
/// [`LogEvent::Synced`] when the query is live.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Query messages matching the filter
    fn query(&self, filter: &QueryFilter, options: QueryOptions) -> MessageStream;

    /// Look up the author of a message
    async fn resolve_author(&self, id: &MsgId) -> SourceResult<FeedId>;
}

#[async_trait]
impl<T: MessageSource + ?Sized> MessageSource for Arc<T> {
    fn query(&self, filter: &QueryFilter, options: QueryOptions) -> MessageStream {
        (**self).query(filter, options)
    }

    async fn resolve_author(&self, id: &MsgId) -> SourceResult<FeedId> {
        (**self).resolve_author(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plurality_core::LogPosition;
    use serde_json::json;

    #[test]
    fn test_filter_matches() {
        let dest = FeedId::from_public_key(&[1u8; 32]);
        let filter = QueryFilter::new("about", "about", dest.as_str());

        let msg = RawMessage {
            key: MsgId::from_hash(&[2u8; 32]),
            author: FeedId::from_public_key(&[3u8; 32]),
            position: LogPosition::new(1),
            content: json!({ "type": "about", "about": dest.as_str(), "name": "x" })
                .as_object()
                .cloned(),
        };
        assert!(filter.matches(&msg));

        let other_type = RawMessage {
            content: json!({ "type": "post", "about": dest.as_str() }).as_object().cloned(),
            ..msg.clone()
        };
        assert!(!filter.matches(&other_type));
    }

    #[test]
    fn test_options_builders() {
        let opts = QueryOptions::backlog().reversed().with_limit(1);
        assert!(opts.reverse && opts.old && !opts.live);
        assert_eq!(opts.limit, Some(1));

        let live = QueryOptions::live_only();
        assert!(live.live && !live.old);
    }
}

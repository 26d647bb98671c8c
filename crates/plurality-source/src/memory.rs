//! In-memory append-only log
//!
//! Messages are never removed or reordered, so a query can remember where
//! the log ended when it started and walk that backlog lazily while new
//! appends flow to it through a live subscription.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use parking_lot::RwLock;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::sync::mpsc;

use plurality_core::{FeedId, LogEvent, LogPosition, MsgId, RawMessage, SourceError, SourceResult};

use crate::{MessageSource, MessageStream, QueryFilter, QueryOptions};

/// Live subscription registered by a query
struct Subscriber {
    filter: QueryFilter,
    tx: mpsc::UnboundedSender<RawMessage>,
}

#[derive(Default)]
struct LogInner {
    messages: Vec<RawMessage>,
    by_key: HashMap<MsgId, usize>,
    subscribers: Vec<Subscriber>,
    closed: bool,
}

/// Shared in-process log; clones share the same storage
#[derive(Clone, Default)]
pub struct MemoryLog {
    inner: Arc<RwLock<LogInner>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        MemoryLog::default()
    }

    /// Append a message and fan it out to matching live queries.
    ///
    /// Non-object content is stored as "no content".
    pub fn append(&self, author: &FeedId, content: Value) -> SourceResult<RawMessage> {
        let mut inner = self.inner.write();
        if inner.closed {
            return Err(SourceError::Closed);
        }

        let position = LogPosition::new(inner.messages.len() as u64 + 1);
        let content = match content {
            Value::Object(map) => Some(map),
            _ => None,
        };
        let key = message_key(author, position, content.as_ref());

        let msg = RawMessage {
            key: key.clone(),
            author: author.clone(),
            position,
            content,
        };

        let index = inner.messages.len();
        inner.messages.push(msg.clone());
        inner.by_key.insert(key, index);

        inner.subscribers.retain(|s| !s.tx.is_closed());
        for sub in inner.subscribers.iter().filter(|s| s.filter.matches(&msg)) {
            // A receiver dropped since the retain is pruned on the next append
            let _ = sub.tx.send(msg.clone());
        }

        tracing::trace!(position = ?position, author = ?author, "appended message");
        Ok(msg)
    }

    /// Look up a message by key
    pub fn get(&self, id: &MsgId) -> Option<RawMessage> {
        let inner = self.inner.read();
        inner.by_key.get(id).map(|&i| inner.messages[i].clone())
    }

    pub fn len(&self) -> usize {
        self.inner.read().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().messages.is_empty()
    }

    /// Number of live queries still attached
    pub fn subscriber_count(&self) -> usize {
        let mut inner = self.inner.write();
        inner.subscribers.retain(|s| !s.tx.is_closed());
        inner.subscribers.len()
    }

    /// Stop accepting appends and end every live query
    pub fn close(&self) {
        let mut inner = self.inner.write();
        inner.closed = true;
        inner.subscribers.clear();
        tracing::debug!(messages = inner.messages.len(), "memory log closed");
    }
}

#[async_trait]
impl MessageSource for MemoryLog {
    fn query(&self, filter: &QueryFilter, options: QueryOptions) -> MessageStream {
        // Backlog boundary and subscription are taken under one lock so
        // every message lands on exactly one side of the phase marker.
        let (end, live_rx) = {
            let mut inner = self.inner.write();
            let end = inner.messages.len();
            let live_rx = if options.live && !inner.closed {
                let (tx, rx) = mpsc::unbounded_channel();
                inner.subscribers.push(Subscriber {
                    filter: filter.clone(),
                    tx,
                });
                Some(rx)
            } else {
                None
            };
            (end, live_rx)
        };

        tracing::debug!(
            dest = %filter.dest,
            backlog = end,
            live = options.live,
            reverse = options.reverse,
            "memory log query"
        );

        let backlog = if options.old {
            Backlog::new(Arc::clone(&self.inner), filter.clone(), end, options)
        } else {
            Backlog::empty(Arc::clone(&self.inner), filter.clone())
        };
        let backlog = stream::iter(backlog.map(|msg| Ok::<_, SourceError>(LogEvent::Message(msg))));

        if !options.live {
            return backlog.boxed();
        }

        let marker = stream::once(async { Ok::<_, SourceError>(LogEvent::Synced) });
        let tail = stream::unfold(live_rx, |rx| async move {
            let mut rx = rx?;
            let msg = rx.recv().await?;
            Some((Ok(LogEvent::Message(msg)), Some(rx)))
        });

        backlog.chain(marker).chain(tail).boxed()
    }

    async fn resolve_author(&self, id: &MsgId) -> SourceResult<FeedId> {
        self.get(id)
            .map(|msg| msg.author)
            .ok_or_else(|| SourceError::NotFound(id.clone()))
    }
}

/// Lazy cursor over the messages that existed when a query started
struct Backlog {
    inner: Arc<RwLock<LogInner>>,
    filter: QueryFilter,
    /// Next index to visit, counting from the walking direction's start
    cursor: usize,
    end: usize,
    reverse: bool,
    remaining: Option<usize>,
}

impl Backlog {
    fn new(inner: Arc<RwLock<LogInner>>, filter: QueryFilter, end: usize, options: QueryOptions) -> Self {
        Backlog {
            inner,
            filter,
            cursor: 0,
            end,
            reverse: options.reverse,
            remaining: options.limit,
        }
    }

    fn empty(inner: Arc<RwLock<LogInner>>, filter: QueryFilter) -> Self {
        Backlog {
            inner,
            filter,
            cursor: 0,
            end: 0,
            reverse: false,
            remaining: None,
        }
    }
}

impl Iterator for Backlog {
    type Item = RawMessage;

    fn next(&mut self) -> Option<RawMessage> {
        if self.remaining == Some(0) {
            return None;
        }

        let inner = self.inner.read();
        while self.cursor < self.end {
            let index = if self.reverse {
                self.end - 1 - self.cursor
            } else {
                self.cursor
            };
            self.cursor += 1;

            let msg = &inner.messages[index];
            if self.filter.matches(msg) {
                if let Some(remaining) = self.remaining.as_mut() {
                    *remaining -= 1;
                }
                return Some(msg.clone());
            }
        }
        None
    }
}

fn message_key(author: &FeedId, position: LogPosition, content: Option<&serde_json::Map<String, Value>>) -> MsgId {
    let mut hasher = Sha256::new();
    hasher.update(author.as_str().as_bytes());
    hasher.update(position.0.to_be_bytes());
    if let Some(content) = content {
        hasher.update(Value::Object(content.clone()).to_string().as_bytes());
    }
    MsgId::from_hash(&hasher.finalize().into())
}

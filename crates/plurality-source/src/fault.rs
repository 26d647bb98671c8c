//! Fault injection for message sources

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use plurality_core::{FeedId, MsgId, SourceError, SourceResult};

use crate::{MessageSource, MessageStream, QueryFilter, QueryOptions};

/// What to break
#[derive(Clone, Debug, Default)]
pub struct FaultPlan {
    /// Fail every query after this many events (or at the end of a finite query)
    pub fail_after: Option<usize>,
    /// Fail every author lookup
    pub fail_resolve: bool,
}

impl FaultPlan {
    pub fn fail_after(events: usize) -> Self {
        FaultPlan {
            fail_after: Some(events),
            ..FaultPlan::default()
        }
    }

    pub fn fail_resolve() -> Self {
        FaultPlan {
            fail_resolve: true,
            ..FaultPlan::default()
        }
    }
}

/// Wraps a source and injects errors according to a plan
pub struct FaultySource<S> {
    inner: S,
    plan: FaultPlan,
}

impl<S> FaultySource<S> {
    pub fn new(inner: S, plan: FaultPlan) -> Self {
        FaultySource { inner, plan }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: MessageSource> MessageSource for FaultySource<S> {
    fn query(&self, filter: &QueryFilter, options: QueryOptions) -> MessageStream {
        let stream = self.inner.query(filter, options);
        let Some(events) = self.plan.fail_after else {
            return stream;
        };

        let failure = stream::once(async move {
            Err(SourceError::Query(format!("injected fault after {events} events")))
        });
        stream.take(events).chain(failure).boxed()
    }

    async fn resolve_author(&self, id: &MsgId) -> SourceResult<FeedId> {
        if self.plan.fail_resolve {
            return Err(SourceError::Query(format!("injected lookup fault for {id}")));
        }
        self.inner.resolve_author(id).await
    }
}

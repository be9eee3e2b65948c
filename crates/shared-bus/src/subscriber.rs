//! # Event Subscriber
//!
//! Receiving side of the bus. Every [`Subscription`] owns a broadcast
//! receiver and applies its [`EventFilter`] on receive; the
//! [`SubscriptionTracker`] counts live subscriptions per filter label so the
//! runtime can report who is listening.

use crate::events::{EngineEvent, EventFilter};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::Stream;
use tracing::{debug, trace};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    #[error("Event bus closed")]
    Closed,
}

/// Live subscription counts keyed by [`EventFilter::label`].
#[derive(Debug, Clone, Default)]
pub struct SubscriptionTracker {
    counts: Arc<Mutex<HashMap<String, usize>>>,
}

impl SubscriptionTracker {
    pub(crate) fn acquire(&self, label: &str) {
        *self.counts.lock().entry(label.to_string()).or_insert(0) += 1;
    }

    pub(crate) fn release(&self, label: &str) {
        let mut counts = self.counts.lock();
        let remaining = counts.get_mut(label).map(|count| {
            *count = count.saturating_sub(1);
            *count
        });
        if remaining == Some(0) {
            counts.remove(label);
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, usize> {
        self.counts.lock().clone()
    }
}

/// Filtered receiver; unregisters itself from the tracker on drop.
pub struct Subscription {
    receiver: broadcast::Receiver<EngineEvent>,
    filter: EventFilter,
    label: String,
    tracker: SubscriptionTracker,
}

impl Subscription {
    pub(crate) fn new(
        receiver: broadcast::Receiver<EngineEvent>,
        filter: EventFilter,
        tracker: SubscriptionTracker,
    ) -> Self {
        let label = filter.label();
        tracker.acquire(&label);
        Self {
            receiver,
            filter,
            label,
            tracker,
        }
    }

    /// Next event accepted by the filter; `None` once the bus is dropped.
    ///
    /// A lagging receiver skips the overwritten events and carries on.
    pub async fn recv(&mut self) -> Option<EngineEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    debug!(filter = %self.label, skipped, "Subscriber lagged behind the bus");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`Subscription::recv`].
    pub fn try_recv(&mut self) -> Result<Option<EngineEvent>, SubscriptionError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.filter.matches(&event) => return Ok(Some(event)),
                Ok(_) | Err(TryRecvError::Lagged(_)) => {}
                Err(TryRecvError::Empty) => return Ok(None),
                Err(TryRecvError::Closed) => return Err(SubscriptionError::Closed),
            }
        }
    }

    #[must_use]
    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.tracker.release(&self.label);
        trace!(filter = %self.label, "Subscription released");
    }
}

/// Filtered event stream for use with stream combinators.
pub struct EventStream {
    inner: BroadcastStream<EngineEvent>,
    filter: EventFilter,
}

impl EventStream {
    pub(crate) fn new(receiver: broadcast::Receiver<EngineEvent>, filter: EventFilter) -> Self {
        Self {
            inner: BroadcastStream::new(receiver),
            filter,
        }
    }

    #[must_use]
    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }
}

impl Stream for EventStream {
    type Item = EngineEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => {
                    if self.filter.matches(&event) {
                        return Poll::Ready(Some(event));
                    }
                }
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(count)))) => {
                    debug!(lagged = count, "Stream lagged, some events dropped");
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

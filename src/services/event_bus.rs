//! Broadcast event channel handed to the store and the sync engine at
//! construction time.
//!
//! Publishing never blocks and never fails: with no subscribers the event is
//! dropped. Slow subscribers that fall behind the channel capacity skip the
//! events they missed.

use std::pin::Pin;

use futures::Stream;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::warn;

/// Boxed stream of events returned by subscriptions.
pub type EventStream<E> = Pin<Box<dyn Stream<Item = E> + Send>>;

/// A cloneable, constructor-injected broadcast channel.
pub struct EventBus<E> {
    sender: broadcast::Sender<E>,
}

impl<E> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<E: Clone + Send + 'static> EventBus<E> {
    /// Creates a bus that buffers up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, event: E) {
        // An error only means nobody is listening.
        let _ = self.sender.send(event);
    }

    /// Subscribes to every event published from now on.
    pub fn subscribe(&self) -> EventStream<E> {
        self.subscribe_where(|_| true)
    }

    /// Subscribes to the events matching `predicate`.
    pub fn subscribe_where<P>(&self, mut predicate: P) -> EventStream<E>
    where
        P: FnMut(&E) -> bool + Send + 'static,
    {
        let stream = BroadcastStream::new(self.sender.subscribe()).filter_map(move |item| match item {
            Ok(event) if predicate(&event) => Some(event),
            Ok(_) => None,
            Err(lagged) => {
                warn!("event subscriber fell behind: {}", lagged);
                None
            }
        });
        Box::pin(stream)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

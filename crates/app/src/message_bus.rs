//! In-process message bus backed by per-subscription tokio channels.
//!
//! Every subscription owns an unbounded mpsc receiver. A publish clones the
//! message into each live sender of its topic while holding the bus lock, so
//! each subscription sees the messages of a topic in the order the bus received
//! them. Nothing is buffered for topics without subscribers.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use quill_domain::error::{BusError, QuillError};

use crate::ports::{
    Acknowledger, Delivery, DeliveryOutcome, Message, MessagePublisher, MessageSubscriber,
    PublishReceipt, Subscription, Verdict,
};

/// Snapshot of a topic's traffic counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TopicStats {
    /// Publishes received for the topic.
    pub published: u64,
    /// Publishes that found no subscriber and were lost.
    pub unrouted: u64,
    /// Deliveries accepted by a consumer.
    pub delivered: u64,
    /// Deliveries rejected (or abandoned) by a consumer.
    pub dropped: u64,
}

#[derive(Debug, Default)]
struct TopicCounters {
    published: AtomicU64,
    unrouted: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl TopicCounters {
    fn snapshot(&self) -> TopicStats {
        TopicStats {
            published: self.published.load(Ordering::Relaxed),
            unrouted: self.unrouted.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

#[derive(Default)]
struct Topic {
    subscribers: Vec<mpsc::UnboundedSender<Message>>,
    counters: Arc<TopicCounters>,
}

#[derive(Default)]
struct State {
    closed: bool,
    topics: HashMap<String, Topic>,
}

/// In-process publish/subscribe broker.
///
/// Cloning yields another handle to the **same** broker. Hand the publishing
/// side [`publisher`](Self::publisher) and the consuming side
/// [`subscriber`](Self::subscriber); constructing two buses would silently
/// disconnect them.
#[derive(Clone, Default)]
pub struct InProcessMessageBus {
    state: Arc<Mutex<State>>,
}

impl InProcessMessageBus {
    /// Create a new, open bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish-only view of this bus.
    #[must_use]
    pub fn publisher(&self) -> BusPublisher {
        BusPublisher(self.clone())
    }

    /// Subscribe-only view of this bus.
    #[must_use]
    pub fn subscriber(&self) -> BusSubscriber {
        BusSubscriber(self.clone())
    }

    /// Traffic counters for `topic` (all zero if the topic was never used).
    #[must_use]
    pub fn stats(&self, topic: &str) -> TopicStats {
        self.state()
            .topics
            .get(topic)
            .map(|t| t.counters.snapshot())
            .unwrap_or_default()
    }

    /// Number of live subscriptions on `topic`.
    #[must_use]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.state().topics.get(topic).map_or(0, |t| {
            t.subscribers.iter().filter(|tx| !tx.is_closed()).count()
        })
    }

    /// Close the bus.
    ///
    /// Every subscription ends once it has drained the messages already routed
    /// to it. Later publishes and subscribes fail with [`BusError::Closed`].
    pub fn close(&self) {
        let mut state = self.state();
        state.closed = true;
        for topic in state.topics.values_mut() {
            topic.subscribers.clear();
        }
        drop(state);
        tracing::info!("message bus closed");
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn route(&self, topic: &str, payload: Vec<u8>) -> Result<PublishReceipt, BusError> {
        let mut state = self.state();
        if state.closed {
            return Err(BusError::Closed);
        }
        let entry = state.topics.entry(topic.to_string()).or_default();
        entry.subscribers.retain(|tx| !tx.is_closed());

        let message = Message::new(topic, payload);
        let message_id = message.id;
        let mut subscribers = 0;
        for tx in &entry.subscribers {
            if tx.send(message.clone()).is_ok() {
                subscribers += 1;
            }
        }

        entry.counters.published.fetch_add(1, Ordering::Relaxed);
        if subscribers == 0 {
            entry.counters.unrouted.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(%topic, %message_id, "no subscriber on topic, message lost");
        }

        Ok(PublishReceipt {
            message_id,
            subscribers,
        })
    }

    fn register(&self, topic: &str) -> Result<InProcessSubscription, BusError> {
        let mut state = self.state();
        if state.closed {
            return Err(BusError::Closed);
        }
        let entry = state.topics.entry(topic.to_string()).or_default();
        let (tx, rx) = mpsc::unbounded_channel();
        entry.subscribers.push(tx);
        tracing::debug!(%topic, subscribers = entry.subscribers.len(), "subscription registered");

        Ok(InProcessSubscription {
            topic: topic.to_string(),
            receiver: rx,
            counters: Arc::clone(&entry.counters),
        })
    }
}

impl MessagePublisher for InProcessMessageBus {
    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<PublishReceipt, QuillError>> + Send {
        let result = self.route(topic, payload).map_err(QuillError::from);
        async move { result }
    }
}

impl MessageSubscriber for InProcessMessageBus {
    type Subscription = InProcessSubscription;

    fn subscribe(
        &self,
        topic: &str,
    ) -> impl Future<Output = Result<Self::Subscription, QuillError>> + Send {
        let result = self.register(topic).map_err(QuillError::from);
        async move { result }
    }
}

/// Publish-only handle to an [`InProcessMessageBus`].
#[derive(Clone)]
pub struct BusPublisher(InProcessMessageBus);

impl MessagePublisher for BusPublisher {
    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<PublishReceipt, QuillError>> + Send {
        self.0.publish(topic, payload)
    }
}

/// Subscribe-only handle to an [`InProcessMessageBus`].
#[derive(Clone)]
pub struct BusSubscriber(InProcessMessageBus);

impl MessageSubscriber for BusSubscriber {
    type Subscription = InProcessSubscription;

    fn subscribe(
        &self,
        topic: &str,
    ) -> impl Future<Output = Result<Self::Subscription, QuillError>> + Send {
        self.0.subscribe(topic)
    }
}

/// A subscription on an [`InProcessMessageBus`] topic.
pub struct InProcessSubscription {
    topic: String,
    receiver: mpsc::UnboundedReceiver<Message>,
    counters: Arc<TopicCounters>,
}

impl InProcessSubscription {
    /// Take the next delivery if one is already queued.
    #[must_use]
    pub fn try_next(&mut self) -> Option<Delivery> {
        self.receiver.try_recv().ok().map(|m| self.wrap(m))
    }

    fn wrap(&self, message: Message) -> Delivery {
        let acker = InProcessAcknowledger {
            counters: Arc::clone(&self.counters),
        };
        Delivery::new(message, Box::new(acker))
    }
}

impl Subscription for InProcessSubscription {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn next(&mut self) -> impl Future<Output = Option<Delivery>> + Send {
        async move {
            let message = self.receiver.recv().await?;
            Some(self.wrap(message))
        }
    }
}

/// Settles in-process deliveries. Rejection is terminal: there is no queue to
/// return the message to, so it is counted and logged.
struct InProcessAcknowledger {
    counters: Arc<TopicCounters>,
}

impl Acknowledger for InProcessAcknowledger {
    fn settle(self: Box<Self>, message: &Message, verdict: Verdict) -> DeliveryOutcome {
        match verdict {
            Verdict::Accept => {
                self.counters.delivered.fetch_add(1, Ordering::Relaxed);
                DeliveryOutcome::Delivered
            }
            Verdict::Reject(reason) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    topic = %message.topic,
                    message_id = %message.id,
                    %reason,
                    "message rejected and dropped"
                );
                DeliveryOutcome::Dropped
            }
        }
    }
}

//! Message bus port — topic publish/subscribe with explicit per-message settlement.
//!
//! Publishing and subscribing are split into two traits so a component can be
//! handed exactly one capability. Both must be backed by the *same* broker for
//! any message to be observed.

use std::fmt;
use std::future::Future;

use quill_domain::clock::{Timestamp, now};
use quill_domain::error::QuillError;
use quill_domain::id::MessageId;

/// A message as carried by the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub topic: String,
    pub payload: Vec<u8>,
    pub published_at: Timestamp,
}

impl Message {
    /// Create a message with a fresh id, stamped now.
    #[must_use]
    pub fn new(topic: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            id: MessageId::new(),
            topic: topic.into(),
            payload,
            published_at: now(),
        }
    }
}

/// What the broker did with a publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishReceipt {
    pub message_id: MessageId,
    /// Number of subscriptions the message was routed to. `0` means it is lost.
    pub subscribers: usize,
}

/// Final fate of a delivered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Accepted by the consumer.
    Delivered,
    /// Rejected (or abandoned). Terminal unless the broker retries.
    Dropped,
}

/// A consumer's decision about a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject(String),
}

/// Broker-side handler for settling one delivery.
///
/// The in-process bus drops rejected messages; a durable broker could
/// requeue or dead-letter them behind the same interface.
pub trait Acknowledger: Send + Sync {
    fn settle(self: Box<Self>, message: &Message, verdict: Verdict) -> DeliveryOutcome;
}

/// A message handed to a subscriber, awaiting [`accept`](Self::accept) or
/// [`reject`](Self::reject).
///
/// Dropping an unsettled delivery rejects it.
pub struct Delivery {
    message: Message,
    acker: Option<Box<dyn Acknowledger>>,
}

impl Delivery {
    /// Pair a message with the acknowledger that settles it.
    #[must_use]
    pub fn new(message: Message, acker: Box<dyn Acknowledger>) -> Self {
        Self {
            message,
            acker: Some(acker),
        }
    }

    /// The delivered message.
    #[must_use]
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Acknowledge successful processing.
    pub fn accept(mut self) -> DeliveryOutcome {
        self.settle(Verdict::Accept)
    }

    /// Refuse the message.
    pub fn reject(mut self, reason: impl Into<String>) -> DeliveryOutcome {
        self.settle(Verdict::Reject(reason.into()))
    }

    fn settle(&mut self, verdict: Verdict) -> DeliveryOutcome {
        match self.acker.take() {
            Some(acker) => acker.settle(&self.message, verdict),
            None => DeliveryOutcome::Dropped,
        }
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("message", &self.message)
            .field("settled", &self.acker.is_none())
            .finish()
    }
}

impl Drop for Delivery {
    fn drop(&mut self) {
        if self.acker.is_some() {
            self.settle(Verdict::Reject("dropped without settlement".to_string()));
        }
    }
}

/// A live registration on one topic.
pub trait Subscription: Send {
    /// Topic this subscription listens to.
    fn topic(&self) -> &str;

    /// Wait for the next delivery. `None` once the stream is closed.
    fn next(&mut self) -> impl Future<Output = Option<Delivery>> + Send;
}

/// Publish-only capability.
pub trait MessagePublisher {
    /// Publish a payload to every subscription currently registered on `topic`.
    ///
    /// A topic without subscribers is not an error; the receipt reports `0`.
    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<PublishReceipt, QuillError>> + Send;
}

/// Subscribe-only capability.
pub trait MessageSubscriber {
    type Subscription: Subscription + 'static;

    /// Register on `topic`. Registration is complete when the future resolves;
    /// only messages published afterwards are delivered.
    fn subscribe(
        &self,
        topic: &str,
    ) -> impl Future<Output = Result<Self::Subscription, QuillError>> + Send;
}

impl<T: MessagePublisher + Send + Sync> MessagePublisher for std::sync::Arc<T> {
    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<PublishReceipt, QuillError>> + Send {
        (**self).publish(topic, payload)
    }
}

impl<T: MessageSubscriber + Send + Sync> MessageSubscriber for std::sync::Arc<T> {
    type Subscription = T::Subscription;

    fn subscribe(
        &self,
        topic: &str,
    ) -> impl Future<Output = Result<Self::Subscription, QuillError>> + Send {
        (**self).subscribe(topic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::Mutex;

    struct RecordingAcker(Arc<Mutex<Vec<Verdict>>>);

    impl Acknowledger for RecordingAcker {
        fn settle(self: Box<Self>, _message: &Message, verdict: Verdict) -> DeliveryOutcome {
            let outcome = match verdict {
                Verdict::Accept => DeliveryOutcome::Delivered,
                Verdict::Reject(_) => DeliveryOutcome::Dropped,
            };
            self.0.lock().unwrap().push(verdict);
            outcome
        }
    }

    fn delivery() -> (Delivery, Arc<Mutex<Vec<Verdict>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let acker = RecordingAcker(Arc::clone(&log));
        (
            Delivery::new(Message::new("t", b"{}".to_vec()), Box::new(acker)),
            log,
        )
    }

    #[test]
    fn should_report_delivered_when_accepted() {
        let (d, log) = delivery();
        assert_eq!(d.accept(), DeliveryOutcome::Delivered);
        assert_eq!(*log.lock().unwrap(), vec![Verdict::Accept]);
    }

    #[test]
    fn should_report_dropped_when_rejected() {
        let (d, log) = delivery();
        assert_eq!(d.reject("boom"), DeliveryOutcome::Dropped);
        assert_eq!(
            *log.lock().unwrap(),
            vec![Verdict::Reject("boom".to_string())]
        );
    }

    #[test]
    fn should_reject_when_dropped_unsettled() {
        let (d, log) = delivery();
        drop(d);
        assert!(matches!(log.lock().unwrap()[0], Verdict::Reject(_)));
    }

    #[test]
    fn should_settle_only_once() {
        let (d, log) = delivery();
        d.accept();
        assert_eq!(log.lock().unwrap().len(), 1);
    }
}

//! Metrics sync consumer — applies metrics events to the durable post.
//!
//! One task per subscribed topic pulls deliveries in order, decodes them and
//! writes the carried absolute value into the matching counter column. Every
//! delivery is settled exactly once: accepted after a successful write, rejected
//! otherwise. A rejected message is gone; the next event for the same post
//! carries a fresh absolute value and repairs the row.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use quill_domain::clock::{Clock, SystemClock};
use quill_domain::error::{BusError, QuillError};
use quill_domain::event::{EventDecodeError, MetricsEvent, Topology};
use quill_domain::id::PostId;

use crate::ports::{Delivery, DeliveryOutcome, MessageSubscriber, PostRepository, Subscription};

/// Default bound on each durable-store call made while handling one message.
pub const DEFAULT_STORE_DEADLINE: Duration = Duration::from_secs(5);

/// Why a delivery was rejected.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("undecodable payload on topic {topic}")]
    Decode {
        topic: String,
        #[source]
        source: EventDecodeError,
    },

    #[error("post {0} does not exist or is deleted")]
    AggregateNotFound(PostId),

    #[error("failed to persist counter for post {post_id}")]
    Persistence {
        post_id: PostId,
        #[source]
        source: QuillError,
    },

    #[error("durable store did not answer within {0:?}")]
    Deadline(Duration),
}

/// Counts of one consumer loop, returned when it ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopSummary {
    pub topic: String,
    pub delivered: u64,
    pub dropped: u64,
}

/// Handle over the running consumer loops.
#[derive(Debug)]
pub struct ConsumerHandle {
    tasks: Vec<JoinHandle<LoopSummary>>,
}

impl ConsumerHandle {
    /// Wait for every loop to end (they end when the bus closes).
    pub async fn join(self) -> Vec<LoopSummary> {
        let mut summaries = Vec::with_capacity(self.tasks.len());
        for task in self.tasks {
            match task.await {
                Ok(summary) => summaries.push(summary),
                Err(err) => tracing::error!(error = %err, "metrics consumer loop panicked"),
            }
        }
        summaries
    }
}

/// Reconciles durable post counters from bus events.
pub struct MetricsSyncConsumer<R, K = SystemClock> {
    repo: R,
    clock: K,
    topology: Topology,
    deadline: Duration,
}

impl<R> MetricsSyncConsumer<R> {
    /// Create a consumer writing to `repo`, stamping with the system clock.
    pub fn new(repo: R, topology: Topology) -> Self {
        Self {
            repo,
            clock: SystemClock,
            topology,
            deadline: DEFAULT_STORE_DEADLINE,
        }
    }
}

impl<R, K> MetricsSyncConsumer<R, K> {
    /// Replace the clock used for `updated_at`.
    pub fn with_clock<K2: Clock>(self, clock: K2) -> MetricsSyncConsumer<R, K2> {
        MetricsSyncConsumer {
            repo: self.repo,
            clock,
            topology: self.topology,
            deadline: self.deadline,
        }
    }

    /// Bound each durable-store call.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }
}

impl<R, K> MetricsSyncConsumer<R, K>
where
    R: PostRepository + Send + Sync + 'static,
    K: Clock + 'static,
{
    /// Subscribe to every topic of the topology and spawn one loop per topic.
    ///
    /// Resolves only once each loop is registered and running, so anything
    /// published after this returns is observed.
    ///
    /// # Errors
    ///
    /// Returns the subscriber's error if any registration fails; no loop is
    /// started in that case. Returns [`BusError::NotReady`] if a loop ends
    /// before signalling readiness; the loops already spawned are aborted.
    pub async fn start<S: MessageSubscriber>(
        self: Arc<Self>,
        subscriber: &S,
    ) -> Result<ConsumerHandle, QuillError> {
        let mut subscriptions = Vec::new();
        for topic in self.topology.topics() {
            subscriptions.push(subscriber.subscribe(topic).await?);
        }

        let mut tasks = Vec::with_capacity(subscriptions.len());
        let mut ready = Vec::with_capacity(subscriptions.len());
        for (subscription, topic) in subscriptions.into_iter().zip(self.topology.topics()) {
            let (tx, rx) = oneshot::channel();
            tasks.push(tokio::spawn(Arc::clone(&self).run(subscription, tx)));
            ready.push((*topic, rx));
        }
        for (topic, rx) in ready {
            if rx.await.is_err() {
                tracing::error!(%topic, "metrics consumer loop exited before signalling readiness");
                for task in &tasks {
                    task.abort();
                }
                return Err(BusError::NotReady {
                    topic: topic.to_string(),
                }
                .into());
            }
        }

        tracing::info!(
            topology = ?self.topology,
            topics = ?self.topology.topics(),
            "metrics sync consumer started"
        );
        Ok(ConsumerHandle { tasks })
    }

    async fn run<T: Subscription>(
        self: Arc<Self>,
        mut subscription: T,
        ready: oneshot::Sender<()>,
    ) -> LoopSummary {
        let topic = subscription.topic().to_string();
        let mut summary = LoopSummary {
            topic: topic.clone(),
            delivered: 0,
            dropped: 0,
        };
        let _ = ready.send(());
        tracing::debug!(%topic, "metrics consumer loop running");

        while let Some(delivery) = subscription.next().await {
            match self.process(&topic, delivery).await {
                DeliveryOutcome::Delivered => summary.delivered += 1,
                DeliveryOutcome::Dropped => summary.dropped += 1,
            }
        }

        tracing::info!(
            %topic,
            delivered = summary.delivered,
            dropped = summary.dropped,
            "metrics consumer loop stopped"
        );
        summary
    }

    /// Handle one delivery and settle it.
    pub async fn process(&self, topic: &str, delivery: Delivery) -> DeliveryOutcome {
        match self.apply(topic, &delivery).await {
            Ok(()) => delivery.accept(),
            Err(err) => {
                tracing::warn!(
                    %topic,
                    message_id = %delivery.message().id,
                    error = %err,
                    "metrics event not applied"
                );
                delivery.reject(err.to_string())
            }
        }
    }

    async fn apply(&self, topic: &str, delivery: &Delivery) -> Result<(), SyncError> {
        let event = MetricsEvent::decode(topic, &delivery.message().payload).map_err(|source| {
            SyncError::Decode {
                topic: topic.to_string(),
                source,
            }
        })?;
        let post_id = event.post_id();

        let post = tokio::time::timeout(self.deadline, self.repo.find_by_id(post_id))
            .await
            .map_err(|_| SyncError::Deadline(self.deadline))?
            .map_err(|source| SyncError::Persistence { post_id, source })?;
        match post {
            Some(post) if !post.is_deleted() => {}
            _ => return Err(SyncError::AggregateNotFound(post_id)),
        }

        let update = event.counter_update();
        let written = tokio::time::timeout(
            self.deadline,
            self.repo.update_counter(post_id, update, self.clock.now()),
        )
        .await
        .map_err(|_| SyncError::Deadline(self.deadline))?;
        match written {
            Ok(()) => {}
            Err(QuillError::NotFound(_)) => return Err(SyncError::AggregateNotFound(post_id)),
            Err(source) => return Err(SyncError::Persistence { post_id, source }),
        }

        tracing::debug!(
            %post_id,
            kind = %event.kind(),
            value = update.value(),
            "post counter synchronized"
        );
        Ok(())
    }
}

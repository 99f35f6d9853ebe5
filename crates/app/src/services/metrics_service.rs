//! Metrics service — likes, unlikes and views against the counter store.
//!
//! Every mutation updates the counter store first and then publishes an
//! absolute-value event for the sync consumer. The call returns as soon as the
//! event is handed to the bus; the durable post catches up asynchronously.

use quill_domain::error::{LikeError, QuillError};
use quill_domain::event::{MetricsEvent, PostLiked, PostUnliked, PostViewed, Topology};
use quill_domain::id::{PostId, UserId};
use quill_domain::metrics::{MetricKind, PostMetrics, keys};

use crate::ports::{CounterStore, MessagePublisher};

/// Publishing side of the metrics pipeline.
pub struct MetricsService<C, P> {
    counters: C,
    publisher: P,
    topology: Topology,
}

impl<C, P> MetricsService<C, P>
where
    C: CounterStore,
    P: MessagePublisher,
{
    /// Create a service writing to `counters` and emitting on `publisher`.
    pub fn new(counters: C, publisher: P, topology: Topology) -> Self {
        Self {
            counters,
            publisher,
            topology,
        }
    }

    /// Count one view of a post.
    ///
    /// Best effort: failures are logged, never returned. Yields the new view
    /// count when the counter was updated.
    pub async fn record_view(&self, post_id: PostId) -> Option<i64> {
        let key = keys::counter(MetricKind::Views, post_id);
        let views = match self.counters.increment(&key).await {
            Ok(views) => views,
            Err(err) => {
                tracing::error!(%post_id, error = %err, "failed to increment views");
                return None;
            }
        };
        self.emit(MetricsEvent::Viewed(PostViewed { post_id, views }))
            .await;
        Some(views)
    }

    /// Like a post on behalf of a user. Returns the new like count.
    ///
    /// # Errors
    ///
    /// Returns [`LikeError::AlreadyLiked`] when the user already likes the
    /// post, or a storage error from the counter store.
    pub async fn like(&self, user_id: UserId, post_id: PostId) -> Result<i64, QuillError> {
        let marker = keys::like_marker(user_id, post_id);
        if !self.counters.set_if_absent(&marker, 1).await? {
            return Err(LikeError::AlreadyLiked { user_id, post_id }.into());
        }

        let likes_key = keys::counter(MetricKind::Likes, post_id);
        let likes = match self.counters.increment(&likes_key).await {
            Ok(likes) => likes,
            Err(err) => {
                // Without the increment the marker would claim a like nobody counted.
                if let Err(cleanup) = self.counters.delete(&marker).await {
                    tracing::error!(%user_id, %post_id, error = %cleanup, "failed to remove like marker");
                }
                return Err(err);
            }
        };

        self.emit(MetricsEvent::Liked(PostLiked {
            post_id,
            user_id,
            likes,
        }))
        .await;
        Ok(likes)
    }

    /// Remove a user's like from a post. Returns the new like count.
    ///
    /// # Errors
    ///
    /// Returns [`LikeError::NotLiked`] when the user does not like the post,
    /// or a storage error from the counter store.
    pub async fn unlike(&self, user_id: UserId, post_id: PostId) -> Result<i64, QuillError> {
        let marker = keys::like_marker(user_id, post_id);
        if !self.counters.delete(&marker).await? {
            return Err(LikeError::NotLiked { user_id, post_id }.into());
        }

        let likes_key = keys::counter(MetricKind::Likes, post_id);
        let likes = match self.counters.decrement_clamped(&likes_key).await {
            Ok(likes) if likes < 0 => {
                tracing::warn!(%post_id, likes, "like counter went negative, reset to zero");
                0
            }
            Ok(likes) => likes,
            Err(err) => {
                // The like is still counted, so the marker must stay for a retry.
                if let Err(restore) = self.counters.set_if_absent(&marker, 1).await {
                    tracing::error!(%user_id, %post_id, error = %restore, "failed to restore like marker");
                }
                return Err(err);
            }
        };

        self.emit(MetricsEvent::Unliked(PostUnliked {
            post_id,
            user_id,
            likes,
        }))
        .await;
        Ok(likes)
    }

    /// Current like count of a post.
    ///
    /// # Errors
    ///
    /// Returns a storage error from the counter store.
    pub async fn get_likes(&self, post_id: PostId) -> Result<i64, QuillError> {
        self.counters
            .get(&keys::counter(MetricKind::Likes, post_id))
            .await
    }

    /// Current view count of a post.
    ///
    /// # Errors
    ///
    /// Returns a storage error from the counter store.
    pub async fn get_views(&self, post_id: PostId) -> Result<i64, QuillError> {
        self.counters
            .get(&keys::counter(MetricKind::Views, post_id))
            .await
    }

    /// Whether the user currently likes the post.
    ///
    /// # Errors
    ///
    /// Returns a storage error from the counter store.
    pub async fn is_liked(&self, user_id: UserId, post_id: PostId) -> Result<bool, QuillError> {
        self.counters
            .exists(&keys::like_marker(user_id, post_id))
            .await
    }

    /// Both counters of a post, read in one batch.
    ///
    /// # Errors
    ///
    /// Returns a storage error from the counter store.
    pub async fn get_metrics(&self, post_id: PostId) -> Result<PostMetrics, QuillError> {
        let keys = [
            keys::counter(MetricKind::Likes, post_id),
            keys::counter(MetricKind::Views, post_id),
        ];
        let values = self.counters.get_many(&keys).await?;
        Ok(PostMetrics {
            likes: values.first().copied().unwrap_or(0),
            views: values.get(1).copied().unwrap_or(0),
        })
    }

    /// Encode and publish an event. Failures are logged and swallowed: the
    /// counter store stays authoritative for reads.
    async fn emit(&self, event: MetricsEvent) {
        let topic = self.topology.topic_for(event.kind());
        let payload = match event.encode(self.topology) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::error!(%topic, error = %err, "failed to encode metrics event");
                return;
            }
        };
        match self.publisher.publish(topic, payload).await {
            Ok(receipt) => tracing::debug!(
                %topic,
                kind = %event.kind(),
                post_id = %event.post_id(),
                message_id = %receipt.message_id,
                subscribers = receipt.subscribers,
                "metrics event published"
            ),
            Err(err) => tracing::error!(
                %topic,
                post_id = %event.post_id(),
                error = %err,
                "failed to publish metrics event"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter_store::InMemoryCounterStore;
    use crate::message_bus::{InProcessMessageBus, InProcessSubscription};
    use crate::ports::{MessageSubscriber, PublishReceipt, Subscription};
    use quill_domain::error::BusError;
    use quill_domain::event::topics;
    use std::future::Future;
    use std::sync::Arc;

    type Service = MetricsService<Arc<InMemoryCounterStore>, InProcessMessageBus>;

    fn make_service(topology: Topology) -> (Service, Arc<InMemoryCounterStore>, InProcessMessageBus) {
        let counters = Arc::new(InMemoryCounterStore::new());
        let bus = InProcessMessageBus::new();
        let svc = MetricsService::new(Arc::clone(&counters), bus.clone(), topology);
        (svc, counters, bus)
    }

    fn next_event(sub: &mut InProcessSubscription) -> MetricsEvent {
        let delivery = sub.try_next().expect("an event should have been published");
        let event = MetricsEvent::decode(sub.topic(), &delivery.message().payload).unwrap();
        delivery.accept();
        event
    }

    struct ClosedPublisher;

    impl MessagePublisher for ClosedPublisher {
        fn publish(
            &self,
            _topic: &str,
            _payload: Vec<u8>,
        ) -> impl Future<Output = Result<PublishReceipt, QuillError>> + Send {
            async { Err(BusError::Closed.into()) }
        }
    }

    /// Counter store whose clamped decrement always fails.
    struct FailingDecrement(InMemoryCounterStore);

    impl CounterStore for FailingDecrement {
        fn increment(&self, key: &str) -> impl Future<Output = Result<i64, QuillError>> + Send {
            self.0.increment(key)
        }

        fn decrement(&self, key: &str) -> impl Future<Output = Result<i64, QuillError>> + Send {
            self.0.decrement(key)
        }

        fn decrement_clamped(
            &self,
            _key: &str,
        ) -> impl Future<Output = Result<i64, QuillError>> + Send {
            async { Err(QuillError::Storage("connection reset".into())) }
        }

        fn get(&self, key: &str) -> impl Future<Output = Result<i64, QuillError>> + Send {
            self.0.get(key)
        }

        fn exists(&self, key: &str) -> impl Future<Output = Result<bool, QuillError>> + Send {
            self.0.exists(key)
        }

        fn set(&self, key: &str, value: i64) -> impl Future<Output = Result<(), QuillError>> + Send {
            self.0.set(key, value)
        }

        fn set_if_absent(
            &self,
            key: &str,
            value: i64,
        ) -> impl Future<Output = Result<bool, QuillError>> + Send {
            self.0.set_if_absent(key, value)
        }

        fn delete(&self, key: &str) -> impl Future<Output = Result<bool, QuillError>> + Send {
            self.0.delete(key)
        }
    }

    #[tokio::test]
    async fn should_count_likes_from_distinct_users() {
        let (svc, _, _) = make_service(Topology::Unified);
        let post = PostId::new(42);

        for user in 1..=5 {
            svc.like(UserId::new(user), post).await.unwrap();
        }
        assert_eq!(svc.get_likes(post).await.unwrap(), 5);

        svc.unlike(UserId::new(1), post).await.unwrap();
        svc.unlike(UserId::new(2), post).await.unwrap();
        assert_eq!(svc.get_likes(post).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn should_fail_second_like_from_same_user() {
        let (svc, _, _) = make_service(Topology::Unified);
        let (user, post) = (UserId::new(1), PostId::new(42));

        svc.like(user, post).await.unwrap();
        let result = svc.like(user, post).await;

        assert!(matches!(
            result,
            Err(QuillError::Like(LikeError::AlreadyLiked { .. }))
        ));
        assert_eq!(svc.get_likes(post).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn should_fail_unlike_without_prior_like() {
        let (svc, _, _) = make_service(Topology::Unified);
        let result = svc.unlike(UserId::new(1), PostId::new(42)).await;
        assert!(matches!(
            result,
            Err(QuillError::Like(LikeError::NotLiked { .. }))
        ));
        assert_eq!(svc.get_likes(PostId::new(42)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn should_track_like_membership() {
        let (svc, _, _) = make_service(Topology::Unified);
        let (user, post) = (UserId::new(1), PostId::new(42));

        assert!(!svc.is_liked(user, post).await.unwrap());
        svc.like(user, post).await.unwrap();
        assert!(svc.is_liked(user, post).await.unwrap());
        svc.unlike(user, post).await.unwrap();
        assert!(!svc.is_liked(user, post).await.unwrap());
    }

    #[tokio::test]
    async fn should_follow_like_unlike_scenario() {
        let (svc, _, _) = make_service(Topology::Unified);
        let post = PostId::new(42);
        let (u1, u2) = (UserId::new(1), UserId::new(2));

        svc.like(u1, post).await.unwrap();
        assert_eq!(svc.get_likes(post).await.unwrap(), 1);
        svc.like(u2, post).await.unwrap();
        assert_eq!(svc.get_likes(post).await.unwrap(), 2);
        svc.unlike(u1, post).await.unwrap();
        assert_eq!(svc.get_likes(post).await.unwrap(), 1);
        assert!(!svc.is_liked(u1, post).await.unwrap());
        assert!(svc.is_liked(u2, post).await.unwrap());
    }

    #[tokio::test]
    async fn should_publish_absolute_counts_on_unified_topic() {
        let (svc, _, bus) = make_service(Topology::Unified);
        let mut sub = bus.subscribe(topics::POST_METRICS).await.unwrap();
        let post = PostId::new(42);

        svc.like(UserId::new(1), post).await.unwrap();
        svc.like(UserId::new(2), post).await.unwrap();
        svc.unlike(UserId::new(1), post).await.unwrap();
        svc.record_view(post).await;

        assert_eq!(
            next_event(&mut sub),
            MetricsEvent::Liked(PostLiked {
                post_id: post,
                user_id: UserId::new(1),
                likes: 1
            })
        );
        assert_eq!(
            next_event(&mut sub),
            MetricsEvent::Liked(PostLiked {
                post_id: post,
                user_id: UserId::new(2),
                likes: 2
            })
        );
        assert_eq!(
            next_event(&mut sub),
            MetricsEvent::Unliked(PostUnliked {
                post_id: post,
                user_id: UserId::new(1),
                likes: 1
            })
        );
        assert_eq!(
            next_event(&mut sub),
            MetricsEvent::Viewed(PostViewed {
                post_id: post,
                views: 1
            })
        );
    }

    #[tokio::test]
    async fn should_publish_on_per_kind_topics() {
        let (svc, _, bus) = make_service(Topology::PerKind);
        let mut viewed = bus.subscribe(topics::POST_VIEWED).await.unwrap();
        let mut liked = bus.subscribe(topics::POST_LIKED).await.unwrap();
        let mut unliked = bus.subscribe(topics::POST_UNLIKED).await.unwrap();
        let (user, post) = (UserId::new(1), PostId::new(7));

        svc.record_view(post).await;
        svc.like(user, post).await.unwrap();
        svc.unlike(user, post).await.unwrap();

        assert_eq!(next_event(&mut viewed).kind(), quill_domain::event::EventKind::Viewed);
        assert_eq!(next_event(&mut liked).counter_update().value(), 1);
        assert_eq!(next_event(&mut unliked).counter_update().value(), 0);
    }

    #[tokio::test]
    async fn should_not_publish_when_like_is_refused() {
        let (svc, _, bus) = make_service(Topology::Unified);
        let (user, post) = (UserId::new(1), PostId::new(42));
        svc.like(user, post).await.unwrap();

        let mut sub = bus.subscribe(topics::POST_METRICS).await.unwrap();
        let _ = svc.like(user, post).await;

        assert!(sub.try_next().is_none());
    }

    #[tokio::test]
    async fn should_record_views_even_without_subscribers() {
        let (svc, _, bus) = make_service(Topology::Unified);
        let post = PostId::new(3);

        assert_eq!(svc.record_view(post).await, Some(1));
        assert_eq!(svc.record_view(post).await, Some(2));

        assert_eq!(svc.get_views(post).await.unwrap(), 2);
        assert_eq!(bus.stats(topics::POST_METRICS).unrouted, 2);
    }

    #[tokio::test]
    async fn should_keep_counter_when_publish_fails() {
        let counters = InMemoryCounterStore::new();
        let svc = MetricsService::new(counters, ClosedPublisher, Topology::Unified);
        let (user, post) = (UserId::new(1), PostId::new(42));

        assert_eq!(svc.like(user, post).await.unwrap(), 1);
        assert_eq!(svc.record_view(post).await, Some(1));
        assert_eq!(svc.get_likes(post).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn should_clamp_like_counter_at_zero() {
        let (svc, counters, _) = make_service(Topology::Unified);
        let (user, post) = (UserId::new(1), PostId::new(42));
        svc.like(user, post).await.unwrap();
        // Counter lost while the marker survived, e.g. after a partial flush.
        counters.delete("post:likes:42").await.unwrap();

        assert_eq!(svc.unlike(user, post).await.unwrap(), 0);
        assert_eq!(svc.get_likes(post).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn should_keep_like_when_decrement_fails() {
        let bus = InProcessMessageBus::new();
        let mut sub = bus.subscribe(topics::POST_METRICS).await.unwrap();
        let svc = MetricsService::new(
            FailingDecrement(InMemoryCounterStore::new()),
            bus.clone(),
            Topology::Unified,
        );
        let (user, post) = (UserId::new(1), PostId::new(42));
        svc.like(user, post).await.unwrap();
        next_event(&mut sub);

        let result = svc.unlike(user, post).await;

        assert!(matches!(result, Err(QuillError::Storage(_))));
        assert!(svc.is_liked(user, post).await.unwrap());
        assert_eq!(svc.get_likes(post).await.unwrap(), 1);
        assert!(sub.try_next().is_none());
        // The retry still sees the like instead of a conflict.
        assert!(matches!(
            svc.unlike(user, post).await,
            Err(QuillError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn should_read_metrics_in_one_call() {
        let (svc, _, _) = make_service(Topology::Unified);
        let post = PostId::new(9);
        svc.like(UserId::new(1), post).await.unwrap();
        svc.record_view(post).await;
        svc.record_view(post).await;

        let metrics = svc.get_metrics(post).await.unwrap();
        assert_eq!(metrics, PostMetrics { likes: 1, views: 2 });
        assert_eq!(
            svc.get_metrics(PostId::new(10)).await.unwrap(),
            PostMetrics::default()
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn should_accept_exactly_one_of_concurrent_identical_likes() {
        let (svc, _, _) = make_service(Topology::Unified);
        let svc = Arc::new(svc);
        let (user, post) = (UserId::new(1), PostId::new(42));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let svc = Arc::clone(&svc);
            handles.push(tokio::spawn(async move { svc.like(user, post).await }));
        }
        let mut accepted = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                accepted += 1;
            }
        }

        assert_eq!(accepted, 1);
        assert_eq!(svc.get_likes(post).await.unwrap(), 1);
    }
}

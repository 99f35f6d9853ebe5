//! Post metrics — counter kinds, snapshots, and the counter-store key layout.

use serde::{Deserialize, Serialize};

use crate::id::{PostId, UserId};

/// The two counters tracked per post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Likes,
    Views,
}

/// A point-in-time read of both counters of a post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostMetrics {
    pub likes: i64,
    pub views: i64,
}

/// Key layout inside the counter store.
///
/// These strings are shared with any other process reading the same store,
/// so they must stay stable.
pub mod keys {
    use super::{MetricKind, PostId, UserId};

    /// Counter key of a post metric, e.g. `post:likes:42`.
    #[must_use]
    pub fn counter(kind: MetricKind, post_id: PostId) -> String {
        match kind {
            MetricKind::Likes => format!("post:likes:{post_id}"),
            MetricKind::Views => format!("post:views:{post_id}"),
        }
    }

    /// Like-membership marker key, e.g. `user:1:liked:42`.
    #[must_use]
    pub fn like_marker(user_id: UserId, post_id: PostId) -> String {
        format!("user:{user_id}:liked:{post_id}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_format_counter_keys() {
        let post = PostId::new(42);
        assert_eq!(keys::counter(MetricKind::Likes, post), "post:likes:42");
        assert_eq!(keys::counter(MetricKind::Views, post), "post:views:42");
    }

    #[test]
    fn should_format_like_marker_key() {
        let key = keys::like_marker(UserId::new(1), PostId::new(42));
        assert_eq!(key, "user:1:liked:42");
    }

    #[test]
    fn should_default_metrics_to_zero() {
        assert_eq!(PostMetrics::default(), PostMetrics { likes: 0, views: 0 });
    }
}

//! Metrics events — immutable facts emitted after a counter changed.
//!
//! Every event carries the **absolute** counter value observed right after the
//! mutation, never a delta. Events are JSON-encoded on the wire:
//!
//! - `post.viewed`: `{"postId": 42, "views": 7}`
//! - `post.liked` / `post.unliked`: `{"postId": 42, "userId": 1, "likes": 3}`
//!
//! On the unified `post.metrics` topic the same objects carry an extra
//! `"type"` field holding the per-kind topic name.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::id::{PostId, UserId};
use crate::post::CounterUpdate;

/// Stable topic names shared by publishers and consumers.
pub mod topics {
    pub const POST_VIEWED: &str = "post.viewed";
    pub const POST_LIKED: &str = "post.liked";
    pub const POST_UNLIKED: &str = "post.unliked";
    /// Single ordered stream carrying every metrics event kind.
    pub const POST_METRICS: &str = "post.metrics";
}

/// Payload of a `post.viewed` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostViewed {
    pub post_id: PostId,
    pub views: i64,
}

/// Payload of a `post.liked` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostLiked {
    pub post_id: PostId,
    pub user_id: UserId,
    pub likes: i64,
}

/// Payload of a `post.unliked` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostUnliked {
    pub post_id: PostId,
    pub user_id: UserId,
    pub likes: i64,
}

/// Kind of a metrics event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Viewed,
    Liked,
    Unliked,
}

impl EventKind {
    /// Name of the dedicated per-kind topic.
    #[must_use]
    pub fn topic(self) -> &'static str {
        match self {
            Self::Viewed => topics::POST_VIEWED,
            Self::Liked => topics::POST_LIKED,
            Self::Unliked => topics::POST_UNLIKED,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.topic())
    }
}

/// Any metrics event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MetricsEvent {
    #[serde(rename = "post.viewed")]
    Viewed(PostViewed),
    #[serde(rename = "post.liked")]
    Liked(PostLiked),
    #[serde(rename = "post.unliked")]
    Unliked(PostUnliked),
}

impl MetricsEvent {
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Viewed(_) => EventKind::Viewed,
            Self::Liked(_) => EventKind::Liked,
            Self::Unliked(_) => EventKind::Unliked,
        }
    }

    #[must_use]
    pub fn post_id(&self) -> PostId {
        match self {
            Self::Viewed(e) => e.post_id,
            Self::Liked(e) => e.post_id,
            Self::Unliked(e) => e.post_id,
        }
    }

    /// The durable column write this event asks for.
    #[must_use]
    pub fn counter_update(&self) -> CounterUpdate {
        match self {
            Self::Viewed(e) => CounterUpdate::Views(e.views),
            Self::Liked(e) => CounterUpdate::Likes(e.likes),
            Self::Unliked(e) => CounterUpdate::Likes(e.likes),
        }
    }

    /// Serialize for the given topology.
    ///
    /// # Errors
    ///
    /// Returns the underlying `serde_json` error if serialization fails.
    pub fn encode(&self, topology: Topology) -> Result<Vec<u8>, serde_json::Error> {
        match topology {
            Topology::Unified => serde_json::to_vec(self),
            Topology::PerKind => match self {
                Self::Viewed(e) => serde_json::to_vec(e),
                Self::Liked(e) => serde_json::to_vec(e),
                Self::Unliked(e) => serde_json::to_vec(e),
            },
        }
    }

    /// Decode a payload received on `topic`.
    ///
    /// Per-kind topics carry the bare payload object; the unified topic
    /// carries the tagged form.
    ///
    /// # Errors
    ///
    /// Returns [`EventDecodeError`] for unknown topics or malformed JSON.
    pub fn decode(topic: &str, payload: &[u8]) -> Result<Self, EventDecodeError> {
        let event = match topic {
            topics::POST_METRICS => serde_json::from_slice(payload)?,
            topics::POST_VIEWED => Self::Viewed(serde_json::from_slice(payload)?),
            topics::POST_LIKED => Self::Liked(serde_json::from_slice(payload)?),
            topics::POST_UNLIKED => Self::Unliked(serde_json::from_slice(payload)?),
            other => return Err(EventDecodeError::UnknownTopic(other.to_string())),
        };
        Ok(event)
    }
}

/// Failure to turn a bus payload back into a [`MetricsEvent`].
#[derive(Debug, thiserror::Error)]
pub enum EventDecodeError {
    #[error("no metrics event is published on topic {0}")]
    UnknownTopic(String),

    #[error("malformed event payload")]
    Json(#[from] serde_json::Error),
}

/// How metrics events are laid out over topics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    /// One `post.metrics` topic: per-post ordering is total across kinds.
    #[default]
    Unified,
    /// One topic per kind (`post.viewed`, `post.liked`, `post.unliked`).
    /// A like and a following unlike may be applied out of order.
    PerKind,
}

impl Topology {
    /// Topic a given event kind is published on.
    #[must_use]
    pub fn topic_for(self, kind: EventKind) -> &'static str {
        match self {
            Self::Unified => topics::POST_METRICS,
            Self::PerKind => kind.topic(),
        }
    }

    /// Every topic a consumer has to subscribe to.
    #[must_use]
    pub fn topics(self) -> &'static [&'static str] {
        match self {
            Self::Unified => &[topics::POST_METRICS],
            Self::PerKind => &[
                topics::POST_VIEWED,
                topics::POST_LIKED,
                topics::POST_UNLIKED,
            ],
        }
    }
}

impl FromStr for Topology {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unified" => Ok(Self::Unified),
            "per_kind" | "per-kind" => Ok(Self::PerKind),
            other => Err(format!("unknown topology `{other}`")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn liked() -> MetricsEvent {
        MetricsEvent::Liked(PostLiked {
            post_id: PostId::new(42),
            user_id: UserId::new(1),
            likes: 3,
        })
    }

    #[test]
    fn should_encode_bare_payload_for_per_kind_topology() {
        let bytes = liked().encode(Topology::PerKind).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"postId": 42, "userId": 1, "likes": 3})
        );
    }

    #[test]
    fn should_encode_tagged_payload_for_unified_topology() {
        let event = MetricsEvent::Viewed(PostViewed {
            post_id: PostId::new(42),
            views: 7,
        });
        let bytes = event.encode(Topology::Unified).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"type": "post.viewed", "postId": 42, "views": 7})
        );
    }

    #[test]
    fn should_decode_bare_payload_by_topic() {
        let event = MetricsEvent::decode(topics::POST_VIEWED, br#"{"postId":5,"views":7}"#).unwrap();
        assert_eq!(
            event,
            MetricsEvent::Viewed(PostViewed {
                post_id: PostId::new(5),
                views: 7
            })
        );
    }

    #[test]
    fn should_decode_tagged_payload_from_unified_topic() {
        let payload = br#"{"type":"post.unliked","postId":42,"userId":1,"likes":0}"#;
        let event = MetricsEvent::decode(topics::POST_METRICS, payload).unwrap();
        assert_eq!(event.kind(), EventKind::Unliked);
        assert_eq!(event.counter_update(), CounterUpdate::Likes(0));
    }

    #[test]
    fn should_fail_to_decode_malformed_payload() {
        let result = MetricsEvent::decode(topics::POST_LIKED, b"not json");
        assert!(matches!(result, Err(EventDecodeError::Json(_))));
    }

    #[test]
    fn should_fail_to_decode_unknown_topic() {
        let result = MetricsEvent::decode("post.created", b"{}");
        assert!(matches!(result, Err(EventDecodeError::UnknownTopic(_))));
    }

    #[test]
    fn should_route_every_kind_to_one_topic_when_unified() {
        for kind in [EventKind::Viewed, EventKind::Liked, EventKind::Unliked] {
            assert_eq!(Topology::Unified.topic_for(kind), topics::POST_METRICS);
        }
        assert_eq!(Topology::Unified.topics(), &[topics::POST_METRICS]);
    }

    #[test]
    fn should_route_each_kind_to_its_own_topic_when_per_kind() {
        assert_eq!(
            Topology::PerKind.topic_for(EventKind::Unliked),
            topics::POST_UNLIKED
        );
        assert_eq!(Topology::PerKind.topics().len(), 3);
    }

    #[test]
    fn should_parse_topology_names() {
        assert_eq!("unified".parse::<Topology>().unwrap(), Topology::Unified);
        assert_eq!("per_kind".parse::<Topology>().unwrap(), Topology::PerKind);
        assert!("fanout".parse::<Topology>().is_err());
    }
}

//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into [`QuillError`]
//! via `#[from]`. Adapter-level failures are boxed into [`QuillError::Storage`].

use crate::id::{PostId, UserId};

/// Top-level error shared by the application core and its adapters.
#[derive(Debug, thiserror::Error)]
pub enum QuillError {
    /// A domain invariant was violated by the input.
    #[error("validation error")]
    Validation(#[from] ValidationError),

    /// The requested record does not exist.
    #[error("not found")]
    NotFound(#[from] NotFoundError),

    /// A like/unlike request conflicts with the current membership state.
    #[error("like conflict")]
    Like(#[from] LikeError),

    /// A storage backend (durable store or counter store) failed.
    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The message bus refused a publish or subscribe.
    #[error("message bus error")]
    Bus(#[from] BusError),
}

/// Domain validation failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A post title was empty or shorter than the minimum length.
    #[error("title must be at least {min} characters long")]
    TitleTooShort { min: usize },

    /// An identifier could not be parsed.
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

/// A lookup that found nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// Like-membership conflicts, surfaced to callers as 4xx-equivalents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LikeError {
    /// The user already holds a like marker for the post.
    #[error("user {user_id} already liked post {post_id}")]
    AlreadyLiked { user_id: UserId, post_id: PostId },

    /// The user holds no like marker for the post.
    #[error("user {user_id} has not liked post {post_id}")]
    NotLiked { user_id: UserId, post_id: PostId },
}

/// Message bus failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    /// The bus was closed; no further publishes or subscriptions are accepted.
    #[error("message bus is closed")]
    Closed,

    /// A consumer loop ended before it started listening on its topic.
    #[error("consumer on topic {topic} exited before it was ready")]
    NotReady { topic: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_convert_like_error_into_quill_error() {
        let err: QuillError = LikeError::AlreadyLiked {
            user_id: UserId::new(1),
            post_id: PostId::new(42),
        }
        .into();
        assert!(matches!(
            err,
            QuillError::Like(LikeError::AlreadyLiked { .. })
        ));
    }

    #[test]
    fn should_render_not_found_message() {
        let err = NotFoundError {
            entity: "Post",
            id: "42".to_string(),
        };
        assert_eq!(err.to_string(), "Post 42 not found");
    }

    #[test]
    fn should_render_like_error_with_ids() {
        let err = LikeError::NotLiked {
            user_id: UserId::new(7),
            post_id: PostId::new(3),
        };
        assert_eq!(err.to_string(), "user 7 has not liked post 3");
    }
}

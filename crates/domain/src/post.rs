//! Post — the durable aggregate whose counters the sync pipeline reconciles.

use serde::{Deserialize, Serialize};

use crate::clock::{Timestamp, now};
use crate::error::{QuillError, ValidationError};
use crate::id::{PostId, UserId};
use crate::metrics::MetricKind;

/// Minimum length of a trimmed post title.
pub const MIN_TITLE_LEN: usize = 3;

/// A blog post as persisted in the durable store.
///
/// `like_count` and `view_count` mirror the counter store. They are written only
/// by the metrics sync consumer and always hold an absolute value taken from the
/// latest applied event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub user_id: UserId,
    pub title: String,
    pub description: String,
    pub tag: String,
    pub like_count: i64,
    pub view_count: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
}

impl Post {
    /// Create a builder for constructing a [`Post`].
    #[must_use]
    pub fn builder() -> PostBuilder {
        PostBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`QuillError::Validation`] when the trimmed title is shorter
    /// than [`MIN_TITLE_LEN`].
    pub fn validate(&self) -> Result<(), QuillError> {
        if self.title.trim().chars().count() < MIN_TITLE_LEN {
            return Err(ValidationError::TitleTooShort { min: MIN_TITLE_LEN }.into());
        }
        Ok(())
    }

    /// Whether the post has been soft-deleted.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Overwrite a counter with an absolute value and stamp `updated_at`.
    pub fn apply_counter(&mut self, update: CounterUpdate, at: Timestamp) {
        match update {
            CounterUpdate::Likes(value) => self.like_count = value,
            CounterUpdate::Views(value) => self.view_count = value,
        }
        self.updated_at = at;
    }
}

/// A targeted write of one counter column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterUpdate {
    Likes(i64),
    Views(i64),
}

impl CounterUpdate {
    /// The metric this update targets.
    #[must_use]
    pub fn kind(self) -> MetricKind {
        match self {
            Self::Likes(_) => MetricKind::Likes,
            Self::Views(_) => MetricKind::Views,
        }
    }

    /// The absolute value being written.
    #[must_use]
    pub fn value(self) -> i64 {
        match self {
            Self::Likes(value) | Self::Views(value) => value,
        }
    }
}

/// Step-by-step builder for [`Post`].
#[derive(Debug, Default)]
pub struct PostBuilder {
    id: Option<PostId>,
    user_id: Option<UserId>,
    title: Option<String>,
    description: Option<String>,
    tag: Option<String>,
}

impl PostBuilder {
    #[must_use]
    pub fn id(mut self, id: PostId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn user_id(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Consume the builder, validate, and return a [`Post`] with zeroed counters.
    ///
    /// An id left unset stays at `0`; the durable store assigns the real one.
    ///
    /// # Errors
    ///
    /// Returns [`QuillError::Validation`] if the title is missing or too short.
    pub fn build(self) -> Result<Post, QuillError> {
        let ts = now();
        let post = Post {
            id: self.id.unwrap_or(PostId::new(0)),
            user_id: self.user_id.unwrap_or(UserId::new(0)),
            title: self.title.unwrap_or_default().trim().to_string(),
            description: self.description.unwrap_or_default(),
            tag: self.tag.unwrap_or_default(),
            like_count: 0,
            view_count: 0,
            created_at: ts,
            updated_at: ts,
            deleted_at: None,
        };
        post.validate()?;
        Ok(post)
    }
}

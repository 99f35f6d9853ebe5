//! Post repository port — the durable store for post aggregates.

use std::future::Future;

use quill_domain::clock::Timestamp;
use quill_domain::error::QuillError;
use quill_domain::id::PostId;
use quill_domain::post::{CounterUpdate, Post};

/// Repository for persisting and querying [`Post`]s.
///
/// Counter columns are written through [`update_counter`](Self::update_counter)
/// only, one column at a time, so concurrent writers of different metrics never
/// overwrite each other.
pub trait PostRepository {
    /// Insert a new post; the store assigns its id.
    fn create(&self, post: Post) -> impl Future<Output = Result<Post, QuillError>> + Send;

    /// Get a post by id, soft-deleted ones included.
    fn find_by_id(&self, id: PostId)
    -> impl Future<Output = Result<Option<Post>, QuillError>> + Send;

    /// Overwrite one counter column of a live post and stamp `updated_at`.
    ///
    /// Returns [`QuillError::NotFound`] when no live post with `id` exists.
    fn update_counter(
        &self,
        id: PostId,
        update: CounterUpdate,
        updated_at: Timestamp,
    ) -> impl Future<Output = Result<(), QuillError>> + Send;

    /// Soft-delete a post.
    ///
    /// Returns [`QuillError::NotFound`] when no live post with `id` exists.
    fn delete(&self, id: PostId) -> impl Future<Output = Result<(), QuillError>> + Send;
}

impl<T: PostRepository + Send + Sync> PostRepository for std::sync::Arc<T> {
    fn create(&self, post: Post) -> impl Future<Output = Result<Post, QuillError>> + Send {
        (**self).create(post)
    }

    fn find_by_id(
        &self,
        id: PostId,
    ) -> impl Future<Output = Result<Option<Post>, QuillError>> + Send {
        (**self).find_by_id(id)
    }

    fn update_counter(
        &self,
        id: PostId,
        update: CounterUpdate,
        updated_at: Timestamp,
    ) -> impl Future<Output = Result<(), QuillError>> + Send {
        (**self).update_counter(id, update, updated_at)
    }

    fn delete(&self, id: PostId) -> impl Future<Output = Result<(), QuillError>> + Send {
        (**self).delete(id)
    }
}

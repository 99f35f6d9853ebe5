//! `SQLite` implementation of [`PostRepository`].

use std::future::Future;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use quill_app::ports::PostRepository;
use quill_domain::clock::{Timestamp, now};
use quill_domain::error::{NotFoundError, QuillError};
use quill_domain::id::{PostId, UserId};
use quill_domain::metrics::MetricKind;
use quill_domain::post::{CounterUpdate, Post};

use crate::error::StorageError;

/// Wrapper for converting database rows into domain [`Post`].
struct Wrapper(Post);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<Post> {
        value.map(|w| w.0)
    }
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self(Post {
            id: PostId::new(row.try_get("id")?),
            user_id: UserId::new(row.try_get("user_id")?),
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            tag: row.try_get("tag")?,
            like_count: row.try_get("like_count")?,
            view_count: row.try_get("view_count")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            deleted_at: row.try_get("deleted_at")?,
        }))
    }
}

const INSERT: &str = "INSERT INTO posts (id, user_id, title, description, tag, like_count, view_count, created_at, updated_at, deleted_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";
const SELECT_BY_ID: &str = "SELECT * FROM posts WHERE id = ?";
const UPDATE_LIKES: &str =
    "UPDATE posts SET like_count = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL";
const UPDATE_VIEWS: &str =
    "UPDATE posts SET view_count = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL";
const SOFT_DELETE: &str =
    "UPDATE posts SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL";

fn not_found(id: PostId) -> QuillError {
    NotFoundError {
        entity: "Post",
        id: id.to_string(),
    }
    .into()
}

/// `SQLite`-backed post repository.
pub struct SqlitePostRepository {
    pool: SqlitePool,
}

impl SqlitePostRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl PostRepository for SqlitePostRepository {
    fn create(&self, post: Post) -> impl Future<Output = Result<Post, QuillError>> + Send {
        let pool = self.pool.clone();
        async move {
            post.validate()?;
            // A zero id lets SQLite assign the next rowid.
            let explicit_id = (post.id.get() > 0).then_some(post.id.get());
            let result = sqlx::query(INSERT)
                .bind(explicit_id)
                .bind(post.user_id.get())
                .bind(&post.title)
                .bind(&post.description)
                .bind(&post.tag)
                .bind(post.like_count)
                .bind(post.view_count)
                .bind(post.created_at)
                .bind(post.updated_at)
                .bind(post.deleted_at)
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(Post {
                id: PostId::new(result.last_insert_rowid()),
                ..post
            })
        }
    }

    fn find_by_id(
        &self,
        id: PostId,
    ) -> impl Future<Output = Result<Option<Post>, QuillError>> + Send {
        let pool = self.pool.clone();
        async move {
            let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
                .bind(id.get())
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(Wrapper::maybe(row))
        }
    }

    fn update_counter(
        &self,
        id: PostId,
        update: CounterUpdate,
        updated_at: Timestamp,
    ) -> impl Future<Output = Result<(), QuillError>> + Send {
        let pool = self.pool.clone();
        async move {
            let statement = match update.kind() {
                MetricKind::Likes => UPDATE_LIKES,
                MetricKind::Views => UPDATE_VIEWS,
            };
            let result = sqlx::query(statement)
                .bind(update.value())
                .bind(updated_at)
                .bind(id.get())
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            if result.rows_affected() == 0 {
                return Err(not_found(id));
            }
            Ok(())
        }
    }

    fn delete(&self, id: PostId) -> impl Future<Output = Result<(), QuillError>> + Send {
        let pool = self.pool.clone();
        async move {
            let at = now();
            let result = sqlx::query(SOFT_DELETE)
                .bind(at)
                .bind(at)
                .bind(id.get())
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            if result.rows_affected() == 0 {
                return Err(not_found(id));
            }
            Ok(())
        }
    }
}

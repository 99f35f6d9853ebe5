//! Redis-specific error type.

use quill_domain::error::QuillError;

/// Errors originating from the Redis counter store.
#[derive(Debug, thiserror::Error)]
pub enum RedisStoreError {
    /// The connection URL could not be parsed or the server was unreachable.
    #[error("unable to connect to redis")]
    Connect(#[source] redis::RedisError),

    /// A command failed.
    #[error("redis command failed")]
    Command(#[from] redis::RedisError),
}

impl From<RedisStoreError> for QuillError {
    fn from(err: RedisStoreError) -> Self {
        Self::Storage(Box::new(err))
    }
}

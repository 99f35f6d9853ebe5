//! Redis implementation of [`CounterStore`].

use std::future::Future;

use redis::aio::ConnectionManager;

use quill_app::ports::CounterStore;
use quill_domain::error::QuillError;

use crate::error::RedisStoreError;

// DECR and the floor check run as one script so no other client sees the
// negative value.
const DECREMENT_CLAMPED: &str = r"
    local value = redis.call('DECR', KEYS[1])
    if value < 0 then
        redis.call('SET', KEYS[1], 0)
    end
    return value
";

/// Configuration for the Redis counter store.
pub struct Config {
    /// Redis connection URL (e.g. `redis://127.0.0.1:6379/0`).
    pub url: String,
}

impl Config {
    /// Open a managed connection and build the store.
    ///
    /// # Errors
    ///
    /// Returns [`RedisStoreError::Connect`] if the URL is invalid or the
    /// server cannot be reached.
    pub async fn build(self) -> Result<RedisCounterStore, RedisStoreError> {
        let client = redis::Client::open(self.url.as_str()).map_err(RedisStoreError::Connect)?;
        let connection = client
            .get_connection_manager()
            .await
            .map_err(RedisStoreError::Connect)?;
        tracing::info!("connected to redis counter store");
        Ok(RedisCounterStore { connection })
    }
}

/// Redis-backed counter store.
///
/// Each operation is one Redis command or script, so atomicity comes from the
/// server.
/// Clones share the same managed connection.
#[derive(Clone)]
pub struct RedisCounterStore {
    connection: ConnectionManager,
}

impl RedisCounterStore {
    /// Run one command on a clone of the managed connection.
    fn query<T>(&self, cmd: redis::Cmd) -> impl Future<Output = Result<T, QuillError>> + Send
    where
        T: redis::FromRedisValue + Send,
    {
        let mut conn = self.connection.clone();
        async move {
            let value = cmd
                .query_async(&mut conn)
                .await
                .map_err(RedisStoreError::from)?;
            Ok(value)
        }
    }
}

impl CounterStore for RedisCounterStore {
    fn increment(&self, key: &str) -> impl Future<Output = Result<i64, QuillError>> + Send {
        let mut cmd = redis::cmd("INCR");
        cmd.arg(key);
        self.query(cmd)
    }

    fn decrement(&self, key: &str) -> impl Future<Output = Result<i64, QuillError>> + Send {
        let mut cmd = redis::cmd("DECR");
        cmd.arg(key);
        self.query(cmd)
    }

    fn decrement_clamped(&self, key: &str) -> impl Future<Output = Result<i64, QuillError>> + Send {
        let key = key.to_string();
        let mut conn = self.connection.clone();
        async move {
            let value: i64 = redis::Script::new(DECREMENT_CLAMPED)
                .key(key)
                .invoke_async(&mut conn)
                .await
                .map_err(RedisStoreError::from)?;
            Ok(value)
        }
    }

    fn get(&self, key: &str) -> impl Future<Output = Result<i64, QuillError>> + Send {
        let mut cmd = redis::cmd("GET");
        cmd.arg(key);
        let value = self.query::<Option<i64>>(cmd);
        async move { Ok(value.await?.unwrap_or(0)) }
    }

    fn exists(&self, key: &str) -> impl Future<Output = Result<bool, QuillError>> + Send {
        let mut cmd = redis::cmd("EXISTS");
        cmd.arg(key);
        self.query(cmd)
    }

    fn set(&self, key: &str, value: i64) -> impl Future<Output = Result<(), QuillError>> + Send {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        self.query(cmd)
    }

    fn set_if_absent(
        &self,
        key: &str,
        value: i64,
    ) -> impl Future<Output = Result<bool, QuillError>> + Send {
        // SET NX replies OK when it wrote, nil when the key already existed.
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value).arg("NX");
        let reply = self.query::<Option<String>>(cmd);
        async move { Ok(reply.await?.is_some()) }
    }

    fn delete(&self, key: &str) -> impl Future<Output = Result<bool, QuillError>> + Send {
        let mut cmd = redis::cmd("DEL");
        cmd.arg(key);
        let removed = self.query::<i64>(cmd);
        async move { Ok(removed.await? > 0) }
    }

    fn get_many(&self, keys: &[String]) -> impl Future<Output = Result<Vec<i64>, QuillError>> + Send {
        let pending = if keys.is_empty() {
            None
        } else {
            let mut cmd = redis::cmd("MGET");
            cmd.arg(keys);
            Some(self.query::<Vec<Option<i64>>>(cmd))
        };
        async move {
            let Some(pending) = pending else {
                return Ok(Vec::new());
            };
            Ok(pending
                .await?
                .into_iter()
                .map(|value| value.unwrap_or(0))
                .collect())
        }
    }
}

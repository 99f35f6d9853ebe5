//! Counter store port — fast atomic integer counters.

use std::future::Future;

use quill_domain::error::QuillError;

/// A key-addressed store of integers with per-key atomic operations.
///
/// Keys have no TTL. Reading an absent key yields `0`, never an error.
/// Nothing is guaranteed about ordering across different keys, and the store
/// does not prevent a counter from going negative.
pub trait CounterStore: Send + Sync {
    /// Atomically add one and return the new value (absent counts as `0`).
    fn increment(&self, key: &str) -> impl Future<Output = Result<i64, QuillError>> + Send;

    /// Atomically subtract one and return the new value (absent counts as `0`).
    fn decrement(&self, key: &str) -> impl Future<Output = Result<i64, QuillError>> + Send;

    /// Atomically subtract one, storing `0` instead of a negative result.
    ///
    /// Returns the unclamped value, so a result below zero tells the caller
    /// the counter was already at or below zero before this call.
    fn decrement_clamped(&self, key: &str)
    -> impl Future<Output = Result<i64, QuillError>> + Send;

    /// Read a value, `0` when absent.
    fn get(&self, key: &str) -> impl Future<Output = Result<i64, QuillError>> + Send;

    /// Whether the key is present.
    fn exists(&self, key: &str) -> impl Future<Output = Result<bool, QuillError>> + Send;

    /// Unconditionally store a value.
    fn set(&self, key: &str, value: i64) -> impl Future<Output = Result<(), QuillError>> + Send;

    /// Store `value` only if the key is absent.
    ///
    /// Returns `true` when this call inserted the key.
    fn set_if_absent(
        &self,
        key: &str,
        value: i64,
    ) -> impl Future<Output = Result<bool, QuillError>> + Send;

    /// Remove a key.
    ///
    /// Returns `true` when the key existed and this call removed it.
    fn delete(&self, key: &str) -> impl Future<Output = Result<bool, QuillError>> + Send;

    /// Read several values at once, `0` for each absent key.
    ///
    /// The default reads keys one by one; remote stores should batch.
    fn get_many(&self, keys: &[String]) -> impl Future<Output = Result<Vec<i64>, QuillError>> + Send {
        async move {
            let mut values = Vec::with_capacity(keys.len());
            for key in keys {
                values.push(self.get(key).await?);
            }
            Ok(values)
        }
    }
}

impl<T: CounterStore> CounterStore for std::sync::Arc<T> {
    fn increment(&self, key: &str) -> impl Future<Output = Result<i64, QuillError>> + Send {
        (**self).increment(key)
    }

    fn decrement(&self, key: &str) -> impl Future<Output = Result<i64, QuillError>> + Send {
        (**self).decrement(key)
    }

    fn decrement_clamped(&self, key: &str) -> impl Future<Output = Result<i64, QuillError>> + Send {
        (**self).decrement_clamped(key)
    }

    fn get(&self, key: &str) -> impl Future<Output = Result<i64, QuillError>> + Send {
        (**self).get(key)
    }

    fn exists(&self, key: &str) -> impl Future<Output = Result<bool, QuillError>> + Send {
        (**self).exists(key)
    }

    fn set(&self, key: &str, value: i64) -> impl Future<Output = Result<(), QuillError>> + Send {
        (**self).set(key, value)
    }

    fn set_if_absent(
        &self,
        key: &str,
        value: i64,
    ) -> impl Future<Output = Result<bool, QuillError>> + Send {
        (**self).set_if_absent(key, value)
    }

    fn delete(&self, key: &str) -> impl Future<Output = Result<bool, QuillError>> + Send {
        (**self).delete(key)
    }

    fn get_many(&self, keys: &[String]) -> impl Future<Output = Result<Vec<i64>, QuillError>> + Send {
        (**self).get_many(keys)
    }
}

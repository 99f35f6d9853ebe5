//! In-process counter store backed by a mutex-guarded map.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use quill_domain::error::QuillError;

use crate::ports::CounterStore;

/// In-memory [`CounterStore`].
///
/// Every operation runs under one lock, which makes each of them atomic with
/// respect to concurrent callers. Values live as long as the process.
#[derive(Debug, Default)]
pub struct InMemoryCounterStore {
    values: Mutex<HashMap<String, i64>>,
}

impl InMemoryCounterStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> MutexGuard<'_, HashMap<String, i64>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn add(&self, key: &str, delta: i64) -> i64 {
        let mut values = self.values();
        let value = values.entry(key.to_string()).or_insert(0);
        *value += delta;
        *value
    }
}

impl CounterStore for InMemoryCounterStore {
    fn increment(&self, key: &str) -> impl Future<Output = Result<i64, QuillError>> + Send {
        let value = self.add(key, 1);
        async move { Ok(value) }
    }

    fn decrement(&self, key: &str) -> impl Future<Output = Result<i64, QuillError>> + Send {
        let value = self.add(key, -1);
        async move { Ok(value) }
    }

    fn decrement_clamped(&self, key: &str) -> impl Future<Output = Result<i64, QuillError>> + Send {
        let mut values = self.values();
        let value = values.entry(key.to_string()).or_insert(0);
        let decremented = *value - 1;
        *value = decremented.max(0);
        drop(values);
        async move { Ok(decremented) }
    }

    fn get(&self, key: &str) -> impl Future<Output = Result<i64, QuillError>> + Send {
        let value = self.values().get(key).copied().unwrap_or(0);
        async move { Ok(value) }
    }

    fn exists(&self, key: &str) -> impl Future<Output = Result<bool, QuillError>> + Send {
        let present = self.values().contains_key(key);
        async move { Ok(present) }
    }

    fn set(&self, key: &str, value: i64) -> impl Future<Output = Result<(), QuillError>> + Send {
        self.values().insert(key.to_string(), value);
        async { Ok(()) }
    }

    fn set_if_absent(
        &self,
        key: &str,
        value: i64,
    ) -> impl Future<Output = Result<bool, QuillError>> + Send {
        let mut values = self.values();
        let inserted = if values.contains_key(key) {
            false
        } else {
            values.insert(key.to_string(), value);
            true
        };
        drop(values);
        async move { Ok(inserted) }
    }

    fn delete(&self, key: &str) -> impl Future<Output = Result<bool, QuillError>> + Send {
        let existed = self.values().remove(key).is_some();
        async move { Ok(existed) }
    }

    fn get_many(&self, keys: &[String]) -> impl Future<Output = Result<Vec<i64>, QuillError>> + Send {
        let values = self.values();
        let result: Vec<i64> = keys
            .iter()
            .map(|key| values.get(key).copied().unwrap_or(0))
            .collect();
        drop(values);
        async move { Ok(result) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn should_read_absent_key_as_zero() {
        let store = InMemoryCounterStore::new();
        assert_eq!(store.get("post:likes:1").await.unwrap(), 0);
        assert!(!store.exists("post:likes:1").await.unwrap());
    }

    #[tokio::test]
    async fn should_increment_and_decrement_from_zero() {
        let store = InMemoryCounterStore::new();
        assert_eq!(store.increment("k").await.unwrap(), 1);
        assert_eq!(store.increment("k").await.unwrap(), 2);
        assert_eq!(store.decrement("k").await.unwrap(), 1);
        assert_eq!(store.get("k").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn should_allow_negative_values() {
        let store = InMemoryCounterStore::new();
        assert_eq!(store.decrement("k").await.unwrap(), -1);
    }

    #[tokio::test]
    async fn should_clamp_decrement_at_zero_and_report_raw_value() {
        let store = InMemoryCounterStore::new();
        store.set("k", 1).await.unwrap();
        assert_eq!(store.decrement_clamped("k").await.unwrap(), 0);
        assert_eq!(store.decrement_clamped("k").await.unwrap(), -1);
        assert_eq!(store.get("k").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn should_insert_only_once_with_set_if_absent() {
        let store = InMemoryCounterStore::new();
        assert!(store.set_if_absent("marker", 1).await.unwrap());
        assert!(!store.set_if_absent("marker", 1).await.unwrap());
        assert!(store.exists("marker").await.unwrap());
    }

    #[tokio::test]
    async fn should_report_whether_delete_removed_a_key() {
        let store = InMemoryCounterStore::new();
        store.set("k", 5).await.unwrap();
        assert!(store.delete("k").await.unwrap());
        assert!(!store.delete("k").await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn should_read_many_keys_with_zero_for_absent() {
        let store = InMemoryCounterStore::new();
        store.set("a", 3).await.unwrap();
        let values = store
            .get_many(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(values, vec![3, 0]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn should_not_lose_concurrent_increments() {
        let store = Arc::new(InMemoryCounterStore::new());
        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.increment("views").await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(store.get("views").await.unwrap(), 50);
    }
}

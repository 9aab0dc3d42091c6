//! In-memory store backend.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{watch, Mutex};
use tracing::debug;

use super::{StoreSnapshot, TodoStore};
use crate::error::{Result, TodoError};

/// A store that lives in process memory.
///
/// Created either ready ([`InMemoryStore::new`]) or pending
/// ([`InMemoryStore::pending`]), in which case reads and writes fail with
/// `StoreNotReady` until [`InMemoryStore::mark_ready`] is called.
pub struct InMemoryStore {
    items: Mutex<HashMap<String, String>>,
    ready_tx: watch::Sender<bool>,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl InMemoryStore {
    /// Create a store that is ready immediately.
    pub fn new() -> Self {
        Self::with_state(HashMap::new(), true)
    }

    /// Create a store that reports ready only after [`Self::mark_ready`].
    pub fn pending() -> Self {
        Self::with_state(HashMap::new(), false)
    }

    /// Create a pending store preloaded with persisted items.
    pub fn preloaded(items: HashMap<String, String>) -> Self {
        Self::with_state(items, false)
    }

    fn with_state(items: HashMap<String, String>, ready: bool) -> Self {
        let (ready_tx, _) = watch::channel(ready);
        Self {
            items: Mutex::new(items),
            ready_tx,
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }

    /// Fire the readiness signal.
    pub fn mark_ready(&self) {
        self.ready_tx.send_replace(true);
    }

    pub fn is_ready(&self) -> bool {
        *self.ready_tx.borrow()
    }

    /// Number of `get_item` calls served.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Number of `set_item` calls served.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(TodoError::store_not_ready())
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TodoStore for InMemoryStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        self.ensure_ready()?;
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(self.items.lock().await.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.ensure_ready()?;
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.items
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        debug!(key = %key, bytes = value.len(), "In-memory store item written");
        Ok(())
    }

    async fn wait_ready(&self) -> Result<StoreSnapshot> {
        let mut rx = self.ready_tx.subscribe();
        rx.wait_for(|ready| *ready)
            .await
            .map_err(|_| TodoError::internal("readiness channel closed"))?;
        Ok(self.items.lock().await.clone())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let store = InMemoryStore::new();
        assert_eq!(store.get_item("todolist").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let store = InMemoryStore::new();
        store.set_item("todolist", "{}").await.unwrap();
        assert_eq!(store.get_item("todolist").await.unwrap().as_deref(), Some("{}"));
        assert_eq!(store.reads(), 1);
        assert_eq!(store.writes(), 1);
    }

    #[tokio::test]
    async fn test_pending_store_rejects_access() {
        let store = InMemoryStore::pending();
        let err = store.get_item("todolist").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::StoreNotReady);
        assert_eq!(store.reads(), 0);
    }

    #[tokio::test]
    async fn test_wait_ready_returns_snapshot_after_mark() {
        let mut items = HashMap::new();
        items.insert("todolist".to_string(), "{}".to_string());
        let store = Arc::new(InMemoryStore::preloaded(items));

        let waiter = tokio::spawn({
            let store = store.clone();
            async move { store.wait_ready().await }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        store.mark_ready();
        let snapshot = waiter.await.unwrap().unwrap();
        assert_eq!(snapshot.get("todolist").map(String::as_str), Some("{}"));
    }
}

//! Reconciliation engine - keeps the durable todo map in step with
//! lifecycle events.
//!
//! Until the store signals readiness every event mutates an in-memory
//! pre-store buffer and nothing touches the store or the publisher. Once
//! ready, each event is a read-modify-write of the stored map followed by a
//! best-effort publish of the whole map. The first ready event (or the
//! readiness callback itself with `drain_on_ready`) also migrates the buffer
//! into the store.

pub mod event;

pub use event::{LifecycleEvent, LifecyclePhase};

use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use crate::error::Result;
use crate::model::{merge, StoreMap, TodoItem};
use crate::publish::{PublishError, Publisher};
use crate::store::{StoreSnapshot, TodoStore};
use crate::telemetry::metrics;

/// Configuration for the ReconcileEngine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Item key the serialized map lives under
    pub store_key: String,

    /// Drain the buffer inside the readiness callback instead of waiting for
    /// the next event
    pub drain_on_ready: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            store_key: "todolist".to_string(),
            drain_on_ready: false,
        }
    }
}

/// The reconciliation state machine.
///
/// Owns the pre-store buffer and the readiness flag. Handlers take
/// `&mut self`; the owner is responsible for feeding events one at a time.
pub struct ReconcileEngine {
    store: Arc<dyn TodoStore>,
    publisher: Arc<dyn Publisher>,
    config: EngineConfig,
    buffer: StoreMap,
    ready: bool,
}

impl ReconcileEngine {
    pub fn new(
        store: Arc<dyn TodoStore>,
        publisher: Arc<dyn Publisher>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            publisher,
            config,
            buffer: StoreMap::new(),
            ready: false,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Items received before readiness and not yet migrated.
    pub fn buffer(&self) -> &StoreMap {
        &self.buffer
    }

    /// Readiness callback. The only writer of the readiness flag.
    ///
    /// With the default lazy drain nothing is replayed here; a buffer left
    /// non-empty stays unmigrated until the next event arrives.
    pub async fn on_store_ready(&mut self, snapshot: StoreSnapshot) -> Result<()> {
        if self.ready {
            warn!("Store readiness signalled twice, ignoring");
            return Ok(());
        }
        self.ready = true;
        info!(
            store = self.store.name(),
            snapshot_items = snapshot.len(),
            buffered = self.buffer.len(),
            "Store ready"
        );

        if self.config.drain_on_ready && !self.buffer.is_empty() {
            // Same precedence as create/update: durable entries win.
            let stored = self.load().await?;
            let map = merge(&self.buffer, &stored);
            self.persist(&map).await?;
            self.finish_drain();
            let _ = self.publish(&map).await;
        }

        Ok(())
    }

    /// Apply one lifecycle event.
    ///
    /// An `Err` means the store read or write failed; the event had no
    /// effect and the buffer is unchanged.
    #[instrument(skip(self, event), fields(phase = %event.phase, object = %event.object, task = %event.item.task))]
    pub async fn handle(&mut self, event: LifecycleEvent) -> Result<()> {
        metrics::record_event(event.phase.as_str());
        debug!(ready = self.ready, "ConfigMap event received");

        let result = match event.phase {
            LifecyclePhase::Created | LifecyclePhase::Updated => self.apply_upsert(event.item).await,
            LifecyclePhase::Deleted => self.apply_delete(&event.item.task).await,
        };

        if result.is_err() {
            metrics::record_event_failed();
        }
        result
    }

    /// Create/update handler.
    pub async fn apply_upsert(&mut self, item: TodoItem) -> Result<()> {
        if !self.ready {
            self.buffer.upsert(item);
            metrics::set_buffered_items(self.buffer.len());
            return Ok(());
        }

        let stored = self.load().await?;
        // Buffer is the base: anything already durable wins over a stale
        // buffered copy of the same task.
        let mut map = if self.buffer.is_empty() {
            stored
        } else {
            merge(&self.buffer, &stored)
        };
        map.upsert(item);

        self.persist(&map).await?;
        self.finish_drain();
        let _ = self.publish(&map).await;
        Ok(())
    }

    /// Delete handler.
    pub async fn apply_delete(&mut self, task: &str) -> Result<()> {
        if !self.ready {
            self.buffer.remove(task);
            metrics::set_buffered_items(self.buffer.len());
            return Ok(());
        }

        let stored = self.load().await?;
        // Reverse of apply_upsert: buffered entries win over stored ones.
        let mut map = if self.buffer.is_empty() {
            stored
        } else {
            merge(&stored, &self.buffer)
        };
        map.remove(task);

        self.persist(&map).await?;
        self.finish_drain();
        let _ = self.publish(&map).await;
        Ok(())
    }

    async fn load(&self) -> Result<StoreMap> {
        let raw = self.store.get_item(&self.config.store_key).await?;
        StoreMap::from_json(raw.as_deref())
    }

    async fn persist(&self, map: &StoreMap) -> Result<()> {
        let payload = map.to_json()?;
        self.store.set_item(&self.config.store_key, &payload).await?;
        metrics::record_store_write(map.len());
        debug!(items = map.len(), "Todo map persisted");
        Ok(())
    }

    /// Empty the buffer once its contents are durable.
    fn finish_drain(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let drained = self.buffer.len();
        self.buffer.clear();
        metrics::set_buffered_items(0);
        info!(drained, "Pre-store buffer migrated into store");
    }

    /// Publish the full map. Failures are logged here and returned so the
    /// caller discards them visibly; they never undo the store write.
    async fn publish(&self, map: &StoreMap) -> std::result::Result<(), PublishError> {
        match self.publisher.publish(map).await {
            Ok(()) => {
                metrics::record_publish("success");
                debug!(publisher = self.publisher.name(), items = map.len(), "Todo map published");
                Ok(())
            }
            Err(e) => {
                metrics::record_publish("failure");
                error!(
                    publisher = self.publisher.name(),
                    error = %e,
                    "Error applying todolist downstream"
                );
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::MemoryPublisher;
    use crate::store::InMemoryStore;

    fn engine() -> (ReconcileEngine, Arc<InMemoryStore>, Arc<MemoryPublisher>) {
        let store = Arc::new(InMemoryStore::new());
        let publisher = Arc::new(MemoryPublisher::new());
        let engine = ReconcileEngine::new(store.clone(), publisher.clone(), EngineConfig::default());
        (engine, store, publisher)
    }

    async fn stored(store: &InMemoryStore) -> StoreMap {
        let raw = store.get_item("todolist").await.unwrap();
        StoreMap::from_json(raw.as_deref()).unwrap()
    }

    #[tokio::test]
    async fn test_unready_events_only_touch_buffer() {
        let (mut engine, store, publisher) = engine();

        engine.apply_upsert(TodoItem::new("a", "todo")).await.unwrap();
        engine.apply_upsert(TodoItem::new("b", "todo")).await.unwrap();
        engine.apply_delete("b").await.unwrap();

        assert_eq!(engine.buffer().len(), 1);
        assert!(engine.buffer().contains("a"));
        assert_eq!(store.reads() + store.writes(), 0);
        assert_eq!(publisher.publish_count().await, 0);
    }

    #[tokio::test]
    async fn test_unready_delete_of_absent_task_is_noop() {
        let (mut engine, _store, _publisher) = engine();
        engine.apply_upsert(TodoItem::new("a", "todo")).await.unwrap();

        engine.apply_delete("never-seen").await.unwrap();
        assert_eq!(engine.buffer().len(), 1);
    }

    #[tokio::test]
    async fn test_ready_upsert_persists_and_publishes() {
        let (mut engine, store, publisher) = engine();
        engine.on_store_ready(StoreSnapshot::new()).await.unwrap();

        engine.apply_upsert(TodoItem::new("a", "todo")).await.unwrap();

        let expected: StoreMap = [TodoItem::new("a", "todo")].into_iter().collect();
        assert_eq!(stored(&store).await, expected);
        assert_eq!(publisher.current().await, Some(expected));
    }

    #[tokio::test]
    async fn test_second_ready_signal_is_ignored() {
        let (mut engine, store, _publisher) = engine();
        engine.on_store_ready(StoreSnapshot::new()).await.unwrap();
        engine.on_store_ready(StoreSnapshot::new()).await.unwrap();
        assert!(engine.is_ready());
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn test_delete_of_absent_task_when_ready_still_republishes() {
        let (mut engine, store, publisher) = engine();
        engine.on_store_ready(StoreSnapshot::new()).await.unwrap();

        engine.apply_delete("ghost").await.unwrap();

        assert!(stored(&store).await.is_empty());
        assert_eq!(publisher.current().await, Some(StoreMap::new()));
    }

    #[tokio::test]
    async fn test_handle_dispatches_by_phase() {
        let (mut engine, store, _publisher) = engine();
        engine.on_store_ready(StoreSnapshot::new()).await.unwrap();

        let item = TodoItem::new("a", "todo");
        engine
            .handle(LifecycleEvent::new(LifecyclePhase::Created, "cm-a", item.clone()))
            .await
            .unwrap();
        assert!(stored(&store).await.contains("a"));

        engine
            .handle(LifecycleEvent::new(LifecyclePhase::Deleted, "cm-a", item))
            .await
            .unwrap();
        assert!(stored(&store).await.is_empty());
    }
}

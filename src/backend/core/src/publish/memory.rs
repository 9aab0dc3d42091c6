//! Publisher that keeps the mirror in memory.
//!
//! Used for `--dry-run` and by tests that need to inspect what went
//! downstream.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::info;

use super::{PublishError, Publisher};
use crate::model::StoreMap;

#[derive(Default)]
pub struct MemoryPublisher {
    mirror: Mutex<Option<StoreMap>>,
    history: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current mirror, `None` if nothing was ever published.
    pub async fn current(&self) -> Option<StoreMap> {
        self.mirror.lock().await.clone()
    }

    /// Every payload published so far, oldest first.
    pub async fn history(&self) -> Vec<String> {
        self.history.lock().await.clone()
    }

    pub async fn publish_count(&self) -> usize {
        self.history.lock().await.len()
    }

    /// Reject every later publish with [`PublishError::Closed`].
    pub fn close(&self) {
        self.closed.store(true, Ordering::Relaxed);
    }

    /// Accept publishes again after [`MemoryPublisher::close`].
    pub fn reopen(&self) {
        self.closed.store(false, Ordering::Relaxed);
    }
}

#[async_trait]
impl Publisher for MemoryPublisher {
    async fn publish(&self, map: &StoreMap) -> Result<(), PublishError> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(PublishError::Closed);
        }
        let payload = map.to_json().map_err(PublishError::Encode)?;
        info!(items = map.len(), "Mirror replaced (in memory)");

        self.history.lock().await.push(payload);
        *self.mirror.lock().await = Some(map.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

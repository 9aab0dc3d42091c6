//! Durable key-value store backends.
//!
//! This module provides pluggable store backends:
//! - **InMemoryStore**: process-local store, used by tests and dry runs
//! - **RedisStore**: durable store backed by a Redis hash
//!
//! Both hand out an initial snapshot through [`TodoStore::wait_ready`], which
//! is the only readiness signal the reconciler consumes.

pub mod memory;
pub mod redis;

pub use self::memory::InMemoryStore;
pub use self::redis::RedisStore;

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::Result;

/// Every item held by a store at the moment it became ready.
pub type StoreSnapshot = HashMap<String, String>;

/// Trait for durable store backends.
#[async_trait]
pub trait TodoStore: Send + Sync {
    /// Read an item. A missing key is `Ok(None)`, never an error.
    async fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Write an item, replacing any previous value.
    async fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Resolve once the store has loaded its persisted contents.
    ///
    /// Callers await this once per process; the returned snapshot is the
    /// store's content at that moment.
    async fn wait_ready(&self) -> Result<StoreSnapshot>;

    /// Get the backend name.
    fn name(&self) -> &'static str;
}

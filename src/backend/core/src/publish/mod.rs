//! Downstream publishing of the todo map.
//!
//! A publisher fully replaces the external mirror with the map it is given.
//! Publishing is idempotent, so the reconciler can always send the complete
//! current map instead of a delta.

pub mod memory;
pub mod secret;

pub use self::memory::MemoryPublisher;
pub use self::secret::SecretApplyPublisher;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::TodoError;
use crate::model::StoreMap;

/// Failure to propagate the map downstream.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to encode todo map: {0}")]
    Encode(#[source] TodoError),

    #[error("apply of {kind} {namespace}/{name} failed: {source}")]
    Apply {
        kind: &'static str,
        namespace: String,
        name: String,
        #[source]
        source: TodoError,
    },

    #[error("publisher is closed")]
    Closed,
}

/// Trait for downstream targets.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Replace the external mirror with `map`.
    async fn publish(&self, map: &StoreMap) -> Result<(), PublishError>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

#![allow(clippy::result_large_err)]
//! # Todolist Core
//!
//! Reconciles a durable todo map with the ConfigMaps of one namespace and
//! mirrors the result into a Secret.
//!
//! ## Architecture
//!
//! - **Watch**: streams ConfigMap lifecycle events from the API server
//! - **Controller**: serializes readiness and lifecycle messages into the engine
//! - **Engine**: pre-store buffering, drain-on-first-use and read-modify-write
//! - **Store**: durable key-value backends (Redis, in-memory)
//! - **Publish**: downstream mirrors (Secret via server-side apply, in-memory)
//! - **Telemetry**: structured logging and Prometheus metrics

pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod kube;
pub mod model;
pub mod publish;
pub mod store;
pub mod telemetry;
pub mod watch;

pub use error::{ErrorCode, ErrorContext, ErrorSeverity, Result, TodoError};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::controller::{Controller, ControllerMessage};
    pub use crate::engine::{EngineConfig, LifecycleEvent, LifecyclePhase, ReconcileEngine};
    pub use crate::error::{ErrorCode, ErrorContext, ErrorSeverity, Result, TodoError};
    pub use crate::kube::{ConfigMap, KubeClient, Secret};
    pub use crate::model::{merge, StoreMap, TodoItem};
    pub use crate::publish::{MemoryPublisher, PublishError, Publisher, SecretApplyPublisher};
    pub use crate::store::{InMemoryStore, RedisStore, StoreSnapshot, TodoStore};
    pub use crate::watch::ConfigMapWatcher;
}

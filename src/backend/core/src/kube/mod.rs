//! Minimal Kubernetes API access over HTTPS.
//!
//! Only what the reconciler needs: watching ConfigMaps, server-side applying
//! a Secret and reading it back.

pub mod client;
pub mod resources;

pub use client::KubeClient;
pub use resources::{ConfigMap, ObjectMeta, Secret, WatchEvent, WatchEventType};

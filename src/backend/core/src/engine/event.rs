//! Lifecycle events delivered to the engine.

use std::fmt;

use crate::kube::ConfigMap;
use crate::model::TodoItem;

/// What happened to the watched object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    Created,
    Updated,
    Deleted,
}

impl LifecyclePhase {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A ConfigMap lifecycle event reduced to the todo it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleEvent {
    pub phase: LifecyclePhase,
    /// Name of the ConfigMap, for logs only.
    pub object: String,
    pub item: TodoItem,
}

impl LifecycleEvent {
    pub fn new(phase: LifecyclePhase, object: impl Into<String>, item: TodoItem) -> Self {
        Self {
            phase,
            object: object.into(),
            item,
        }
    }

    /// Extract the todo from a ConfigMap.
    ///
    /// Returns `None` when `data.task` is missing or empty; such objects are
    /// not todos and must not reach the engine. A missing `status` becomes
    /// an empty string.
    pub fn from_config_map(phase: LifecyclePhase, cm: &ConfigMap) -> Option<Self> {
        let task = cm.data_value("task").filter(|task| !task.is_empty())?;
        let status = cm.data_value("status").unwrap_or_default();
        Some(Self::new(
            phase,
            cm.metadata.name.clone(),
            TodoItem::new(task, status),
        ))
    }
}

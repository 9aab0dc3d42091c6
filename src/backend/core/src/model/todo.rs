//! `TodoItem` and `StoreMap`.

use std::collections::btree_map::{self, BTreeMap};

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Result;

/// A single todo entry. `task` doubles as its key in a [`StoreMap`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoItem {
    pub task: String,
    #[serde(default)]
    pub status: String,
}

impl TodoItem {
    pub fn new(task: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            status: status.into(),
        }
    }
}

/// Mapping from task to [`TodoItem`].
///
/// Invariant: every key equals its item's `task`. The only way in is
/// [`StoreMap::upsert`], and deserialization re-keys by `task` and drops
/// entries whose `task` is empty, so a payload written by another tool cannot
/// break lookups.
///
/// Serialized as a JSON object `{"<task>": {"task": ..., "status": ...}}`.
/// Keys are ordered, so identical maps always encode to identical bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StoreMap {
    items: BTreeMap<String, TodoItem>,
}

impl StoreMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the item stored under its own task.
    pub fn upsert(&mut self, item: TodoItem) -> Option<TodoItem> {
        self.items.insert(item.task.clone(), item)
    }

    /// Remove `task`. Removing an absent task is a no-op.
    pub fn remove(&mut self, task: &str) -> Option<TodoItem> {
        self.items.remove(task)
    }

    pub fn get(&self, task: &str) -> Option<&TodoItem> {
        self.items.get(task)
    }

    pub fn contains(&self, task: &str) -> bool {
        self.items.contains_key(task)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn iter(&self) -> btree_map::Values<'_, String, TodoItem> {
        self.items.values()
    }

    pub fn tasks(&self) -> impl Iterator<Item = &str> {
        self.items.keys().map(String::as_str)
    }

    /// Encode as the JSON payload shared by the store and the Secret.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a stored payload. `None` and a literal `null` both yield an
    /// empty map.
    pub fn from_json(raw: Option<&str>) -> Result<Self> {
        match raw {
            None => Ok(Self::default()),
            Some(raw) => {
                let map: Option<StoreMap> = serde_json::from_str(raw)?;
                Ok(map.unwrap_or_default())
            }
        }
    }
}

impl<'de> Deserialize<'de> for StoreMap {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Entries with an empty task could never come from a ConfigMap event.
        let raw = BTreeMap::<String, TodoItem>::deserialize(deserializer)?;
        Ok(raw
            .into_values()
            .filter(|item| !item.task.is_empty())
            .collect())
    }
}

impl FromIterator<TodoItem> for StoreMap {
    fn from_iter<I: IntoIterator<Item = TodoItem>>(iter: I) -> Self {
        let mut map = StoreMap::new();
        for item in iter {
            map.upsert(item);
        }
        map
    }
}

impl<'a> IntoIterator for &'a StoreMap {
    type Item = &'a TodoItem;
    type IntoIter = btree_map::Values<'a, String, TodoItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.values()
    }
}

//! Wire shapes of the Kubernetes objects the reconciler touches.

use std::collections::BTreeMap;

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{ErrorCode, Result, TodoError};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigMap {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub data: Option<BTreeMap<String, String>>,
}

impl ConfigMap {
    /// Look up a key of `data`.
    pub fn data_value(&self, key: &str) -> Option<&str> {
        self.data.as_ref()?.get(key).map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secret {
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Base64-encoded values, as returned by the API server.
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl Secret {
    /// Decode one `data` entry.
    pub fn decoded(&self, key: &str) -> Result<Option<String>> {
        let Some(encoded) = self.data.get(key) else {
            return Ok(None);
        };
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| {
                TodoError::with_internal(
                    ErrorCode::DeserializationError,
                    "Secret value is not valid base64",
                    e.to_string(),
                )
            })?;
        let text = String::from_utf8(bytes).map_err(|e| {
            TodoError::with_internal(
                ErrorCode::DeserializationError,
                "Secret value is not valid UTF-8",
                e.to_string(),
            )
        })?;
        Ok(Some(text))
    }
}

/// Event type of one line of a watch stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WatchEventType {
    Added,
    Modified,
    Deleted,
    Bookmark,
    Error,
}

/// One line of a watch stream. `object` stays raw because ERROR lines carry
/// a `Status` rather than the watched kind.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchEvent {
    #[serde(rename = "type")]
    pub event_type: WatchEventType,
    pub object: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_map_without_data() {
        let cm: ConfigMap =
            serde_json::from_str(r#"{"metadata":{"name":"a","namespace":"todolist"}}"#).unwrap();
        assert_eq!(cm.metadata.name, "a");
        assert!(cm.data_value("task").is_none());
    }

    #[test]
    fn test_secret_decodes_data() {
        let secret: Secret = serde_json::from_str(
            r#"{"metadata":{"name":"todos"},"data":{"list":"e30="}}"#,
        )
        .unwrap();
        assert_eq!(secret.decoded("list").unwrap().as_deref(), Some("{}"));
        assert_eq!(secret.decoded("missing").unwrap(), None);
    }

    #[test]
    fn test_secret_rejects_bad_base64() {
        let secret: Secret =
            serde_json::from_str(r#"{"metadata":{"name":"todos"},"data":{"list":"%%%"}}"#).unwrap();
        assert!(secret.decoded("list").is_err());
    }

    #[test]
    fn test_watch_event_line() {
        let event: WatchEvent = serde_json::from_str(
            r#"{"type":"MODIFIED","object":{"metadata":{"name":"a","resourceVersion":"42"}}}"#,
        )
        .unwrap();
        assert_eq!(event.event_type, WatchEventType::Modified);
        let cm: ConfigMap = serde_json::from_value(event.object).unwrap();
        assert_eq!(cm.metadata.resource_version.as_deref(), Some("42"));
    }
}

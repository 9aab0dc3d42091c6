//! Publisher that mirrors the map into a Kubernetes Secret.

use async_trait::async_trait;
use serde_json::json;

use super::{PublishError, Publisher};
use crate::config::KubernetesConfig;
use crate::kube::KubeClient;
use crate::model::StoreMap;

/// Server-side applies `stringData.<field>` of a fixed Secret.
///
/// The applied manifest always carries the whole serialized map, so each
/// apply fully replaces the previous payload and repeating it is harmless.
pub struct SecretApplyPublisher {
    client: KubeClient,
    namespace: String,
    name: String,
    field: String,
    field_manager: String,
}

impl SecretApplyPublisher {
    pub fn new(client: KubeClient, namespace: impl Into<String>, config: &KubernetesConfig) -> Self {
        Self {
            client,
            namespace: namespace.into(),
            name: config.secret_name.clone(),
            field: config.secret_field.clone(),
            field_manager: config.field_manager.clone(),
        }
    }

    fn path(&self) -> String {
        format!("/api/v1/namespaces/{}/secrets/{}", self.namespace, self.name)
    }

    fn manifest(&self, payload: String) -> serde_json::Value {
        let mut string_data = serde_json::Map::new();
        string_data.insert(self.field.clone(), payload.into());

        json!({
            "apiVersion": "v1",
            "kind": "Secret",
            "metadata": {
                "name": self.name,
                "namespace": self.namespace,
            },
            "stringData": string_data,
        })
    }
}

#[async_trait]
impl Publisher for SecretApplyPublisher {
    async fn publish(&self, map: &StoreMap) -> Result<(), PublishError> {
        let payload = map.to_json().map_err(PublishError::Encode)?;
        let manifest = self.manifest(payload);

        self.client
            .apply(&self.path(), &self.field_manager, &manifest)
            .await
            .map_err(|source| PublishError::Apply {
                kind: "Secret",
                namespace: self.namespace.clone(),
                name: self.name.clone(),
                source,
            })
    }

    fn name(&self) -> &'static str {
        "secret"
    }
}

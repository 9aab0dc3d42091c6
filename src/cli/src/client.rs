//! Read access to the two copies of the todo map: the durable store and the
//! Secret mirror.

use anyhow::{Context, Result};

use todolist_core::config::Config;
use todolist_core::kube::{KubeClient, Secret};
use todolist_core::model::StoreMap;
use todolist_core::store::{RedisStore, TodoStore};

/// Reads the todo map from the places the agent writes it.
pub struct TodoClient {
    config: Config,
}

impl TodoClient {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fetch the map persisted in Redis. A missing item is an empty map.
    pub async fn read_store(&self) -> Result<StoreMap> {
        let store = RedisStore::connect(self.config.redis.clone())
            .await
            .with_context(|| format!("Failed to connect to Redis at {}", self.config.redis.url))?;

        let raw = store
            .get_item(&self.config.reconciler.store_key)
            .await
            .context("Failed to read the todo map from the store")?;

        StoreMap::from_json(raw.as_deref()).context("Stored todo map is not valid JSON")
    }

    /// Fetch the map mirrored into the Secret. A missing field is an empty map.
    pub async fn read_mirror(&self) -> Result<StoreMap> {
        let kube = KubeClient::from_config(&self.config.kubernetes)
            .context("Failed to create Kubernetes client")?;

        let secret: Secret = kube
            .get_json(&self.secret_path())
            .await
            .with_context(|| format!("Failed to read Secret {}", self.secret_ref()))?;

        let payload = secret
            .decoded(&self.config.kubernetes.secret_field)
            .context("Secret payload could not be decoded")?;

        StoreMap::from_json(payload.as_deref()).context("Mirrored todo map is not valid JSON")
    }

    /// `namespace/name` of the mirror Secret.
    pub fn secret_ref(&self) -> String {
        format!(
            "{}/{}",
            self.config.reconciler.namespace, self.config.kubernetes.secret_name
        )
    }

    fn secret_path(&self) -> String {
        format!(
            "/api/v1/namespaces/{}/secrets/{}",
            self.config.reconciler.namespace, self.config.kubernetes.secret_name
        )
    }
}

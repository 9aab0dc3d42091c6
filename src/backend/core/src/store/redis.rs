//! Redis store backend.
//!
//! Items live in a single hash, `{key_prefix}items`, so the initial snapshot
//! is one `HGETALL`.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::{StoreSnapshot, TodoStore};
use crate::config::RedisConfig;
use crate::error::{ErrorCode, Result, TodoError};

/// Durable store backed by Redis.
pub struct RedisStore {
    client: redis::Client,
    config: RedisConfig,
    conn: OnceCell<ConnectionManager>,
}

impl RedisStore {
    /// Create the store. No connection is made until [`TodoStore::wait_ready`]
    /// or [`RedisStore::connect`].
    pub fn new(config: RedisConfig) -> Result<Self> {
        let client = redis::Client::open(config.url.as_str()).map_err(|e| {
            TodoError::with_internal(
                ErrorCode::InvalidConfiguration,
                "Failed to create Redis client",
                e.to_string(),
            )
        })?;

        Ok(Self {
            client,
            config,
            conn: OnceCell::new(),
        })
    }

    /// Create the store and connect once, without retrying.
    pub async fn connect(config: RedisConfig) -> Result<Self> {
        let store = Self::new(config)?;
        store.try_connect().await?;
        Ok(store)
    }

    /// The hash holding every item.
    fn items_key(&self) -> String {
        format!("{}items", self.config.key_prefix)
    }

    async fn try_connect(&self) -> Result<ConnectionManager> {
        let conn = self
            .conn
            .get_or_try_init(|| async {
                let mut conn = ConnectionManager::new(self.client.clone()).await?;
                let _: String = redis::cmd("PING").query_async(&mut conn).await?;
                info!(url = %self.config.url, "Redis store connected");
                Ok::<_, TodoError>(conn)
            })
            .await?;
        Ok(conn.clone())
    }

    /// Connect if needed and read every item.
    async fn load_snapshot(&self) -> Result<StoreSnapshot> {
        let mut conn = self.try_connect().await?;
        let snapshot: StoreSnapshot = conn.hgetall(self.items_key()).await?;
        Ok(snapshot)
    }

    fn conn(&self) -> Result<ConnectionManager> {
        self.conn.get().cloned().ok_or_else(TodoError::store_not_ready)
    }
}

#[async_trait]
impl TodoStore for RedisStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn()?;
        let value: Option<String> = conn.hget(self.items_key(), key).await?;
        Ok(value)
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.conn()?;
        conn.hset::<_, _, _, ()>(self.items_key(), key, value).await?;
        debug!(key = %key, bytes = value.len(), "Redis store item written");
        Ok(())
    }

    async fn wait_ready(&self) -> Result<StoreSnapshot> {
        loop {
            match self.load_snapshot().await {
                Ok(snapshot) => {
                    info!(items = snapshot.len(), "Redis store loaded");
                    return Ok(snapshot);
                }
                Err(e) => {
                    warn!(
                        url = %self.config.url,
                        retry_in = ?self.config.connect_retry_delay,
                        error = %e,
                        "Redis store not ready yet"
                    );
                    tokio::time::sleep(self.config.connect_retry_delay).await;
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

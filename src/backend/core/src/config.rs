//! Configuration management.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::telemetry::LoggingConfig;

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Reconciler configuration
    #[serde(default)]
    pub reconciler: ReconcilerConfig,

    /// Redis (durable store) configuration
    #[serde(default)]
    pub redis: RedisConfig,

    /// Kubernetes API configuration
    #[serde(default)]
    pub kubernetes: KubernetesConfig,

    /// ConfigMap watch configuration
    #[serde(default)]
    pub watch: WatchConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReconcilerConfig {
    /// Namespace whose ConfigMaps are watched and where the Secret is applied
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Item key the serialized todo map is stored under
    #[serde(default = "default_store_key")]
    pub store_key: String,

    /// Migrate the pre-store buffer as soon as the store is ready instead of
    /// on the next event
    #[serde(default)]
    pub drain_on_ready: bool,

    /// Capacity of the controller message channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            store_key: default_store_key(),
            drain_on_ready: false,
            channel_capacity: default_channel_capacity(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Prefix for every key written by the store
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Delay between connection attempts while waiting for readiness
    #[serde(default = "default_connect_retry_delay", with = "humantime_serde")]
    pub connect_retry_delay: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            key_prefix: default_key_prefix(),
            connect_retry_delay: default_connect_retry_delay(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct KubernetesConfig {
    /// API server URL. When absent the in-cluster service environment is used.
    #[serde(default)]
    pub api_url: Option<String>,

    /// Service account token file
    #[serde(default = "default_token_path")]
    pub token_path: PathBuf,

    /// Cluster CA bundle
    #[serde(default = "default_ca_path")]
    pub ca_path: PathBuf,

    /// Field manager used for server-side apply
    #[serde(default = "default_field_manager")]
    pub field_manager: String,

    /// Name of the Secret mirroring the todo map
    #[serde(default = "default_secret_name")]
    pub secret_name: String,

    /// Key inside `stringData` that carries the serialized map
    #[serde(default = "default_secret_field")]
    pub secret_field: String,

    /// Per-request timeout (the watch stream is exempt)
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for KubernetesConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            token_path: default_token_path(),
            ca_path: default_ca_path(),
            field_manager: default_field_manager(),
            secret_name: default_secret_name(),
            secret_field: default_secret_field(),
            request_timeout: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatchConfig {
    /// Delay before re-establishing a closed or failed watch stream
    #[serde(default = "default_reconnect_delay", with = "humantime_serde")]
    pub reconnect_delay: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: default_reconnect_delay(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ObservabilityConfig {
    /// Log output configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Listen address for the Prometheus exporter (disabled when absent)
    #[serde(default)]
    pub metrics_addr: Option<String>,
}

// Default value functions
fn default_namespace() -> String { "todolist".to_string() }
fn default_store_key() -> String { "todolist".to_string() }
fn default_channel_capacity() -> usize { 256 }
fn default_redis_url() -> String { "redis://localhost:6379".to_string() }
fn default_key_prefix() -> String { "todolist:".to_string() }
fn default_connect_retry_delay() -> Duration { Duration::from_secs(2) }
fn default_token_path() -> PathBuf { PathBuf::from("/var/run/secrets/kubernetes.io/serviceaccount/token") }
fn default_ca_path() -> PathBuf { PathBuf::from("/var/run/secrets/kubernetes.io/serviceaccount/ca.crt") }
fn default_field_manager() -> String { "todolist-agent".to_string() }
fn default_secret_name() -> String { "todos".to_string() }
fn default_secret_field() -> String { "list".to_string() }
fn default_request_timeout() -> Duration { Duration::from_secs(30) }
fn default_reconnect_delay() -> Duration { Duration::from_secs(5) }

impl Config {
    /// Load configuration from the environment (`TODOLIST__SECTION__KEY`).
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("TODOLIST").separator("__"))
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        Ok(cfg)
    }

    /// Load from a specific file path, with environment overrides on top.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("TODOLIST").separator("__"))
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        Ok(cfg)
    }
}

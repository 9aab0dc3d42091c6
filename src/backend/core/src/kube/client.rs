//! HTTP client for the Kubernetes API server.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::config::KubernetesConfig;
use crate::error::{ErrorCode, ErrorContext, Result, TodoError};

const APPLY_PATCH_CONTENT_TYPE: &str = "application/apply-patch+yaml";

/// Authenticated client for one API server.
#[derive(Clone)]
pub struct KubeClient {
    http: Client,
    base_url: String,
    request_timeout: Duration,
}

impl KubeClient {
    /// Create a client for `base_url` with an optional bearer token.
    pub fn new(base_url: &str, token: Option<&str>) -> Result<Self> {
        Self::build(base_url, token, None, Duration::from_secs(30))
    }

    /// Create a client from configuration.
    ///
    /// Without an explicit `api_url` the in-cluster service environment
    /// (`KUBERNETES_SERVICE_HOST` / `KUBERNETES_SERVICE_PORT`) is used. The
    /// token and CA files are optional when an `api_url` is given.
    pub fn from_config(config: &KubernetesConfig) -> Result<Self> {
        let base_url = match &config.api_url {
            Some(url) => url.clone(),
            None => {
                let host = std::env::var("KUBERNETES_SERVICE_HOST").map_err(|_| {
                    TodoError::with_internal(
                        ErrorCode::MissingConfiguration,
                        "Kubernetes API URL not configured",
                        "set kubernetes.api_url or run inside a cluster",
                    )
                })?;
                let port = std::env::var("KUBERNETES_SERVICE_PORT")
                    .unwrap_or_else(|_| "443".to_string());
                if host.contains(':') {
                    format!("https://[{}]:{}", host, port)
                } else {
                    format!("https://{}:{}", host, port)
                }
            }
        };

        let in_cluster = config.api_url.is_none();
        let token = read_optional(&config.token_path, in_cluster)?;
        let ca = match read_optional(&config.ca_path, in_cluster)? {
            Some(pem) => Some(
                reqwest::Certificate::from_pem(pem.as_bytes())
                    .with_error_code(ErrorCode::InvalidConfiguration)?,
            ),
            None => None,
        };

        let client = Self::build(
            &base_url,
            token.as_deref().map(str::trim),
            ca,
            config.request_timeout,
        )?;
        info!(api_url = %client.base_url, in_cluster, "Kubernetes client configured");
        Ok(client)
    }

    fn build(
        base_url: &str,
        token: Option<&str>,
        ca: Option<reqwest::Certificate>,
        request_timeout: Duration,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| TodoError::configuration("service account token is not a valid header value"))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let mut builder = Client::builder().default_headers(headers);
        if let Some(ca) = ca {
            builder = builder.add_root_certificate(ca);
        }
        let http = builder
            .build()
            .with_error_code(ErrorCode::InvalidConfiguration)?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout,
        })
    }

    /// Return the configured base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET a resource and deserialize it.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .http
            .get(&url)
            .timeout(self.request_timeout)
            .send()
            .await?;
        let resp = check_status(resp).await?;
        Ok(resp.json().await?)
    }

    /// Server-side apply `body` at `path`, taking ownership of conflicting
    /// fields.
    pub async fn apply(
        &self,
        path: &str,
        field_manager: &str,
        body: &serde_json::Value,
    ) -> Result<()> {
        let url = format!("{}{}", self.base_url, path);
        let payload = serde_json::to_vec(body)?;
        let resp = self
            .http
            .patch(&url)
            .query(&[("fieldManager", field_manager), ("force", "true")])
            .header(CONTENT_TYPE, APPLY_PATCH_CONTENT_TYPE)
            .timeout(self.request_timeout)
            .body(payload)
            .send()
            .await?;
        check_status(resp).await?;
        debug!(path = %path, field_manager = %field_manager, "Applied resource");
        Ok(())
    }

    /// Open a watch stream. The response body is newline-delimited JSON and
    /// is not subject to the request timeout.
    pub async fn watch(&self, path: &str, resource_version: Option<&str>) -> Result<Response> {
        let url = format!("{}{}", self.base_url, path);
        let mut query = vec![("watch", "true"), ("allowWatchBookmarks", "true")];
        if let Some(rv) = resource_version {
            query.push(("resourceVersion", rv));
        }
        let resp = self.http.get(&url).query(&query).send().await?;
        check_status(resp).await.map_err(|e| {
            if e.code() == ErrorCode::ResourceExpired {
                return e;
            }
            TodoError::with_internal(ErrorCode::WatchFailed, "Failed to open watch", e.to_string())
                .with_source(e)
        })
    }
}

async fn check_status(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(TodoError::kube_status(status.as_u16(), body))
}

fn read_optional(path: &std::path::Path, required: bool) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => Ok(None),
        Err(e) => Err(TodoError::from(e)
            .with_internal_message(format!("failed to read {}", path.display()))),
    }
}

//! ConfigMap watch loop.
//!
//! Streams ConfigMap changes from the API server, reduces each one to a
//! [`LifecycleEvent`] and forwards it to the controller. The stream is
//! resumed from the last seen `resourceVersion`; when the server reports the
//! version as expired (410 Gone) the watch restarts from the current state.

use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::controller::ControllerMessage;
use crate::engine::{LifecycleEvent, LifecyclePhase};
use crate::error::{ErrorCode, Result, TodoError};
use crate::kube::{ConfigMap, KubeClient, WatchEvent, WatchEventType};
use crate::telemetry::metrics;

/// What a single watch line asks the loop to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    /// Forward this event to the controller.
    Dispatch(LifecycleEvent),
    /// Nothing to forward (bookmark, non-todo ConfigMap, blank line).
    Skip,
    /// The server ended this watch; open a new one.
    Restart,
}

/// How a single watch response ended.
enum StreamEnd {
    /// The server closed the body normally.
    Closed,
    /// The server sent an ERROR event or rejected the resource version.
    Restart,
}

/// Resume position of a watch.
#[derive(Debug, Default, Clone)]
pub struct WatchCursor {
    resource_version: Option<String>,
}

impl WatchCursor {
    pub fn resource_version(&self) -> Option<&str> {
        self.resource_version.as_deref()
    }

    /// Interpret one newline-delimited JSON line of the watch body.
    pub fn apply_line(&mut self, line: &str) -> Result<LineOutcome> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(LineOutcome::Skip);
        }
        let event: WatchEvent = serde_json::from_str(line)?;

        let phase = match event.event_type {
            WatchEventType::Added => LifecyclePhase::Created,
            WatchEventType::Modified => LifecyclePhase::Updated,
            WatchEventType::Deleted => LifecyclePhase::Deleted,
            WatchEventType::Bookmark => {
                self.advance(&event.object);
                return Ok(LineOutcome::Skip);
            }
            WatchEventType::Error => {
                let code = event.object.get("code").and_then(|c| c.as_u64());
                let reason = event
                    .object
                    .get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or_default();
                if code == Some(410) {
                    info!(reason, "Watch resource version expired, relisting");
                    self.resource_version = None;
                } else {
                    warn!(code, reason, "Watch stream reported an error");
                }
                return Ok(LineOutcome::Restart);
            }
        };

        self.advance(&event.object);
        let cm: ConfigMap = serde_json::from_value(event.object)?;
        match LifecycleEvent::from_config_map(phase, &cm) {
            Some(event) => Ok(LineOutcome::Dispatch(event)),
            None => {
                debug!(object = %cm.metadata.name, %phase, "ConfigMap has no task, skipping");
                metrics::record_event_skipped();
                Ok(LineOutcome::Skip)
            }
        }
    }

    fn advance(&mut self, object: &serde_json::Value) {
        if let Some(rv) = object
            .pointer("/metadata/resourceVersion")
            .and_then(|v| v.as_str())
        {
            self.resource_version = Some(rv.to_string());
        }
    }
}

/// Watches ConfigMaps in one namespace.
pub struct ConfigMapWatcher {
    client: KubeClient,
    namespace: String,
    reconnect_delay: Duration,
    cursor: WatchCursor,
}

impl ConfigMapWatcher {
    pub fn new(client: KubeClient, namespace: impl Into<String>, reconnect_delay: Duration) -> Self {
        Self {
            client,
            namespace: namespace.into(),
            reconnect_delay,
            cursor: WatchCursor::default(),
        }
    }

    fn path(&self) -> String {
        format!("/api/v1/namespaces/{}/configmaps", self.namespace)
    }

    /// Run until cancelled or until the controller hangs up.
    pub async fn run(mut self, tx: mpsc::Sender<ControllerMessage>, shutdown: CancellationToken) {
        info!(namespace = %self.namespace, "Starting ConfigMap watch");

        loop {
            let result = tokio::select! {
                _ = shutdown.cancelled() => break,
                result = self.stream_once(&tx) => result,
            };

            let back_off = match result {
                Ok(StreamEnd::Closed) => {
                    debug!("Watch stream ended, reconnecting");
                    false
                }
                Ok(StreamEnd::Restart) => true,
                Err(e) if e.code() == ErrorCode::ChannelClosed => {
                    info!("Controller stopped, ending watch");
                    break;
                }
                Err(e) => {
                    e.log();
                    true
                }
            };

            if back_off {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(self.reconnect_delay) => {}
                }
            }
        }

        info!("ConfigMap watch stopped");
    }

    /// Consume one watch response to its end.
    async fn stream_once(&mut self, tx: &mpsc::Sender<ControllerMessage>) -> Result<StreamEnd> {
        let path = self.path();
        let resp = match self.client.watch(&path, self.cursor.resource_version()).await {
            Ok(resp) => resp,
            Err(e) if e.code() == ErrorCode::ResourceExpired => {
                info!(
                    resource_version = ?self.cursor.resource_version(),
                    "Watch resource version expired, relisting"
                );
                self.cursor.resource_version = None;
                return Ok(StreamEnd::Restart);
            }
            Err(e) => return Err(e),
        };
        debug!(resource_version = ?self.cursor.resource_version(), "Watch opened");

        let mut body = resp.bytes_stream();
        let mut pending: Vec<u8> = Vec::new();

        while let Some(chunk) = body.next().await {
            pending.extend_from_slice(&chunk?);

            while let Some(pos) = pending.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = pending.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&line);
                if self.dispatch_line(&line, tx).await? {
                    return Ok(StreamEnd::Restart);
                }
            }
        }

        if !pending.is_empty() {
            let line = String::from_utf8_lossy(&pending).into_owned();
            if self.dispatch_line(&line, tx).await? {
                return Ok(StreamEnd::Restart);
            }
        }
        Ok(StreamEnd::Closed)
    }

    /// Returns `true` when the watch must be restarted.
    async fn dispatch_line(
        &mut self,
        line: &str,
        tx: &mpsc::Sender<ControllerMessage>,
    ) -> Result<bool> {
        let outcome = match self.cursor.apply_line(line) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "Ignoring undecodable watch line");
                return Ok(false);
            }
        };

        match outcome {
            LineOutcome::Dispatch(event) => {
                tx.send(ControllerMessage::Event(event)).await.map_err(|_| {
                    TodoError::new(ErrorCode::ChannelClosed, "Controller channel closed")
                })?;
                Ok(false)
            }
            LineOutcome::Skip => Ok(false),
            LineOutcome::Restart => Ok(true),
        }
    }
}

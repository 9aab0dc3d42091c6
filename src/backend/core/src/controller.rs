//! Serialized event dispatch.
//!
//! The controller owns the [`ReconcileEngine`] and feeds it one message at a
//! time from a single channel. Readiness and lifecycle events share that
//! channel, so handlers never interleave and a store write always completes
//! before the next event is looked at.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::engine::{LifecycleEvent, ReconcileEngine};
use crate::store::{StoreSnapshot, TodoStore};

/// Input to the controller loop.
#[derive(Debug)]
pub enum ControllerMessage {
    /// The durable store finished loading.
    StoreReady(StoreSnapshot),
    /// A ConfigMap lifecycle event.
    Event(LifecycleEvent),
}

/// Create the controller channel.
pub fn channel(
    capacity: usize,
) -> (mpsc::Sender<ControllerMessage>, mpsc::Receiver<ControllerMessage>) {
    mpsc::channel(capacity.max(1))
}

pub struct Controller {
    engine: ReconcileEngine,
    rx: mpsc::Receiver<ControllerMessage>,
    shutdown: CancellationToken,
}

impl Controller {
    pub fn new(
        engine: ReconcileEngine,
        rx: mpsc::Receiver<ControllerMessage>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            engine,
            rx,
            shutdown,
        }
    }

    /// Process messages until shutdown or until every sender is gone.
    ///
    /// Returns the engine so callers can inspect its final state.
    pub async fn run(mut self) -> ReconcileEngine {
        info!("Controller started");

        loop {
            let message = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                message = self.rx.recv() => match message {
                    Some(message) => message,
                    None => break,
                },
            };
            self.dispatch(message).await;
        }

        if !self.engine.buffer().is_empty() {
            warn!(
                buffered = self.engine.buffer().len(),
                ready = self.engine.is_ready(),
                "Controller stopping with unmigrated buffered items"
            );
        }
        info!("Controller stopped");
        self.engine
    }

    async fn dispatch(&mut self, message: ControllerMessage) {
        match message {
            ControllerMessage::StoreReady(snapshot) => {
                if let Err(e) = self.engine.on_store_ready(snapshot).await {
                    e.log();
                }
            }
            ControllerMessage::Event(event) => {
                let object = event.object.clone();
                let task = event.item.task.clone();
                if let Err(e) = self.engine.handle(event).await {
                    warn!(object = %object, task = %task, "Dropping event after store failure");
                    e.log();
                }
            }
        }
    }
}

/// Wait for the store to become ready and announce it to the controller.
///
/// A failed `wait_ready` is retried every `retry_delay` until it succeeds or
/// `shutdown` fires; readiness is delivered exactly once.
pub async fn forward_readiness(
    store: Arc<dyn TodoStore>,
    tx: mpsc::Sender<ControllerMessage>,
    retry_delay: Duration,
    shutdown: CancellationToken,
) {
    let snapshot = loop {
        let result = tokio::select! {
            _ = shutdown.cancelled() => return,
            result = store.wait_ready() => result,
        };

        match result {
            Ok(snapshot) => break snapshot,
            Err(e) => {
                e.log();
                warn!(store = store.name(), retry_in = ?retry_delay, "Store readiness failed, retrying");
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    _ = tokio::time::sleep(retry_delay) => {}
                }
            }
        }
    };

    if tx.send(ControllerMessage::StoreReady(snapshot)).await.is_err() {
        warn!("Controller stopped before store readiness was delivered");
    }
}

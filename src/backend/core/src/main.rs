//! Todolist Agent - Main entry point
//!
//! Watches ConfigMaps, keeps the todo map in Redis and mirrors it into a Secret.

use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use todolist_core::{
    config::Config,
    controller::{self, Controller},
    engine::{EngineConfig, ReconcileEngine},
    kube::KubeClient,
    publish::{MemoryPublisher, Publisher, SecretApplyPublisher},
    store::{RedisStore, TodoStore},
    telemetry,
    watch::ConfigMapWatcher,
};

#[derive(Parser, Debug)]
#[command(name = "todolist-agent", version, about = "Todolist reconciler agent")]
struct Args {
    /// Configuration file (environment variables override it)
    #[arg(short, long, env = "TODOLIST_CONFIG")]
    config: Option<String>,

    /// Keep the published map in memory instead of applying the Secret
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let config = match args.config.as_deref() {
        Some(path) => Config::from_file(path)?,
        None => Config::load().unwrap_or_else(|e| {
            eprintln!("Warning: Could not load config: {}. Using defaults.", e);
            Config::default()
        }),
    };

    telemetry::init_logging(&config.observability.logging)?;
    if let Some(addr) = config.observability.metrics_addr.as_deref() {
        telemetry::init_metrics(addr)?;
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        namespace = %config.reconciler.namespace,
        dry_run = args.dry_run,
        "Starting Todolist Agent"
    );

    let store: Arc<dyn TodoStore> = Arc::new(RedisStore::new(config.redis.clone())?);
    tracing::info!(url = %config.redis.url, "Redis store created");

    let kube = KubeClient::from_config(&config.kubernetes)?;
    tracing::info!(api = %kube.base_url(), "Kubernetes client created");

    let publisher: Arc<dyn Publisher> = if args.dry_run {
        Arc::new(MemoryPublisher::new())
    } else {
        Arc::new(SecretApplyPublisher::new(
            kube.clone(),
            config.reconciler.namespace.clone(),
            &config.kubernetes,
        ))
    };

    let engine = ReconcileEngine::new(
        store.clone(),
        publisher,
        EngineConfig {
            store_key: config.reconciler.store_key.clone(),
            drain_on_ready: config.reconciler.drain_on_ready,
        },
    );

    let shutdown = CancellationToken::new();
    let (tx, rx) = controller::channel(config.reconciler.channel_capacity);

    let readiness = tokio::spawn(controller::forward_readiness(
        store,
        tx.clone(),
        config.redis.connect_retry_delay,
        shutdown.clone(),
    ));
    let watcher = ConfigMapWatcher::new(
        kube,
        config.reconciler.namespace.clone(),
        config.watch.reconnect_delay,
    );
    let watch = tokio::spawn(watcher.run(tx, shutdown.clone()));
    let controller = tokio::spawn(Controller::new(engine, rx, shutdown.clone()).run());

    shutdown_signal().await;
    shutdown.cancel();

    let _ = readiness.await;
    let _ = watch.await;
    let _ = controller.await;

    tracing::info!("Agent shutdown complete");
    Ok(())
}

/// Wait for shutdown signal.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

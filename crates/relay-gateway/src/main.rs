use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use relay_core::config::RelayConfig;
use relay_core::TokenIssuer;
use relay_engine::{DispatchEngine, HttpCallback, JobWorker};
use relay_lock::{EtcdLockFactory, LockFactory, NoneLockFactory};
use relay_store::{JobStore, PgStore, ThresholdStore};
use tracing::{info, warn};

mod app;
mod auth;
mod http;

#[derive(Parser)]
#[command(name = "relay-gateway", about = "Webhook job scheduler gateway")]
struct Args {
    /// Path to relay.toml (defaults to ./relay.toml, RELAY_* env overrides).
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "relay_gateway=info,relay_engine=info,relay_store=info,tower_http=debug".into()
            }),
        )
        .init();

    let args = Args::parse();
    let config_path = args.config.or_else(|| std::env::var("RELAY_CONFIG").ok());
    let config = RelayConfig::load(config_path.as_deref())?;

    let bind = config.gateway.bind.clone();
    let port = config.gateway.port;

    let store = PgStore::connect(&config.database.url, config.database.max_connections).await?;
    store.init().await?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    // Lock backend: etcd for multi-instance deployments; an empty endpoint
    // list opts into process-local locks.
    let locks: Arc<dyn LockFactory> = if config.coordination.endpoints.is_empty() {
        warn!("no coordination endpoints configured, locks are process-local");
        Arc::new(NoneLockFactory::new())
    } else {
        Arc::new(
            EtcdLockFactory::connect(
                &config.coordination.endpoints,
                config.coordination.lease_ttl_secs,
                shutdown_rx.clone(),
            )
            .await?,
        )
    };

    let tokens = TokenIssuer::new(&config.auth.secret, config.auth.token_ttl_ms)?;
    let callback = Arc::new(HttpCallback::new(tokens.clone())?);

    let jobs: Arc<dyn JobStore> = Arc::new(store.clone());
    let thresholds: Arc<dyn ThresholdStore> = Arc::new(store);

    // Spawn the dispatch engine loop in the background.
    let worker = Arc::new(JobWorker::new(
        jobs.clone(),
        thresholds.clone(),
        locks.clone(),
        callback,
        config.coordination.lock_base_path.clone(),
        config.scheduler.dlq_retry_limit,
    ));
    let engine = DispatchEngine::new(
        jobs.clone(),
        locks,
        worker,
        config.scheduler.clone(),
        config.coordination.lock_base_path.clone(),
    );
    tokio::spawn(engine.run(shutdown_rx));

    let state = Arc::new(app::AppState::new(config, jobs, thresholds, tokens));
    let router = app::build_router(state);

    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    info!("relay gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    // Signal the engine and lock session to stop.
    let _ = shutdown_tx.send(true);
    Ok(())
}

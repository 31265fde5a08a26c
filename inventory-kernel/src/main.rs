/**
 * INVENTORY KERNEL - Point d'entrée du poller d'inventaire châssis
 *
 * RÔLE : Bootstrap complet : config, store SQLite, client vendor, boucles de
 * polling par catégorie, API HTTP.
 *
 * ARCHITECTURE : PollScheduler → FanOutCollector → FetchWorker×N → writers → Store,
 * et l'API REST lit le Store directement.
 */

use anyhow::Context;
use inventory_kernel::client::ixos::IxosConnector;
use inventory_kernel::client::ChassisConnector;
use inventory_kernel::collector::FanOutCollector;
use inventory_kernel::config::load_config;
use inventory_kernel::fetch::FetchWorker;
use inventory_kernel::health::HealthTracker;
use inventory_kernel::http::{self, AppState};
use inventory_kernel::poller::Poller;
use inventory_kernel::reconcile::ReconciliationWriter;
use inventory_kernel::scheduler::PollScheduler;
use inventory_kernel::store::Store;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env optionnel
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("inventory_kernel=info")))
        .init();

    let config = load_config().await.context("loading configuration")?;

    let store = Store::open(config.store())
        .with_context(|| format!("opening database {}", config.database_path.display()))?;
    info!(path = %config.database_path.display(), "store ready");

    let connector: Arc<dyn ChassisConnector> =
        Arc::new(IxosConnector::new(config.ixos_options()).context("building chassis HTTP client")?);
    let worker = FetchWorker::new(connector.clone(), config.retry_policy());

    let health_tracker = HealthTracker::new();
    let poller = Poller::new(
        store.clone(),
        FanOutCollector::new(worker),
        ReconciliationWriter::new(config.grace_period()),
        health_tracker.clone(),
    );

    // une boucle par catégorie, pour toute la durée du process
    let scheduler = PollScheduler::new(poller.clone(), config.error_retry());
    let loops = scheduler.spawn_all(&config.categories);
    info!(loops = loops.len(), "poll loops started");

    let app = http::build_router(AppState { store, poller, health_tracker, connector });

    let addr = config.listen_addr();
    let listener = TcpListener::bind(addr.as_str()).await.with_context(|| format!("binding {addr}"))?;
    info!("listening on http://{addr}");
    axum::serve(listener, app).await.context("HTTP server stopped")?;
    Ok(())
}

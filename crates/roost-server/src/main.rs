use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use roost_adapters::DefaultAdapterFactory;
use roost_core::crawl::CrawlService;
use roost_core::dedup::ListingStore;
use roost_core::registry::SourceRegistry;
use roost_core::scheduler::{
    CrawlScheduler, CrawlWorker, SchedulerConfig, TracingWorkerReporter,
};
use roost_db::{Database, DatabaseConfig};
use roost_server::routes;
use roost_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("roost=info".parse()?))
        .with_target(false)
        .init();

    let api_key = std::env::var("ROOST_SERVER_API_KEY").expect("ROOST_SERVER_API_KEY must be set");
    let port = std::env::var("ROOST_SERVER_PORT").unwrap_or_else(|_| "3000".to_string());
    let worker_count: usize = std::env::var("ROOST_WORKERS")
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(4);
    let addr = format!("0.0.0.0:{port}");

    let db = Database::connect(&DatabaseConfig::from_env()?).await?;
    db.migrate().await?;

    let factory = DefaultAdapterFactory::new()?;
    let runner = CrawlService::new(
        factory,
        ListingStore::new(db.listing_repo()),
        db.health_repo(),
        db.source_repo(),
    );
    let registry = SourceRegistry::new(db.source_repo(), db.health_repo());

    let (scheduler, job_queue) = CrawlScheduler::new(SchedulerConfig::default());
    let cancel = CancellationToken::new();
    let mut workers = Vec::with_capacity(worker_count);
    for i in 0..worker_count {
        let worker = CrawlWorker::new(scheduler.clone(), job_queue.clone(), runner.clone())
            .with_worker_id(format!("worker-{i}"));
        let token = cancel.clone();
        workers.push(tokio::spawn(async move {
            worker.run(token, &TracingWorkerReporter).await;
        }));
    }
    tracing::info!(%worker_count, "Crawl worker pool started");

    let state = Arc::new(AppState {
        db,
        scheduler,
        registry,
        runner,
        api_key,
    });

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    tracing::info!("Starting server on {addr}");
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Let in-flight crawls finish, then stop the pool.
    cancel.cancel();
    for worker in workers {
        let _ = worker.await;
    }

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C handler");
    tracing::info!("Shutdown signal received");
}

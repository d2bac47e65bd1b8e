use std::sync::Arc;

use axum::Router;
use sqlx::postgres::PgPoolOptions;
use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};

use roost_adapters::DefaultAdapterFactory;
use roost_core::crawl::CrawlService;
use roost_core::dedup::ListingStore;
use roost_core::registry::SourceRegistry;
use roost_core::scheduler::{CrawlScheduler, SchedulerConfig};
use roost_db::Database;
use roost_server::routes;
use roost_server::state::AppState;

pub const TEST_API_KEY: &str = "test-secret-key";

/// A fully wired test app over a disposable PostgreSQL container.
///
/// No workers run, so scheduled jobs stay queued — which is exactly what
/// the scheduling tests want to observe. The container must be kept in
/// scope for the test duration.
pub struct TestApp {
    pub router: Router,
    _container: ContainerAsync<GenericImage>,
}

pub async fn setup_test_app() -> TestApp {
    let container = GenericImage::new("postgres", "16")
        .with_exposed_port(ContainerPort::Tcp(5432))
        .with_wait_for(WaitFor::message_on_stderr(
            "database system is ready to accept connections",
        ))
        .with_env_var("POSTGRES_PASSWORD", "postgres")
        .with_env_var("POSTGRES_DB", "roost_test")
        .start()
        .await
        .expect("Failed to start PostgreSQL container");

    let host = container.get_host().await.expect("Failed to get host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("Failed to get port");

    let url = format!("postgresql://postgres:postgres@{host}:{port}/roost_test");

    const MAX_RETRIES: u32 = 30;
    let mut retries = 0;
    let pool = loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await
        {
            Ok(pool) => break pool,
            Err(e) => {
                retries += 1;
                if retries >= MAX_RETRIES {
                    panic!("Failed to connect to database after {MAX_RETRIES} retries: {e}");
                }
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            }
        }
    };

    let db = Database::from_pool(pool);
    db.migrate().await.expect("Failed to run migrations");

    let factory = DefaultAdapterFactory::new().expect("http client");
    let runner = CrawlService::new(
        factory,
        ListingStore::new(db.listing_repo()),
        db.health_repo(),
        db.source_repo(),
    );
    let registry = SourceRegistry::new(db.source_repo(), db.health_repo());
    let (scheduler, _job_queue) = CrawlScheduler::new(SchedulerConfig::default());

    let state = Arc::new(AppState {
        db,
        scheduler,
        registry,
        runner,
        api_key: TEST_API_KEY.to_string(),
    });

    TestApp {
        router: routes::router(state),
        _container: container,
    }
}

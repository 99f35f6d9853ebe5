//! # quilld — quill metrics daemon
//!
//! Composition root that wires all adapters together and starts the server.
//!
//! ## Responsibilities
//! - Parse configuration (config file, env vars) and initialize logging
//! - Initialize the `SQLite` connection pool and run migrations
//! - Construct the counter store (in-memory or Redis) and the message bus
//! - Start the metrics sync consumer **before** the listener accepts traffic
//! - Build the axum router around the metrics service, bind and serve
//! - Handle graceful shutdown: stop HTTP, close the bus, drain the consumer
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use std::error::Error;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use quill_adapter_http_axum::router;
use quill_adapter_http_axum::state::AppState;
use quill_adapter_storage_sqlite_sqlx::{Config as StorageConfig, SqlitePostRepository};
use quill_app::counter_store::InMemoryCounterStore;
use quill_app::message_bus::InProcessMessageBus;
use quill_app::metrics_consumer::MetricsSyncConsumer;
use quill_app::ports::CounterStore;
use quill_app::services::metrics_service::MetricsService;

use crate::config::{Config, CounterBackend};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.logging.filter)?)
        .init();

    // Database
    let db = StorageConfig::new(config.database_url()).build().await?;
    let repo = Arc::new(SqlitePostRepository::new(db.pool().clone()));

    // Counter store
    match config.counters.backend {
        CounterBackend::Memory => {
            tracing::info!("using in-memory counter store");
            serve(&config, repo, InMemoryCounterStore::new()).await?;
        }
        CounterBackend::Redis => {
            let counters = quill_adapter_redis::Config {
                url: config.counters.redis_url.clone(),
            }
            .build()
            .await?;
            serve(&config, repo, counters).await?;
        }
    }

    db.close().await;
    tracing::info!("quilld stopped");
    Ok(())
}

/// Run the metrics pipeline and the HTTP server until shutdown.
async fn serve<C>(
    config: &Config,
    repo: Arc<SqlitePostRepository>,
    counters: C,
) -> Result<(), Box<dyn Error>>
where
    C: CounterStore + Send + Sync + 'static,
{
    // One bus for both roles
    let bus = InProcessMessageBus::new();
    let topology = config.sync.topology;

    // Consumer first, so no event published by a request is lost
    let consumer = Arc::new(
        MetricsSyncConsumer::new(repo, topology).with_deadline(config.store_deadline()),
    );
    let consumer_handle = consumer.start(&bus.subscriber()).await?;

    // HTTP
    let service = MetricsService::new(counters, bus.publisher(), topology);
    let app = router::build(AppState::new(service));

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, ?topology, "quilld listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Loops drain what was already routed, then end
    bus.close();
    for summary in consumer_handle.join().await {
        tracing::info!(
            topic = %summary.topic,
            delivered = summary.delivered,
            dropped = summary.dropped,
            "metrics consumer drained"
        );
    }
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutdown requested"),
        Err(err) => {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    }
}

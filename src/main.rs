use std::sync::Arc;

use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod domain;
mod metrics;
mod settings;
mod store;
mod utils;

use domain::order::OrderCommandHandler;
use store::{MemoryCatalog, MemoryOrderStore, OrderStore, PgOrderStore};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let settings = settings::Settings::load()?;

    // RUST_LOG wins over the configured filter
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.log.filter)),
        )
        .init();

    tracing::info!("🌸 Starting flower shop order service");

    // === 1. Prometheus metrics ===
    let metrics = Arc::new(metrics::Metrics::new()?);
    tracing::info!("📊 Metrics registry created with {} metrics", metrics.registry().gather().len());

    // === 2. Storage ===
    let orders: Arc<dyn OrderStore> = match &settings.database.url {
        Some(url) => Arc::new(PgOrderStore::new(store::connect(&settings.database, url).await?)),
        None => {
            tracing::warn!("No database URL configured, orders are kept in memory only");
            let catalog = MemoryCatalog::new();
            catalog.seed_sample().await;
            Arc::new(MemoryOrderStore::new(catalog))
        }
    };

    // === 3. Order API ===
    let handler = web::Data::new(OrderCommandHandler::new(orders, metrics.clone()));

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(handler.clone())
            .configure(api::configure)
    })
    .bind((settings.server.host.as_str(), settings.server.port))?
    .run();

    tracing::info!(
        "🚀 Order API listening on http://{}:{}/orders",
        settings.server.host,
        settings.server.port
    );

    // === 4. Metrics server alongside the API ===
    if settings.metrics.enabled {
        let registry = Arc::new(metrics.registry().clone());
        let metrics_server =
            metrics::start_metrics_server(registry, settings.server.host.clone(), settings.metrics.port);
        futures_util::future::try_join(server, metrics_server).await?;
    } else {
        server.await?;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

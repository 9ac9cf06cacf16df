use std::sync::Arc;

use actix_web::error::ErrorInternalServerError;
use actix_web::{web, App, HttpResponse, HttpServer};
use prometheus::{Encoder, Registry, TextEncoder};

/// Serve `/metrics` and `/health` on their own port, apart from the order API.
pub async fn start_metrics_server(registry: Arc<Registry>, host: String, port: u16) -> std::io::Result<()> {
    tracing::info!("📊 Metrics available on http://{}:{}/metrics", host, port);

    let registry = web::Data::from(registry);
    HttpServer::new(move || {
        App::new()
            .app_data(registry.clone())
            .route("/metrics", web::get().to(scrape))
            .route("/health", web::get().to(health))
    })
    .workers(1)
    .bind((host.as_str(), port))?
    .run()
    .await
}

async fn scrape(registry: web::Data<Registry>) -> actix_web::Result<HttpResponse> {
    let encoder = TextEncoder::new();
    let mut body = Vec::new();
    encoder.encode(&registry.gather(), &mut body).map_err(|e| {
        tracing::error!(error = %e, "Failed to encode metrics");
        ErrorInternalServerError(e)
    })?;

    Ok(HttpResponse::Ok().content_type(encoder.format_type()).body(body))
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

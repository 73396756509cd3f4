pub mod api;
pub mod dtos;
pub mod error;
pub mod extractors;
pub mod services;
pub mod utils;

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use axum::{
    Extension, Json, Router,
    http::{Method, StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use once_cell::sync::Lazy;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::config::AppConfig;
use api::{
    health_controller::health_endpoint, proxy_controller::ProxyController,
    resolve_controller::ResolveController,
};
use error::ErrorBody;
use services::AppServices;
use utils::manifest_rewriter::PROXY_PATH;

static START_TIME: Lazy<Instant> = Lazy::new(Instant::now);

pub fn get_uptime_seconds() -> u64 {
    START_TIME.elapsed().as_secs()
}

pub fn get_app_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

// players read ranges and lengths off proxied responses, so those have to be exposed
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([
            header::RANGE,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::ACCEPT_ENCODING,
        ])
        .expose_headers([
            header::CONTENT_LENGTH,
            header::CONTENT_RANGE,
            header::ACCEPT_RANGES,
            header::CACHE_CONTROL,
        ])
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            status: "error",
            message: "Not found".to_string(),
        }),
    )
}

/// the whole http surface over a set of services, tests drive this directly
pub fn build_router(services: AppServices) -> Router {
    Lazy::force(&START_TIME);

    Router::new()
        .route("/health", get(health_endpoint))
        .nest(PROXY_PATH, ProxyController::app())
        .merge(ResolveController::app())
        .fallback(not_found)
        .layer(Extension(services))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
}

pub struct ApplicationServer;

impl ApplicationServer {
    pub async fn serve(config: Arc<AppConfig>) -> anyhow::Result<()> {
        let services = AppServices::new(config.clone());
        let router = build_router(services);

        let address = format!("0.0.0.0:{}", config.port);
        let listener = tokio::net::TcpListener::bind(&address)
            .await
            .with_context(|| format!("failed to bind {}", address))?;

        info!("routes initialized, listening on {}", address);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("error while serving")?;

        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to install ctrl-c handler: {}", e);
        // without a handler there's nothing to wait for, keep serving until killed
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received, draining connections");
}

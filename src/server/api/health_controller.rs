use axum::Extension;
use axum::Json;
use axum::http::StatusCode;
use chrono::Utc;
use tracing::error;

use crate::logger::Logger;
use crate::server::dtos::health_dto::{
    CatalogHealth, HealthResponse, HealthStatus, ServiceHealthDetails,
};
use crate::server::services::AppServices;
use crate::server::{get_app_version, get_uptime_seconds};

/// health endpoint, the catalog folder is the only thing that can be missing at runtime
pub async fn health_endpoint(
    Extension(services): Extension<AppServices>,
) -> (StatusCode, Json<HealthResponse>) {
    let catalog_health = check_catalog_health(&services).await;

    let overall_status = catalog_health.status;

    let response = HealthResponse {
        status: overall_status,
        timestamp: Utc::now(),
        uptime_seconds: get_uptime_seconds(),
        version: get_app_version().to_string(),
        environment: Logger::environment_name(services.config.cargo_env).to_string(),
        services: ServiceHealthDetails {
            catalog: catalog_health,
        },
    };

    let http_status = match overall_status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (http_status, Json(response))
}

async fn check_catalog_health(services: &AppServices) -> CatalogHealth {
    match services.catalog.document_count().await {
        // an empty folder still answers, every /api4 lookup just misses
        Ok(0) => CatalogHealth {
            status: HealthStatus::Degraded,
            documents: 0,
        },
        Ok(documents) => CatalogHealth {
            status: HealthStatus::Healthy,
            documents,
        },
        Err(e) => {
            error!("catalog health check failed: {:#}", e);
            CatalogHealth {
                status: HealthStatus::Unhealthy,
                documents: 0,
            }
        }
    }
}

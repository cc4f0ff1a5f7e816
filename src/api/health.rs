use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};

use crate::store::{EntityStore, StoreCounts};

#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: i64,
    pub database: String,
    #[schema(value_type = Option<Object>)]
    pub entities: Option<serde_json::Value>,
    pub last_updated: Option<chrono::DateTime<chrono::Utc>>,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Persistent store unreachable", body = HealthResponse)
    )
)]
pub async fn health_check(store: web::Data<EntityStore>) -> impl Responder {
    let counts: StoreCounts = store.counts().await;
    let (status, database) = match store.health_check().await {
        Ok(()) => ("healthy", "ok".to_string()),
        Err(e) => {
            log::warn!("⚠️  Health check: {}", e);
            ("degraded", e.to_string())
        }
    };

    let body = HealthResponse {
        status: status.to_string(),
        service: "companion-sync".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().timestamp(),
        database,
        entities: serde_json::to_value(counts).ok(),
        last_updated: store.last_updated().await,
    };

    if status == "healthy" {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}

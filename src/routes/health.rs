//! Health check endpoints

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::db::VinRepository;
use crate::state::AppState;

const SERVICE_NAME: &str = "vinscan-server";

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub service: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub database: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_vins: Option<i64>,
    pub ocr_provider: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        service: SERVICE_NAME,
    })
}

/// Readiness: checks the database is answering
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let total_vins = match VinRepository::new(state.db()).count().await {
        Ok(count) => Some(count),
        Err(e) => {
            tracing::warn!("Status check could not reach the database: {}", e);
            None
        }
    };

    Json(StatusResponse {
        status: if total_vins.is_some() { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.uptime().as_secs(),
        database: if total_vins.is_some() { "connected" } else { "unavailable" },
        total_vins,
        ocr_provider: state.ocr().provider_type().to_string(),
    })
}

pub async fn ping() -> &'static str {
    "pong"
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/status", get(status))
        .route("/ping", get(ping))
}

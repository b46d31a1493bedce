//! VIN API routes
//!
//! Endpoints:
//! - GET /api/vins - List all records, newest first
//! - POST /api/vins - Create a record
//! - DELETE /api/vins/:id - Delete a record
//! - GET /api/vins/search - Filter by code substring and recorded date
//! - GET /api/vins/stats - Counts for today, this week, this month
//! - POST /api/vins/import - Bulk import from a spreadsheet
//! - GET /api/vins/export - Download all records as xlsx

use std::net::SocketAddr;

use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::{JsonRejection, PathRejection, QueryRejection},
        ConnectInfo, DefaultBodyLimit, Multipart, Path, Query, State,
    },
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{NewVin, VinRecord, VinRepository, VinSearch, VinStats};
use crate::error::{AppError, Result};
use crate::spreadsheet::{
    self, dates::parse_free_form, export_rows, import_rows, read_sheet, ImportSummary,
};
use crate::state::AppState;

// ============================================================================
// Request / Response types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVinRequest {
    pub code: Option<String>,
    /// When the VIN was captured; defaults to now
    pub date: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub q: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

#[derive(Serialize)]
struct VinListResponse {
    success: bool,
    data: Vec<VinRecord>,
    count: usize,
}

impl VinListResponse {
    fn new(data: Vec<VinRecord>) -> Self {
        Self {
            success: true,
            count: data.len(),
            data,
        }
    }
}

#[derive(Serialize)]
struct VinResponse {
    success: bool,
    message: String,
    data: VinRecord,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteResponse {
    success: bool,
    message: String,
    deleted_vin: String,
    data: VinRecord,
}

#[derive(Serialize)]
struct StatsResponse {
    success: bool,
    data: VinStats,
}

#[derive(Serialize)]
struct ImportResponse {
    success: bool,
    message: String,
    #[serde(flatten)]
    summary: ImportSummary,
}

// ============================================================================
// Router
// ============================================================================

/// Create the VIN router
pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/", get(list_vins).post(create_vin))
        .route("/search", get(search_vins))
        .route("/stats", get(vin_stats))
        .route("/import", post(import_vins))
        .route("/export", get(export_vins))
        .route("/:id", delete(delete_vin))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

// ============================================================================
// Handlers
// ============================================================================

async fn list_vins(State(state): State<AppState>) -> Result<Json<VinListResponse>> {
    let records = VinRepository::new(state.db()).list().await?;
    Ok(Json(VinListResponse::new(records)))
}

async fn create_vin(
    State(state): State<AppState>,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    payload: std::result::Result<Json<CreateVinRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<VinResponse>)> {
    let Json(request) = payload.map_err(|e| AppError::Validation(e.body_text()))?;

    let code = request
        .code
        .filter(|code| !code.trim().is_empty())
        .ok_or_else(|| AppError::Validation("VIN code is required".to_string()))?;

    let recorded_at = match request.date.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(date) => Some(
            parse_free_form(date)
                .ok_or_else(|| AppError::Validation(format!("Invalid date '{}'", date)))?,
        ),
    };

    let user_agent = request.user_agent.filter(|ua| !ua.trim().is_empty()).or_else(|| {
        headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    });

    let new = NewVin {
        code,
        recorded_at,
        user_agent,
        source_address: client_address(&headers, connect_info.map(|ConnectInfo(addr)| addr)),
    };

    let record = VinRepository::new(state.db()).create(&new).await?;

    tracing::info!(id = record.id, code = %record.code, "VIN created");

    Ok((
        StatusCode::CREATED,
        Json(VinResponse {
            success: true,
            message: "VIN saved".to_string(),
            data: record,
        }),
    ))
}

async fn delete_vin(
    State(state): State<AppState>,
    id: std::result::Result<Path<i64>, PathRejection>,
) -> Result<Json<DeleteResponse>> {
    let Path(id) = id.map_err(|_| AppError::Validation("Invalid VIN id".to_string()))?;

    let record = VinRepository::new(state.db()).delete(id).await?;

    tracing::info!(id = record.id, code = %record.code, "VIN deleted");

    Ok(Json(DeleteResponse {
        success: true,
        message: format!("VIN {} deleted", record.code),
        deleted_vin: record.code.clone(),
        data: record,
    }))
}

async fn search_vins(
    State(state): State<AppState>,
    query: std::result::Result<Query<SearchQuery>, QueryRejection>,
) -> Result<Json<VinListResponse>> {
    let Query(query) = query.map_err(|e| AppError::Validation(e.body_text()))?;

    let filters = VinSearch {
        query: query.q,
        date_from: parse_day("dateFrom", query.date_from.as_deref())?,
        date_to: parse_day("dateTo", query.date_to.as_deref())?,
    };

    let records = VinRepository::new(state.db()).search(&filters).await?;
    Ok(Json(VinListResponse::new(records)))
}

async fn vin_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    let stats = VinRepository::new(state.db()).stats().await?;
    Ok(Json(StatsResponse {
        success: true,
        data: stats,
    }))
}

/// POST /api/vins/import
///
/// Expects the spreadsheet in a multipart field named `file`.
async fn import_vins(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<ImportResponse>> {
    let mut multipart = multipart.map_err(|e| AppError::Validation(e.body_text()))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read upload: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or("upload").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read file data: {}", e)))?;

        tracing::debug!(file_name = %file_name, bytes = data.len(), "Importing spreadsheet");

        let rows = read_sheet(&data)?;
        let summary = import_rows(&VinRepository::new(state.db()), &rows).await;

        return Ok(Json(ImportResponse {
            success: true,
            message: format!(
                "Import finished: {} imported, {} duplicates, {} errors",
                summary.imported, summary.duplicates, summary.errors
            ),
            summary,
        }));
    }

    Err(AppError::Validation(
        "No file provided. Use field name 'file'".to_string(),
    ))
}

async fn export_vins(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let records = VinRepository::new(state.db()).list().await?;
    let now = Utc::now();
    let bytes = export_rows(&records, now)?;

    let file_name = format!("vins_export_{}.xlsx", now.format("%Y-%m-%d"));
    tracing::info!(records = records.len(), file_name = %file_name, "VIN export generated");

    Ok((
        [
            (header::CONTENT_TYPE, spreadsheet::EXPORT_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        bytes,
    ))
}

// ============================================================================
// Helpers
// ============================================================================

fn parse_day(name: &str, value: Option<&str>) -> Result<Option<NaiveDate>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(day) => NaiveDate::parse_from_str(day, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| AppError::Validation(format!("{} must be YYYY-MM-DD, got '{}'", name, day))),
    }
}

/// Best guess at the client's address: proxy headers first, then the socket.
fn client_address(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    forwarded
        .or(real_ip)
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_client_address_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9, 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        let peer: SocketAddr = "127.0.0.1:5000".parse().unwrap();

        assert_eq!(
            client_address(&headers, Some(peer)).as_deref(),
            Some("203.0.113.9")
        );
    }

    #[test]
    fn test_client_address_falls_back_to_peer() {
        let peer: SocketAddr = "127.0.0.1:5000".parse().unwrap();
        assert_eq!(
            client_address(&HeaderMap::new(), Some(peer)).as_deref(),
            Some("127.0.0.1")
        );
        assert_eq!(client_address(&HeaderMap::new(), None), None);
    }

    #[test]
    fn test_parse_day() {
        assert_eq!(parse_day("dateFrom", None).unwrap(), None);
        assert_eq!(parse_day("dateFrom", Some("")).unwrap(), None);
        assert_eq!(
            parse_day("dateFrom", Some("2024-01-15")).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 15)
        );
        assert!(matches!(
            parse_day("dateTo", Some("15/01/2024")),
            Err(AppError::Validation(msg)) if msg.contains("dateTo")
        ));
    }
}

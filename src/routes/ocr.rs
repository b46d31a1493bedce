//! OCR relay route

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct OcrProcessRequest {
    /// Data URL or bare base64
    pub image: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrProcessResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Create the OCR router
pub fn router(max_body_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/process", post(process_image))
        .layer(DefaultBodyLimit::max(max_body_bytes))
}

/// POST /api/ocr/process
///
/// A picture without a VIN is not an error: the response has
/// `success: false` and whatever text was read.
async fn process_image(
    State(state): State<AppState>,
    payload: std::result::Result<Json<OcrProcessRequest>, JsonRejection>,
) -> Result<Json<OcrProcessResponse>> {
    let Json(request) = payload.map_err(|e| AppError::Validation(e.body_text()))?;

    let image = request
        .image
        .filter(|image| !image.trim().is_empty())
        .ok_or_else(|| AppError::Validation("No image provided".to_string()))?;

    let extraction = state.ocr().extract_vin(&image).await?;

    let response = if extraction.found {
        OcrProcessResponse {
            success: true,
            vin: extraction.vin,
            all_text: extraction.raw_text,
            message: Some("VIN detected".to_string()),
        }
    } else {
        OcrProcessResponse {
            success: false,
            vin: None,
            all_text: extraction.raw_text,
            message: Some("No VIN found in image".to_string()),
        }
    };

    Ok(Json(response))
}

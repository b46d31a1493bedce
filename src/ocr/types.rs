//! OCR Types

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// OCR provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrProvider {
    /// Google Cloud Vision text detection
    #[default]
    Google,
    /// Ollama vision model (local LLM)
    Ollama,
}

impl fmt::Display for OcrProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Google => f.write_str("google"),
            Self::Ollama => f.write_str("ollama"),
        }
    }
}

impl FromStr for OcrProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" | "vision" | "google-vision" => Ok(Self::Google),
            "ollama" => Ok(Self::Ollama),
            other => Err(format!("unknown OCR provider: {}", other)),
        }
    }
}

/// Outcome of scanning an image for a VIN
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VinExtraction {
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vin: Option<String>,
    /// Full text returned by the provider, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
}

impl VinExtraction {
    /// Scan provider text for a VIN, ignoring case.
    ///
    /// `raw_text` is kept exactly as returned.
    pub fn from_text(raw_text: Option<String>) -> Self {
        let vin = raw_text.as_deref().and_then(|text| {
            crate::vin::find_vin(&text.to_uppercase()).map(str::to_string)
        });

        Self {
            found: vin.is_some(),
            vin,
            raw_text,
        }
    }
}

/// OCR error types
#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("OCR provider not available: {0}")]
    ProviderNotAvailable(String),

    #[error("Invalid image payload: {0}")]
    InvalidImage(String),

    #[error("API error: {0}")]
    Api(String),
}

impl OcrError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Self::InvalidImage(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

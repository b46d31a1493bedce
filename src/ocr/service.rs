//! OCR Service
//!
//! Decodes client image payloads, hands them to the configured provider and
//! scans the recognized text for a VIN.

use std::sync::Arc;

use base64::Engine;

use super::{
    provider::{GoogleVisionProvider, OcrProviderTrait, OllamaProvider},
    types::{OcrError, OcrProvider, VinExtraction},
};
use crate::config::OcrConfig;

/// OCR service for VIN extraction
#[derive(Clone)]
pub struct OcrService {
    provider: Arc<dyn OcrProviderTrait>,
}

impl OcrService {
    /// Create the service for the provider selected in `config`
    pub fn new(config: &OcrConfig) -> Self {
        let provider: Arc<dyn OcrProviderTrait> = match config.provider {
            OcrProvider::Google => Arc::new(GoogleVisionProvider::new(
                &config.google_endpoint,
                config.google_api_key.clone(),
            )),
            OcrProvider::Ollama => Arc::new(OllamaProvider::new(
                &config.ollama_url,
                &config.ollama_model,
            )),
        };

        Self { provider }
    }

    /// Create the service around an existing provider
    pub fn with_provider(provider: Arc<dyn OcrProviderTrait>) -> Self {
        Self { provider }
    }

    pub fn provider_type(&self) -> OcrProvider {
        self.provider.provider_type()
    }

    pub async fn is_available(&self) -> bool {
        self.provider.is_available().await
    }

    /// Run OCR over a base64 or data-URL image and look for a VIN.
    ///
    /// Called once per request; provider failures are returned as-is.
    pub async fn extract_vin(&self, payload: &str) -> Result<VinExtraction, OcrError> {
        let image = decode_image(payload)?;

        tracing::debug!(
            provider = %self.provider.provider_type(),
            bytes = image.len(),
            "Sending image to OCR provider"
        );

        let text = self.provider.recognize(&image).await?;
        let extraction = VinExtraction::from_text(text);

        tracing::info!(
            provider = %self.provider.provider_type(),
            found = extraction.found,
            "OCR completed"
        );

        Ok(extraction)
    }
}

/// Decode a `data:<mime>;base64,<data>` URL or a bare base64 string.
pub fn decode_image(payload: &str) -> Result<Vec<u8>, OcrError> {
    let data = match payload.trim().strip_prefix("data:") {
        Some(rest) => rest
            .split_once(',')
            .map(|(_, data)| data)
            .ok_or_else(|| OcrError::InvalidImage("data URL has no payload".to_string()))?,
        None => payload.trim(),
    };

    let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if compact.is_empty() {
        return Err(OcrError::InvalidImage("image is empty".to_string()));
    }

    base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| OcrError::InvalidImage(format!("not valid base64: {}", e)))
}

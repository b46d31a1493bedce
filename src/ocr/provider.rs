//! OCR Providers
//!
//! Defines the provider trait and implementations for different OCR backends.

use async_trait::async_trait;
use base64::Engine;

use super::types::{OcrError, OcrProvider};

/// OCR provider trait
#[async_trait]
pub trait OcrProviderTrait: Send + Sync {
    /// Get the provider type
    fn provider_type(&self) -> OcrProvider;

    /// Check if the provider is available
    async fn is_available(&self) -> bool;

    /// Recognize the text in an image.
    ///
    /// Returns `Ok(None)` when the provider found no text at all.
    async fn recognize(&self, image_data: &[u8]) -> Result<Option<String>, OcrError>;
}

/// Google Cloud Vision provider (`TEXT_DETECTION`)
pub struct GoogleVisionProvider {
    client: reqwest::Client,
    /// API base URL, without the `/v1/...` path
    endpoint: String,
    api_key: Option<String>,
}

impl GoogleVisionProvider {
    pub fn new(endpoint: &str, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn annotate_url(&self, api_key: &str) -> String {
        format!("{}/v1/images:annotate?key={}", self.endpoint, api_key)
    }
}

#[async_trait]
impl OcrProviderTrait for GoogleVisionProvider {
    fn provider_type(&self) -> OcrProvider {
        OcrProvider::Google
    }

    async fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn recognize(&self, image_data: &[u8]) -> Result<Option<String>, OcrError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            OcrError::ProviderNotAvailable("GOOGLE_VISION_API_KEY is not set".to_string())
        })?;

        let image_base64 = base64::engine::general_purpose::STANDARD.encode(image_data);

        let request = serde_json::json!({
            "requests": [{
                "image": { "content": image_base64 },
                "features": [{ "type": "TEXT_DETECTION" }]
            }]
        });

        let response = self
            .client
            .post(self.annotate_url(api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| OcrError::Api(format!("Failed to call Vision API: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(OcrError::Api(format!(
                "Vision API returned {}: {}",
                status, body
            )));
        }

        let result: serde_json::Value = response
            .json()
            .await
            .map_err(|e| OcrError::Api(format!("Failed to parse response: {}", e)))?;

        parse_annotate_response(&result)
    }
}

/// Pull the full-text annotation out of an `images:annotate` response.
fn parse_annotate_response(result: &serde_json::Value) -> Result<Option<String>, OcrError> {
    let first = &result["responses"][0];

    if let Some(message) = first["error"]["message"].as_str() {
        return Err(OcrError::Api(message.to_string()));
    }

    let text = first["textAnnotations"][0]["description"]
        .as_str()
        .or_else(|| first["fullTextAnnotation"]["text"].as_str())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    Ok(text)
}

/// Ollama vision model provider
pub struct OllamaProvider {
    client: reqwest::Client,
    /// Ollama API URL
    base_url: String,
    /// Model name (e.g., "llava", "bakllava")
    model: String,
}

impl OllamaProvider {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl OcrProviderTrait for OllamaProvider {
    fn provider_type(&self) -> OcrProvider {
        OcrProvider::Ollama
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);

        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    async fn recognize(&self, image_data: &[u8]) -> Result<Option<String>, OcrError> {
        let url = format!("{}/api/generate", self.base_url);
        let image_base64 = base64::engine::general_purpose::STANDARD.encode(image_data);

        let request = serde_json::json!({
            "model": self.model,
            "prompt": "Extract all text from this image exactly as written. \
                       Vehicle identification numbers are 17 characters long. \
                       Return only the extracted text, nothing else.",
            "images": [image_base64],
            "stream": false
        });

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| OcrError::Api(format!("Failed to call Ollama: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(OcrError::Api(format!(
                "Ollama returned {}: {}",
                status, body
            )));
        }

        let result: serde_json::Value = response
            .json()
            .await
            .map_err(|e| OcrError::Api(format!("Failed to parse response: {}", e)))?;

        Ok(parse_generate_response(&result))
    }
}

/// Pull the model's answer out of a non-streaming `/api/generate` response.
fn parse_generate_response(result: &serde_json::Value) -> Option<String> {
    result["response"]
        .as_str()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Mock provider for testing
#[cfg(test)]
pub struct MockProvider {
    pub text: Option<String>,
    pub fail_with: Option<String>,
}

#[cfg(test)]
impl MockProvider {
    pub fn with_text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            fail_with: None,
        }
    }

    pub fn empty() -> Self {
        Self {
            text: None,
            fail_with: None,
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            text: None,
            fail_with: Some(message.to_string()),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl OcrProviderTrait for MockProvider {
    fn provider_type(&self) -> OcrProvider {
        OcrProvider::Google
    }

    async fn is_available(&self) -> bool {
        self.fail_with.is_none()
    }

    async fn recognize(&self, _image_data: &[u8]) -> Result<Option<String>, OcrError> {
        match &self.fail_with {
            Some(message) => Err(OcrError::Api(message.clone())),
            None => Ok(self.text.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_text_annotations() {
        let body = serde_json::json!({
            "responses": [{
                "textAnnotations": [
                    { "description": "VIN\n1HGCM82633A123456\n" },
                    { "description": "VIN" }
                ]
            }]
        });

        let text = parse_annotate_response(&body).unwrap();
        assert_eq!(text.as_deref(), Some("VIN\n1HGCM82633A123456"));
    }

    #[test]
    fn test_parse_empty_response() {
        let body = serde_json::json!({ "responses": [{}] });
        assert_eq!(parse_annotate_response(&body).unwrap(), None);
    }

    #[test]
    fn test_parse_error_response() {
        let body = serde_json::json!({
            "responses": [{ "error": { "code": 3, "message": "Bad image data." } }]
        });

        let err = parse_annotate_response(&body).unwrap_err();
        assert!(matches!(err, OcrError::Api(msg) if msg == "Bad image data."));
    }

    #[test]
    fn test_parse_generate_response() {
        let body = serde_json::json!({
            "model": "llava",
            "response": "  VIN 1HGCM82633A123456\n",
            "done": true
        });
        assert_eq!(
            parse_generate_response(&body).as_deref(),
            Some("VIN 1HGCM82633A123456")
        );
    }

    #[test]
    fn test_parse_generate_blank_response() {
        for response in ["", "  \n\t "] {
            let body = serde_json::json!({ "response": response, "done": true });
            assert_eq!(parse_generate_response(&body), None);
        }
    }

    #[test]
    fn test_parse_generate_missing_response() {
        assert_eq!(parse_generate_response(&serde_json::json!({ "done": true })), None);
        assert_eq!(parse_generate_response(&serde_json::json!({ "response": 42 })), None);
    }

    #[tokio::test]
    async fn test_google_without_key_is_unavailable() {
        let provider = GoogleVisionProvider::new("https://vision.googleapis.com/", None);
        assert!(!provider.is_available().await);

        let err = provider.recognize(b"png").await.unwrap_err();
        assert!(matches!(err, OcrError::ProviderNotAvailable(_)));
    }

    #[test]
    fn test_annotate_url() {
        let provider =
            GoogleVisionProvider::new("https://vision.googleapis.com/", Some("k".into()));
        assert_eq!(
            provider.annotate_url("k"),
            "https://vision.googleapis.com/v1/images:annotate?key=k"
        );
    }
}

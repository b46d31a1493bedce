//! Configuration management for VinScan Server

use serde::Deserialize;
use std::env;

use crate::ocr::OcrProvider;

const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub ocr: OcrConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Body limit for spreadsheet uploads and OCR images
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OcrConfig {
    pub provider: OcrProvider,
    pub google_api_key: Option<String>,
    pub google_endpoint: String,
    pub ollama_url: String,
    pub ollama_model: String,
}

/// Error raised when an environment variable is present but malformed
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
                max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            },
            database: DatabaseConfig {
                url: "sqlite:./vins.db".to_string(),
            },
            ocr: OcrConfig {
                provider: OcrProvider::Google,
                google_api_key: None,
                google_endpoint: "https://vision.googleapis.com".to_string(),
                ollama_url: "http://localhost:11434".to_string(),
                ollama_model: "llava".to_string(),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or(defaults.server.host),
                port: parse_var("SERVER_PORT", defaults.server.port)?,
                max_upload_bytes: parse_var("MAX_UPLOAD_BYTES", defaults.server.max_upload_bytes)?,
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or(defaults.database.url),
            },
            ocr: OcrConfig {
                provider: match env::var("OCR_PROVIDER") {
                    Ok(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
                        name: "OCR_PROVIDER",
                        value,
                    })?,
                    Err(_) => defaults.ocr.provider,
                },
                google_api_key: env::var("GOOGLE_VISION_API_KEY")
                    .ok()
                    .filter(|key| !key.is_empty()),
                google_endpoint: env::var("GOOGLE_VISION_ENDPOINT")
                    .unwrap_or(defaults.ocr.google_endpoint),
                ollama_url: env::var("OLLAMA_URL").unwrap_or(defaults.ocr.ollama_url),
                ollama_model: env::var("OLLAMA_MODEL").unwrap_or(defaults.ocr.ollama_model),
            },
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.ocr.provider, OcrProvider::Google);
        assert!(config.ocr.google_api_key.is_none());
    }

    #[test]
    fn test_parse_var_falls_back_when_unset() {
        let port: u16 = parse_var("VINSCAN_TEST_UNSET_PORT", 4000).unwrap();
        assert_eq!(port, 4000);
    }

    #[test]
    fn test_parse_var_rejects_garbage() {
        env::set_var("VINSCAN_TEST_BAD_PORT", "not-a-port");
        let result: Result<u16, _> = parse_var("VINSCAN_TEST_BAD_PORT", 3000);
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { name: "VINSCAN_TEST_BAD_PORT", .. })
        ));
    }
}

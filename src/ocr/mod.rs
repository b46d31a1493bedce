//! OCR Module
//!
//! Relays VIN photographs to an external text-recognition service and picks
//! the first VIN out of the returned text.
//!
//! Supports two backends:
//! - Google Cloud Vision (`TEXT_DETECTION`)
//! - Ollama vision models (local LLM)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use vinscan_server::ocr::OcrService;
//!
//! let service = OcrService::new(&config.ocr);
//! let result = service.extract_vin("data:image/jpeg;base64,...").await?;
//! if result.found {
//!     println!("{}", result.vin.unwrap());
//! }
//! ```

mod provider;
mod service;
mod types;

pub use provider::{GoogleVisionProvider, OcrProviderTrait, OllamaProvider};
pub use service::{decode_image, OcrService};
pub use types::{OcrError, OcrProvider, VinExtraction};

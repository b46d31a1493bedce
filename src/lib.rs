//! VinScan Server Library
//!
//! Captures vehicle identification numbers from photos and keeps them in a
//! small searchable store with spreadsheet import and export.
//!
//! # Modules
//!
//! - `vin`: VIN validation and extraction from free text
//! - `db`: SQLite store for VIN records
//! - `ocr`: External OCR providers and the VIN extraction service
//! - `spreadsheet`: xlsx import/export with a fixed column layout
//! - `routes`: HTTP API

pub mod config;
pub mod db;
pub mod error;
pub mod ocr;
pub mod routes;
pub mod spreadsheet;
pub mod state;
pub mod vin;

pub use config::Config;
pub use error::{AppError, Result};
pub use state::AppState;

//! Application state management

use std::sync::Arc;
use std::time::{Duration, Instant};

use sqlx::SqlitePool;

use crate::config::Config;
use crate::ocr::OcrService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    db: SqlitePool,
    ocr: OcrService,
    started_at: Instant,
}

impl AppState {
    /// Create a new application state
    pub fn new(config: Config, db: SqlitePool, ocr: OcrService) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                db,
                ocr,
                started_at: Instant::now(),
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the database pool
    pub fn db(&self) -> &SqlitePool {
        &self.inner.db
    }

    /// Get the OCR service
    pub fn ocr(&self) -> &OcrService {
        &self.inner.ocr
    }

    /// Time since the state was built
    pub fn uptime(&self) -> Duration {
        self.inner.started_at.elapsed()
    }

    /// Close the database pool
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down application state...");
        self.inner.db.close().await;
    }
}

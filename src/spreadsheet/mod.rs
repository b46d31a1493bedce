//! Spreadsheet exchange
//!
//! Bulk import of VIN records from xlsx/xls/ods files and export of the
//! table to xlsx. Both sides share one fixed column layout:
//!
//! | A  | B    | C             | D       | E          | F              |
//! |----|------|---------------|---------|------------|----------------|
//! | ID | Code | Date Recorded | Elapsed | User Agent | Source Address |

pub mod dates;
mod export;
mod import;

pub use export::{elapsed_label, export_rows, EXPORT_CONTENT_TYPE, NOT_SPECIFIED};
pub use import::{
    import_rows, parse_row, read_sheet, ImportSummary, DEFAULT_IMPORT_SOURCE,
    DEFAULT_IMPORT_USER_AGENT, MAX_ERROR_MESSAGES,
};

use axum::http::StatusCode;

/// Column positions (0-based)
pub const ID_COLUMN: usize = 0;
pub const CODE_COLUMN: usize = 1;
pub const DATE_COLUMN: usize = 2;
pub const ELAPSED_COLUMN: usize = 3;
pub const USER_AGENT_COLUMN: usize = 4;
pub const SOURCE_COLUMN: usize = 5;

/// File-level spreadsheet failures
#[derive(Debug, thiserror::Error)]
pub enum SpreadsheetError {
    #[error("Unreadable spreadsheet: {0}")]
    Unreadable(String),

    #[error("Spreadsheet has no worksheet")]
    MissingSheet,

    #[error("Failed to write spreadsheet: {0}")]
    Write(#[from] rust_xlsxwriter::XlsxError),
}

impl SpreadsheetError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unreadable(_) | Self::MissingSheet => StatusCode::BAD_REQUEST,
            Self::Write(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

//! Spreadsheet import

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use futures::future::join_all;
use serde::Serialize;

use super::dates::parse_date_cell;
use super::{SpreadsheetError, CODE_COLUMN, DATE_COLUMN, SOURCE_COLUMN, USER_AGENT_COLUMN};
use crate::db::{NewVin, VinRepository};
use crate::error::AppError;
use crate::vin::{is_valid_vin, normalize_vin};

/// Row error messages returned to the caller
pub const MAX_ERROR_MESSAGES: usize = 10;

pub const DEFAULT_IMPORT_USER_AGENT: &str = "Import Excel";
pub const DEFAULT_IMPORT_SOURCE: &str = "Import";

/// Result of a bulk import
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub imported: usize,
    pub duplicates: usize,
    /// Total failed rows, which may exceed `error_messages.len()`
    pub errors: usize,
    pub error_messages: Vec<String>,
}

/// Read the first worksheet as rows anchored at cell A1.
pub fn read_sheet(bytes: &[u8]) -> Result<Vec<Vec<Data>>, SpreadsheetError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| SpreadsheetError::Unreadable(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or(SpreadsheetError::MissingSheet)?
        .map_err(|e| SpreadsheetError::Unreadable(e.to_string()))?;

    let Some((end_row, end_col)) = range.end() else {
        return Ok(Vec::new());
    };

    let rows = (0..=end_row)
        .map(|row| {
            (0..=end_col)
                .map(|col| range.get_value((row, col)).cloned().unwrap_or(Data::Empty))
                .collect()
        })
        .collect();

    Ok(rows)
}

/// Turn one data row into a submission, or explain why it can't be.
pub fn parse_row(cells: &[Data]) -> Result<NewVin, String> {
    let code = match cells.get(CODE_COLUMN) {
        None | Some(Data::Empty) => return Err("missing VIN code".to_string()),
        Some(Data::String(text)) if text.trim().is_empty() => {
            return Err("missing VIN code".to_string())
        }
        Some(Data::String(text)) => normalize_vin(text),
        Some(_) => return Err("VIN code is not text".to_string()),
    };

    if !is_valid_vin(&code) {
        return Err(format!("invalid VIN code '{}'", code));
    }

    let recorded_at = match cells.get(DATE_COLUMN) {
        None | Some(Data::Empty) => return Err("missing recorded date".to_string()),
        Some(cell) => parse_date_cell(cell)
            .map_err(|reasons| format!("unparseable recorded date ({})", reasons))?,
    };

    Ok(NewVin {
        code,
        recorded_at: Some(recorded_at),
        user_agent: Some(
            optional_text(cells.get(USER_AGENT_COLUMN))
                .unwrap_or_else(|| DEFAULT_IMPORT_USER_AGENT.to_string()),
        ),
        source_address: Some(
            optional_text(cells.get(SOURCE_COLUMN))
                .unwrap_or_else(|| DEFAULT_IMPORT_SOURCE.to_string()),
        ),
    })
}

/// Import every row after the header.
///
/// Rows are independent: a bad row is reported and the rest carry on.
/// Existing codes count as duplicates, not errors.
pub async fn import_rows(repo: &VinRepository<'_>, rows: &[Vec<Data>]) -> ImportSummary {
    let mut errors: Vec<(usize, String)> = Vec::new();
    let mut pending: Vec<(usize, NewVin)> = Vec::new();

    for (index, cells) in rows.iter().enumerate().skip(1) {
        let row_number = index + 1;

        if cells.iter().all(|cell| matches!(cell, Data::Empty)) {
            continue;
        }

        match parse_row(cells) {
            Ok(new) => pending.push((row_number, new)),
            Err(reason) => errors.push((row_number, format!("Row {}: {}", row_number, reason))),
        }
    }

    let outcomes = join_all(
        pending
            .iter()
            .map(|(row_number, new)| async move { (*row_number, repo.create(new).await) }),
    )
    .await;

    let mut summary = ImportSummary::default();
    for (row_number, outcome) in outcomes {
        match outcome {
            Ok(_) => summary.imported += 1,
            Err(AppError::Conflict(_)) => summary.duplicates += 1,
            Err(e) => errors.push((row_number, format!("Row {}: {}", row_number, e))),
        }
    }

    errors.sort_by_key(|(row_number, _)| *row_number);
    summary.errors = errors.len();
    summary.error_messages = errors
        .into_iter()
        .take(MAX_ERROR_MESSAGES)
        .map(|(_, message)| message)
        .collect();

    tracing::info!(
        imported = summary.imported,
        duplicates = summary.duplicates,
        errors = summary.errors,
        "Spreadsheet import finished"
    );

    summary
}

fn optional_text(cell: Option<&Data>) -> Option<String> {
    match cell {
        None | Some(Data::Empty) => None,
        Some(cell) => {
            let text = cell.to_string();
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        }
    }
}

//! Spreadsheet export

use chrono::{DateTime, Utc};
use rust_xlsxwriter::{Color, Format, FormatBorder, Workbook};

use super::dates::format_display;
use super::{
    SpreadsheetError, CODE_COLUMN, DATE_COLUMN, ELAPSED_COLUMN, ID_COLUMN, SOURCE_COLUMN,
    USER_AGENT_COLUMN,
};
use crate::db::VinRecord;

pub const EXPORT_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Placeholder for missing provenance
pub const NOT_SPECIFIED: &str = "Not specified";

const SHEET_NAME: &str = "VINs";

/// Header titles and column widths
const COLUMNS: [(usize, &str, f64); 6] = [
    (ID_COLUMN, "ID", 8.0),
    (CODE_COLUMN, "Code", 22.0),
    (DATE_COLUMN, "Date Recorded", 20.0),
    (ELAPSED_COLUMN, "Elapsed", 16.0),
    (USER_AGENT_COLUMN, "User Agent", 50.0),
    (SOURCE_COLUMN, "Source Address", 18.0),
];

/// Render records to an xlsx workbook
pub fn export_rows(records: &[VinRecord], now: DateTime<Utc>) -> Result<Vec<u8>, SpreadsheetError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    let header = Format::new()
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(0x1F4E79))
        .set_border(FormatBorder::Thin);

    for (col, title, width) in COLUMNS {
        worksheet.write_string_with_format(0, col as u16, title, &header)?;
        worksheet.set_column_width(col as u16, width)?;
    }
    worksheet.set_freeze_panes(1, 0)?;

    for (index, record) in records.iter().enumerate() {
        let row = (index + 1) as u32;

        worksheet.write_number(row, ID_COLUMN as u16, record.id as f64)?;
        worksheet.write_string(row, CODE_COLUMN as u16, &record.code)?;
        worksheet.write_string(row, DATE_COLUMN as u16, format_display(record.recorded_at))?;
        worksheet.write_string(
            row,
            ELAPSED_COLUMN as u16,
            elapsed_label(record.recorded_at, now),
        )?;
        worksheet.write_string(
            row,
            USER_AGENT_COLUMN as u16,
            or_placeholder(record.user_agent.as_deref()),
        )?;
        worksheet.write_string(
            row,
            SOURCE_COLUMN as u16,
            or_placeholder(record.source_address.as_deref()),
        )?;
    }

    Ok(workbook.save_to_buffer()?)
}

/// Human-readable time since `recorded_at`, at day granularity
pub fn elapsed_label(recorded_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let days = (now - recorded_at).num_days();

    match days {
        d if d < 1 => "today".to_string(),
        1 => "yesterday".to_string(),
        d if d < 7 => format!("{} days ago", d),
        d if d < 30 => plural(d / 7, "week"),
        d if d < 365 => plural(d / 30, "month"),
        d => plural(d / 365, "year"),
    }
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {} ago", unit)
    } else {
        format!("{} {}s ago", n, unit)
    }
}

fn or_placeholder(value: Option<&str>) -> &str {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(NOT_SPECIFIED)
}

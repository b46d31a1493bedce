//! Recorded-date parsing
//!
//! Import cells are tried against an ordered list of strategies. Each one
//! either yields a timestamp or explains why it could not, and the reasons
//! are kept for the row's error message.

use calamine::Data;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};

/// Display and primary text format: `DD/MM/YYYY HH:MM:SS`
pub const DISPLAY_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Largest serial Excel accepts (9999-12-31)
const MAX_EXCEL_SERIAL: f64 = 2_958_465.0;

/// Ways of reading a recorded date, in the order they are tried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateStrategy {
    /// A cell the spreadsheet itself stores as a date
    NativeDate,
    /// Text in [`DISPLAY_FORMAT`]
    DayMonthYear,
    /// Any other common textual date
    FreeForm,
}

pub const DATE_STRATEGIES: [DateStrategy; 3] = [
    DateStrategy::NativeDate,
    DateStrategy::DayMonthYear,
    DateStrategy::FreeForm,
];

impl DateStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            Self::NativeDate => "native date",
            Self::DayMonthYear => "DD/MM/YYYY HH:MM:SS",
            Self::FreeForm => "free-form",
        }
    }

    pub fn parse(&self, cell: &Data) -> Result<DateTime<Utc>, String> {
        match self {
            Self::NativeDate => parse_native(cell),
            Self::DayMonthYear => {
                let text = text_of(cell)?;
                NaiveDateTime::parse_from_str(text, DISPLAY_FORMAT)
                    .map(|dt| dt.and_utc())
                    .map_err(|e| e.to_string())
            }
            Self::FreeForm => {
                let text = text_of(cell)?;
                parse_free_form(text).ok_or_else(|| format!("unrecognized date '{}'", text))
            }
        }
    }
}

/// Try every strategy in order.
///
/// On failure the error lists each strategy with its reason.
pub fn parse_date_cell(cell: &Data) -> Result<DateTime<Utc>, String> {
    let mut reasons = Vec::with_capacity(DATE_STRATEGIES.len());

    for strategy in DATE_STRATEGIES {
        match strategy.parse(cell) {
            Ok(ts) => return Ok(ts),
            Err(reason) => reasons.push(format!("{}: {}", strategy.name(), reason)),
        }
    }

    Err(reasons.join("; "))
}

/// Parse the common textual date forms; dates without a time are midnight UTC.
///
/// Slash-separated dates are read day-first.
pub fn parse_free_form(text: &str) -> Option<DateTime<Utc>> {
    const DATE_TIME_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
        "%Y/%m/%d %H:%M:%S",
        "%Y/%m/%d %H:%M",
        "%d/%m/%Y %H:%M:%S",
        "%d/%m/%Y %H:%M",
        "%m/%d/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M",
        "%d.%m.%Y %H:%M:%S",
        "%d-%m-%Y %H:%M:%S",
    ];
    const DATE_FORMATS: &[&str] = &[
        "%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%m/%d/%Y", "%d.%m.%Y", "%d-%m-%Y",
    ];

    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_rfc2822(text) {
        return Some(ts.with_timezone(&Utc));
    }

    DATE_TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
                .map(|d| d.and_time(NaiveTime::MIN))
        })
        .map(|dt| dt.and_utc())
}

/// Format a timestamp the way exports display it
pub fn format_display(ts: DateTime<Utc>) -> String {
    ts.format(DISPLAY_FORMAT).to_string()
}

fn parse_native(cell: &Data) -> Result<DateTime<Utc>, String> {
    match cell {
        Data::DateTime(value) => value
            .as_datetime()
            .map(|dt| dt.and_utc())
            .ok_or_else(|| "date value is out of range".to_string()),
        Data::DateTimeIso(text) => NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| {
                NaiveDate::parse_from_str(text, "%Y-%m-%d")
                    .map(|d| d.and_time(NaiveTime::MIN))
            })
            .map(|dt| dt.and_utc())
            .map_err(|e| format!("bad ISO date '{}': {}", text, e)),
        Data::Float(serial) => from_excel_serial(*serial),
        Data::Int(serial) => from_excel_serial(*serial as f64),
        _ => Err("cell is not a date value".to_string()),
    }
}

/// Convert an Excel serial day number (1900 system) to a timestamp.
fn from_excel_serial(serial: f64) -> Result<DateTime<Utc>, String> {
    if !serial.is_finite() || serial < 1.0 || serial > MAX_EXCEL_SERIAL {
        return Err(format!("number {} is not a date serial", serial));
    }

    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)
        .map(|d| d.and_time(NaiveTime::MIN))
        .ok_or_else(|| "invalid epoch".to_string())?;
    let millis = (serial * 86_400_000.0).round() as i64;

    Ok((epoch + Duration::milliseconds(millis)).and_utc())
}

fn text_of(cell: &Data) -> Result<&str, String> {
    match cell {
        Data::String(text) => Ok(text.trim()),
        _ => Err("cell is not text".to_string()),
    }
}

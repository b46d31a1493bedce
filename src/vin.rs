//! VIN validation and extraction
//!
//! A VIN is exactly 17 characters drawn from uppercase letters and digits,
//! excluding `I`, `O` and `Q`.

use std::sync::LazyLock;

use regex::Regex;

/// Required VIN length
pub const VIN_LENGTH: usize = 17;

static VIN_EXACT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-HJ-NPR-Z0-9]{17}$").expect("valid VIN pattern"));

static VIN_SEARCH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-HJ-NPR-Z0-9]{17}").expect("valid VIN pattern"));

/// Check whether `code` is a well-formed VIN.
///
/// Case-sensitive: lowercase input is rejected, so callers that accept
/// lowercase must [`normalize_vin`] first.
pub fn is_valid_vin(code: &str) -> bool {
    VIN_EXACT.is_match(code)
}

/// Trim surrounding whitespace and uppercase.
pub fn normalize_vin(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Find the leftmost VIN-shaped run of characters in free text.
pub fn find_vin(text: &str) -> Option<&str> {
    VIN_SEARCH.find(text).map(|m| m.as_str())
}

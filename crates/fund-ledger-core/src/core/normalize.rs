// fund-ledger-core/src/core/normalize.rs
// ============================================================================
// Module: Field Normalizer
// Description: Converts raw report cell text into typed optional values.
// Purpose: Tolerate report noise without discarding rows.
// Dependencies: time
// ============================================================================

//! ## Overview
//! Report cells carry footnote asterisks, percent signs, blank cells, and
//! dates in several human layouts. Normalization never fails: anything that
//! cannot be read becomes `None`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use time::Date;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Trailing marker characters stripped from numeric cells.
const NUMBER_MARKERS: [char; 2] = ['*', '%'];

/// Date layouts tried in order; the first successful parse wins.
const DATE_LAYOUTS: [&[BorrowedFormatItem<'static>]; 4] = [
    // Jan 5, 2024
    format_description!("[month repr:short case_sensitive:false] [day padding:none], [year]"),
    // 5 Jan, 2024
    format_description!("[day padding:none] [month repr:short case_sensitive:false], [year]"),
    // January 5, 2024
    format_description!("[month repr:long case_sensitive:false] [day padding:none], [year]"),
    // 5 January, 2024
    format_description!("[day padding:none] [month repr:long case_sensitive:false], [year]"),
];

// ============================================================================
// SECTION: Numbers
// ============================================================================

/// Parses a numeric report cell.
///
/// Surrounding whitespace and any run of trailing `*` or `%` markers are
/// removed first. Empty, non-numeric, and non-finite values yield `None`.
#[must_use]
pub fn normalize_number(text: &str) -> Option<f64> {
    let cleaned = text.trim().trim_end_matches(NUMBER_MARKERS).trim_end();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|value| value.is_finite())
}

// ============================================================================
// SECTION: Dates
// ============================================================================

/// Parses a calendar date cell using the fixed layout list.
///
/// Runs of spaces collapse to one before matching. Years must be four
/// unsigned digits, so every accepted date has an RFC 3339 form.
#[must_use]
pub fn normalize_date(text: &str) -> Option<Date> {
    let cleaned = text.split(' ').filter(|word| !word.is_empty()).collect::<Vec<_>>().join(" ");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned.contains(['+', '-']) {
        return None;
    }
    DATE_LAYOUTS
        .iter()
        .find_map(|layout| Date::parse(cleaned, layout).ok())
        .filter(|date| has_plain_year(*date))
}

/// True for years `0..=9999`.
#[must_use]
pub fn has_plain_year(date: Date) -> bool {
    (0..=9999).contains(&date.year())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

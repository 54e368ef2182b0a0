// fund-ledger-core/src/core/extract.rs
// ============================================================================
// Module: Fund Table Extractor
// Description: Scans the daily report HTML for fund rows.
// Purpose: Map the fixed report table layout onto FundSnapshot records.
// Dependencies: html-escape, scraper, time
// ============================================================================

//! ## Overview
//! The daily report is a single HTML table whose data rows are centered
//! (`<tr align="center">`) and carry twelve cells in a fixed order:
//!
//! | Index | Field |
//! |-------|-------|
//! | 0 | name |
//! | 1 | launch date |
//! | 2 | validity date |
//! | 3..=11 | repurchase, offer, nav, mtd, fytd, cytd, fy24, fy23, since inception |
//!
//! Centered rows with fewer cells (headers, section banners) are not data and
//! are skipped silently. The selector encodes the report layout and is not
//! configurable.

// ============================================================================
// SECTION: Imports
// ============================================================================

use scraper::ElementRef;
use scraper::Html;
use scraper::Selector;
use thiserror::Error;
use time::OffsetDateTime;

use crate::core::normalize::normalize_date;
use crate::core::normalize::normalize_number;
use crate::core::snapshot::FundSnapshot;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Minimum number of cells a row needs to count as a fund row.
pub const MIN_FUND_COLUMNS: usize = 12;
/// Selector for candidate data rows.
const ROW_SELECTOR: &str = "tr[align='center']";
/// Selector for cells within a candidate row.
const CELL_SELECTOR: &str = "td";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Extraction failures. Field-level parse problems are never errors.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// A built-in selector failed to compile.
    #[error("invalid selector `{selector}`: {message}")]
    Selector {
        /// Selector source text.
        selector: &'static str,
        /// Parser message.
        message: String,
    },
}

// ============================================================================
// SECTION: Extraction
// ============================================================================

/// Extracts fund snapshots from raw document bytes.
///
/// Invalid UTF-8 sequences (stray legacy-codepage bytes in the email body)
/// become U+FFFD; the rest of the document is read as usual.
///
/// # Errors
///
/// Returns [`ExtractionError::Selector`] if a built-in selector is rejected.
pub fn extract(
    document: &[u8],
    upload_date: OffsetDateTime,
) -> Result<Vec<FundSnapshot>, ExtractionError> {
    extract_str(&String::from_utf8_lossy(document), upload_date)
}

/// Extracts fund snapshots from document text, in document order.
///
/// Character entities are decoded once before parsing because the report
/// arrives entity-escaped inside the email body. An empty result is valid.
///
/// # Errors
///
/// Returns [`ExtractionError::Selector`] if a built-in selector is rejected.
pub fn extract_str(
    document: &str,
    upload_date: OffsetDateTime,
) -> Result<Vec<FundSnapshot>, ExtractionError> {
    let rows = compile_selector(ROW_SELECTOR)?;
    let cells = compile_selector(CELL_SELECTOR)?;
    let decoded = html_escape::decode_html_entities(document);
    let html = Html::parse_document(&decoded);
    let snapshots = html
        .select(&rows)
        .filter_map(|row| {
            let columns: Vec<String> = row.select(&cells).map(cell_text).collect();
            snapshot_from_columns(&columns, upload_date)
        })
        .collect();
    Ok(snapshots)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Compiles a built-in CSS selector.
fn compile_selector(selector: &'static str) -> Result<Selector, ExtractionError> {
    Selector::parse(selector).map_err(|err| ExtractionError::Selector {
        selector,
        message: err.to_string(),
    })
}

/// Returns the trimmed text of a cell and all its descendants.
fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_string()
}

/// Maps an ordered cell list onto a snapshot; `None` for non-data rows.
fn snapshot_from_columns(columns: &[String], upload_date: OffsetDateTime) -> Option<FundSnapshot> {
    let [
        name,
        launch_date,
        validity_date,
        repurchase,
        offer,
        nav,
        mtd,
        fytd,
        cytd,
        fy24,
        fy23,
        since_inception,
        ..,
    ] = columns
    else {
        return None;
    };
    Some(FundSnapshot {
        name: name.trim_end_matches('*').trim_end().to_string(),
        launch_date: normalize_date(launch_date),
        validity_date: normalize_date(validity_date),
        repurchase: normalize_number(repurchase),
        offer: normalize_number(offer),
        nav: normalize_number(nav),
        mtd: normalize_number(mtd),
        fytd: normalize_number(fytd),
        cytd: normalize_number(cytd),
        fy24: normalize_number(fy24),
        fy23: normalize_number(fy23),
        since_inception: normalize_number(since_inception),
        upload_date,
    })
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        reason = "Test-only assertions use unwrap for clarity."
    )]

    use time::macros::date;
    use time::macros::datetime;

    use super::MIN_FUND_COLUMNS;
    use super::extract;
    use super::extract_str;
    use super::snapshot_from_columns;

    fn row_cells(count: usize) -> Vec<String> {
        (0..count).map(|index| format!("{index}")).collect()
    }

    #[test]
    fn short_rows_are_not_data() {
        let upload = datetime!(2024-03-01 0:00 UTC);
        assert!(snapshot_from_columns(&row_cells(MIN_FUND_COLUMNS - 1), upload).is_none());
        assert!(snapshot_from_columns(&[], upload).is_none());
        assert!(snapshot_from_columns(&row_cells(MIN_FUND_COLUMNS), upload).is_some());
    }

    #[test]
    fn extra_cells_are_ignored() {
        let upload = datetime!(2024-03-01 0:00 UTC);
        let snapshot = snapshot_from_columns(&row_cells(MIN_FUND_COLUMNS + 3), upload).unwrap();
        assert_eq!(snapshot.since_inception, Some(11.0));
    }

    #[test]
    fn entities_are_decoded_before_parsing() {
        let document = "&lt;table&gt;&lt;tr align=\"center\"&gt;\
            &lt;td&gt;Delta &amp;amp; Co Fund*&lt;/td&gt;&lt;td&gt;Jan 5, 2024&lt;/td&gt;\
            &lt;td&gt;&lt;/td&gt;&lt;td&gt;1&lt;/td&gt;&lt;td&gt;2&lt;/td&gt;&lt;td&gt;3&lt;/td&gt;\
            &lt;td&gt;4&lt;/td&gt;&lt;td&gt;5&lt;/td&gt;&lt;td&gt;6&lt;/td&gt;&lt;td&gt;7&lt;/td&gt;\
            &lt;td&gt;8&lt;/td&gt;&lt;td&gt;9&lt;/td&gt;&lt;/tr&gt;&lt;/table&gt;";
        let funds = extract_str(document, datetime!(2024-03-01 0:00 UTC)).unwrap();
        assert_eq!(funds.len(), 1);
        assert_eq!(funds[0].name, "Delta & Co Fund");
        assert_eq!(funds[0].launch_date, Some(date!(2024 - 01 - 05)));
        assert_eq!(funds[0].since_inception, Some(9.0));
    }

    #[test]
    fn stray_non_utf8_bytes_do_not_hide_rows() {
        let mut document = b"<table><tr align=\"center\"><td>Gamma \xae Fund</td>".to_vec();
        document.extend_from_slice("<td>1</td>".repeat(11).as_bytes());
        document.extend_from_slice(b"</tr></table><p>\x96 footer</p>");
        let funds = extract(&document, datetime!(2024-03-01 0:00 UTC)).unwrap();
        assert_eq!(funds.len(), 1);
        assert_eq!(funds[0].name, "Gamma \u{fffd} Fund");
        assert_eq!(funds[0].launch_date, None);
        assert_eq!(funds[0].since_inception, Some(1.0));
    }

    #[test]
    fn binary_noise_yields_no_rows() {
        let funds = extract(&[0xff, 0xfe, 0x00, 0x3c], datetime!(2024-03-01 0:00 UTC)).unwrap();
        assert!(funds.is_empty());
    }
}

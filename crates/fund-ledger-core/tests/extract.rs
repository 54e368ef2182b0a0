// fund-ledger-core/tests/extract.rs
// ============================================================================
// Module: Fund Table Extraction Tests
// Description: Validate row selection and column mapping on report documents.
// Purpose: Ensure only qualifying rows become snapshots, in document order.
// Dependencies: fund-ledger-core, proptest, time
// ============================================================================

//! ## Overview
//! Exercises the extractor against a captured report layout and against
//! generated tables mixing qualifying and short rows.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::float_cmp,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt::Write as _;

use fund_ledger_core::FundSnapshot;
use fund_ledger_core::MIN_FUND_COLUMNS;
use fund_ledger_core::extract;
use fund_ledger_core::extract_str;
use proptest::prelude::*;
use time::OffsetDateTime;
use time::macros::date;
use time::macros::datetime;

// ============================================================================
// SECTION: Helpers
// ============================================================================

const DAILY_REPORT: &str = include_str!("fixtures/daily_report.html");

/// Renders a centered row with the given cell texts.
fn centered_row(cells: &[String]) -> String {
    let mut row = String::from("<tr align=\"center\">");
    for cell in cells {
        let _ = write!(row, "<td>{cell}</td>");
    }
    row.push_str("</tr>");
    row
}

/// Wraps rows in a minimal report document.
fn document(rows: &[String]) -> String {
    format!("<html><body><table>{}</table></body></html>", rows.concat())
}

fn cells(count: usize, prefix: &str) -> Vec<String> {
    (0..count).map(|index| format!("{prefix}{index}")).collect()
}

fn fund_names(funds: &[FundSnapshot]) -> Vec<&str> {
    funds.iter().map(|fund| fund.name.as_str()).collect()
}

// ============================================================================
// SECTION: Fixture Tests
// ============================================================================

#[test]
fn daily_report_yields_three_funds_in_order() {
    let upload = datetime!(2024-03-01 0:00 UTC);
    let funds = extract(DAILY_REPORT.as_bytes(), upload).unwrap();
    assert_eq!(
        fund_names(&funds),
        vec!["Alpha Equity Fund", "Beta Income Fund", "Gamma Islamic Savings Fund"]
    );
    assert!(funds.iter().all(|fund| fund.upload_date == upload));
}

#[test]
fn daily_report_maps_every_column() {
    let funds = extract(DAILY_REPORT.as_bytes(), datetime!(2024-03-01 0:00 UTC)).unwrap();
    let alpha = &funds[0];
    assert_eq!(alpha.launch_date, Some(date!(2015 - 01 - 05)));
    assert_eq!(alpha.validity_date, Some(date!(2024 - 03 - 01)));
    assert_eq!(alpha.repurchase, Some(112.45));
    assert_eq!(alpha.offer, Some(115.23));
    assert_eq!(alpha.nav, Some(113.84));
    assert_eq!(alpha.mtd, Some(2.31));
    assert_eq!(alpha.fytd, Some(8.75));
    assert_eq!(alpha.cytd, Some(5.12));
    assert_eq!(alpha.fy24, Some(14.2));
    assert_eq!(alpha.fy23, Some(-3.45));
    assert_eq!(alpha.since_inception, Some(212.5));
}

#[test]
fn daily_report_degrades_noisy_cells_to_absent() {
    let funds = extract(DAILY_REPORT.as_bytes(), datetime!(2024-03-01 0:00 UTC)).unwrap();
    let beta = &funds[1];
    assert_eq!(beta.launch_date, Some(date!(2018 - 03 - 12)));
    assert_eq!(beta.since_inception, None);

    let gamma = &funds[2];
    assert_eq!(gamma.launch_date, Some(date!(2020 - 09 - 09)));
    assert_eq!(gamma.validity_date, None);
    assert_eq!(gamma.mtd, None);
    assert_eq!(gamma.fytd, None);
    assert_eq!(gamma.cytd, None);
    assert_eq!(gamma.fy24, Some(20.5));
    assert_eq!(gamma.fy23, Some(18.1));
}

#[test]
fn documents_without_fund_rows_extract_nothing() {
    let upload = datetime!(2024-03-01 0:00 UTC);
    assert!(extract_str("", upload).unwrap().is_empty());
    assert!(extract_str("<p>No report today.</p>", upload).unwrap().is_empty());
    let only_headers = document(&[centered_row(&cells(3, "h"))]);
    assert!(extract_str(&only_headers, upload).unwrap().is_empty());
}

#[test]
fn malformed_markup_is_tolerated() {
    let mut broken = document(&[centered_row(&cells(MIN_FUND_COLUMNS, "7"))]);
    broken.truncate(broken.len() - "</table></body></html>".len());
    broken.push_str("<div><span>");
    let funds = extract_str(&broken, datetime!(2024-03-01 0:00 UTC)).unwrap();
    assert_eq!(funds.len(), 1);
}

#[test]
fn nested_cells_count_toward_columns() {
    let row = format!(
        "<tr align=\"center\"><td>Nested Fund</td><td><table><tr><td>x</td></tr></table></td>{}</tr>",
        cells(MIN_FUND_COLUMNS - 3, "").iter().map(|cell| format!("<td>{cell}</td>")).collect::<String>()
    );
    let funds = extract_str(&document(&[row]), datetime!(2024-03-01 0:00 UTC)).unwrap();
    assert_eq!(funds.len(), 1);
    assert_eq!(funds[0].name, "Nested Fund");
}

// ============================================================================
// SECTION: Properties
// ============================================================================

/// Arbitrary cell text including markup-hostile characters.
fn cell_text() -> impl Strategy<Value = String> {
    "[ A-Za-z0-9.,%*&<>-]{0,12}".prop_map(|text| {
        text.replace('&', "&amp;amp;").replace('<', "&amp;lt;").replace('>', "&amp;gt;")
    })
}

/// A table row: `true` marks a qualifying row.
fn table_row() -> impl Strategy<Value = (bool, Vec<String>)> {
    prop_oneof![
        prop::collection::vec(cell_text(), MIN_FUND_COLUMNS..MIN_FUND_COLUMNS + 4)
            .prop_map(|cells| (true, cells)),
        prop::collection::vec(cell_text(), 0..MIN_FUND_COLUMNS).prop_map(|cells| (false, cells)),
    ]
}

proptest! {
    #[test]
    fn qualifying_rows_map_one_to_one(
        rows in prop::collection::vec(table_row(), 0..16),
        seconds in 0_i64..4_000_000_000,
    ) {
        let upload = OffsetDateTime::from_unix_timestamp(seconds).unwrap();
        let qualifying = rows.iter().filter(|(qualifies, _)| *qualifies).count();
        let rendered: Vec<String> = rows.iter().map(|(_, cells)| centered_row(cells)).collect();
        let funds = extract_str(&document(&rendered), upload).unwrap();
        prop_assert_eq!(funds.len(), qualifying);
        prop_assert!(funds.iter().all(|fund| fund.upload_date == upload));
    }

    #[test]
    fn short_rows_never_extracted(count in 0..MIN_FUND_COLUMNS, copies in 1_usize..6) {
        let row = centered_row(&cells(count, "9"));
        let funds = extract_str(&document(&vec![row; copies]), datetime!(2024-03-01 0:00 UTC))
            .unwrap();
        prop_assert!(funds.is_empty());
    }
}

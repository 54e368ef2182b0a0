// fund-ledger-core/tests/proptest_normalize.rs
// ============================================================================
// Module: Field Normalizer Property Tests
// Description: Property-based checks for numeric and date normalization.
// Purpose: Ensure report noise never changes a parsed value.
// Dependencies: fund-ledger-core, proptest, time
// ============================================================================

//! ## Overview
//! Numbers wrapped in whitespace and trailing markers must normalize to the
//! same value as their bare text, and every supported date layout must land
//! on the same calendar date.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use fund_ledger_core::normalize_date;
use fund_ledger_core::normalize_number;
use proptest::prelude::*;
use time::Date;
use time::Month;

fn decimal_text() -> impl Strategy<Value = String> {
    (any::<bool>(), 0_u32..1_000_000, 0_u32..10_000)
        .prop_map(|(negative, whole, fraction)| {
            let sign = if negative { "-" } else { "" };
            format!("{sign}{whole}.{fraction}")
        })
}

fn markers() -> impl Strategy<Value = String> {
    "[*%]{0,4}"
}

fn padding() -> impl Strategy<Value = String> {
    "[ \t\r\n]{0,3}"
}

fn calendar_date() -> impl Strategy<Value = Date> {
    (1900_i32..2100, 1_u8..=12, 1_u8..=28).prop_map(|(year, month, day)| {
        let month = Month::try_from(month).unwrap();
        Date::from_calendar_date(year, month, day).unwrap()
    })
}

fn short_month(month: Month) -> String {
    month.to_string().chars().take(3).collect()
}

proptest! {
    #[test]
    fn noise_does_not_change_numbers(
        text in decimal_text(),
        trailing in markers(),
        leading_space in padding(),
        trailing_space in padding(),
    ) {
        let noisy = format!("{leading_space}{text}{trailing}{trailing_space}");
        let expected = normalize_number(&text);
        prop_assert!(expected.is_some());
        prop_assert_eq!(normalize_number(&noisy), expected);
    }

    #[test]
    fn letters_are_never_numbers(text in "[A-Za-z]{1,8}", trailing in markers()) {
        prop_assert_eq!(normalize_number(&format!("{text}{trailing}")), None);
    }

    #[test]
    fn markers_alone_are_absent(trailing in markers(), space in padding()) {
        prop_assert_eq!(normalize_number(&format!("{space}{trailing}{space}")), None);
    }

    #[test]
    fn every_layout_lands_on_the_same_date(date in calendar_date(), space in padding()) {
        let long = date.month().to_string();
        let short = short_month(date.month());
        let (day, year) = (date.day(), date.year());
        let layouts = [
            format!("{short} {day}, {year}"),
            format!("{day} {short}, {year}"),
            format!("{long} {day}, {year}"),
            format!("{day} {long}, {year}"),
        ];
        for layout in layouts {
            prop_assert_eq!(normalize_date(&format!("{space}{layout}{space}")), Some(date));
        }
    }
}

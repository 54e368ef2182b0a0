// fund-ledger-core/src/core/snapshot.rs
// ============================================================================
// Module: Fund Snapshot Model
// Description: One fund's performance metrics as of one reporting date.
// Purpose: Define the sole persisted entity and its timestamp encoding.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! A [`FundSnapshot`] is built in memory during extraction, persisted once,
//! and never mutated afterwards. Every metric and calendar field is
//! independently optional so a malformed cell never discards its row.
//!
//! Timestamps use RFC 3339 text both on the wire and in storage. Calendar
//! dates are encoded as midnight UTC on that date.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use time::Date;
use time::OffsetDateTime;
use time::UtcOffset;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Snapshot
// ============================================================================

/// A single fund row scraped from one upload.
///
/// Historical identity is the pair (`name`, `upload_date`). The pair is not
/// unique: re-uploading a report produces a second snapshot for each fund.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundSnapshot {
    /// Fund name with trailing marker asterisks removed.
    pub name: String,
    /// Fund launch date.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "calendar_date")]
    pub launch_date: Option<Date>,
    /// Date the quoted prices are valid for.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "calendar_date")]
    pub validity_date: Option<Date>,
    /// Repurchase (redemption) price.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repurchase: Option<f64>,
    /// Offer (subscription) price.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offer: Option<f64>,
    /// Net asset value per unit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nav: Option<f64>,
    /// Month-to-date return.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtd: Option<f64>,
    /// Fiscal-year-to-date return.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fytd: Option<f64>,
    /// Calendar-year-to-date return.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cytd: Option<f64>,
    /// Return for fiscal year 2024.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fy24: Option<f64>,
    /// Return for fiscal year 2023.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fy23: Option<f64>,
    /// Return since the fund was launched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since_inception: Option<f64>,
    /// Snapshot date declared by the uploader (not the processing time).
    #[serde(with = "time::serde::rfc3339")]
    pub upload_date: OffsetDateTime,
}

// ============================================================================
// SECTION: Timestamp Encoding
// ============================================================================

/// Returns the instant a calendar date stands for: midnight UTC.
#[must_use]
pub const fn date_instant(date: Date) -> OffsetDateTime {
    date.midnight().assume_utc()
}

/// Formats an instant as RFC 3339 text.
///
/// # Errors
///
/// Returns [`time::error::Format`] when the instant cannot be represented
/// (years outside `0..=9999`).
pub fn format_timestamp(value: OffsetDateTime) -> Result<String, time::error::Format> {
    value.format(&Rfc3339)
}

/// Parses RFC 3339 text back into an instant.
///
/// # Errors
///
/// Returns [`time::error::Parse`] when the text is not valid RFC 3339.
pub fn parse_timestamp(text: &str) -> Result<OffsetDateTime, time::error::Parse> {
    OffsetDateTime::parse(text, &Rfc3339)
}

/// Serde adapter encoding optional calendar dates as RFC 3339 midnight UTC.
mod calendar_date {
    use serde::Deserialize;
    use serde::Deserializer;
    use serde::Serializer;
    use time::Date;

    use super::UtcOffset;
    use super::date_instant;
    use super::format_timestamp;
    use super::parse_timestamp;

    /// Serializes an optional date as a timestamp string.
    #[allow(clippy::ref_option, reason = "Signature is dictated by serde's `with` adapter.")]
    pub fn serialize<S>(value: &Option<Date>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(date) => {
                let text =
                    format_timestamp(date_instant(*date)).map_err(serde::ser::Error::custom)?;
                serializer.serialize_some(&text)
            }
            None => serializer.serialize_none(),
        }
    }

    /// Deserializes an optional timestamp string into its UTC calendar date.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Date>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text: Option<String> = Option::deserialize(deserializer)?;
        text.map(|text| {
            parse_timestamp(&text)
                .map(|instant| instant.to_offset(UtcOffset::UTC).date())
                .map_err(serde::de::Error::custom)
        })
        .transpose()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

// fund-ledger-core/src/core/mod.rs
// ============================================================================
// Module: Fund Ledger Core Types
// Description: Snapshot model, field normalization, and table extraction.
// Purpose: Group the pure data-handling pieces of the ingestion pipeline.
// Dependencies: scraper, serde, time
// ============================================================================

//! ## Overview
//! Core types hold no I/O. Everything here is deterministic for a given
//! document and upload date.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod extract;
pub mod normalize;
pub mod snapshot;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use extract::ExtractionError;
pub use extract::MIN_FUND_COLUMNS;
pub use extract::extract;
pub use extract::extract_str;
pub use normalize::has_plain_year;
pub use normalize::normalize_date;
pub use normalize::normalize_number;
pub use snapshot::FundSnapshot;
pub use snapshot::date_instant;
pub use snapshot::format_timestamp;
pub use snapshot::parse_timestamp;

// fund-ledger-core/src/lib.rs
// ============================================================================
// Module: Fund Ledger Core Library
// Description: Public API surface for the Fund Ledger core.
// Purpose: Expose the snapshot model, extraction pipeline, and store interfaces.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Fund Ledger core turns the daily fund performance report (an HTML email
//! attachment) into typed [`FundSnapshot`] records. Extraction is a pure
//! transformation over the document; persistence is reached only through the
//! [`SnapshotStore`] interface so backends stay swappable.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::CancelOnDrop;
pub use interfaces::SnapshotStore;
pub use interfaces::StoreCancellation;
pub use interfaces::StoreError;
pub use runtime::InMemorySnapshotStore;
pub use runtime::SharedSnapshotStore;

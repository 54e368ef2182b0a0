// fund-ledger-core/src/runtime/mod.rs
// ============================================================================
// Module: Fund Ledger Runtime
// Description: Runtime helpers shared by servers and tests.
// Purpose: Provide store wrappers that plug into the SnapshotStore interface.
// Dependencies: crate::interfaces
// ============================================================================

//! ## Overview
//! Runtime helpers hold store plumbing that does not belong to any single
//! backend.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::InMemorySnapshotStore;
pub use store::SharedSnapshotStore;

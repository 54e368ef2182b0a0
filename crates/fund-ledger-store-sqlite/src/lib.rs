// fund-ledger-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Snapshot Store
// Description: Durable SnapshotStore backend using SQLite WAL.
// Purpose: Provide production persistence for fund snapshots.
// Dependencies: fund-ledger-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides a SQLite-backed [`SnapshotStore`] implementation that
//! appends fund snapshots to a single `funds` table. Each batch is written in
//! one transaction; a failed insert rolls the whole batch back.
//!
//! [`SnapshotStore`]: fund_ledger_core::SnapshotStore

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::SqliteSnapshotStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
pub use store::StoredSnapshot;

// fund-ledger-config/src/lib.rs
// ============================================================================
// Module: Fund Ledger Config Library
// Description: Canonical config model and validation.
// Purpose: Single source of truth for fund-ledger.toml and its env overrides.
// Dependencies: fund-ledger-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `fund-ledger-config` defines the configuration model for the upload
//! service. Validation is strict and fails closed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;

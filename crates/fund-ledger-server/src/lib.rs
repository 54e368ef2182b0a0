// fund-ledger-server/src/lib.rs
// ============================================================================
// Module: Fund Ledger Server Library
// Description: HTTP surface for report uploads and health checks.
// Purpose: Wire authentication, extraction, and storage into axum handlers.
// Dependencies: axum, fund-ledger-config, fund-ledger-core, tokio, tracing
// ============================================================================

//! ## Overview
//! `fund-ledger-server` exposes `POST /upload` and `GET /health`. Uploads are
//! authenticated with a shared API key, extracted into fund snapshots, and
//! stored as one atomic batch. Every upload attempt emits one audit event.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod auth;
pub mod server;
pub mod upload;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::FileUploadAuditSink;
pub use audit::NoopUploadAuditSink;
pub use audit::StderrUploadAuditSink;
pub use audit::UploadAuditEvent;
pub use audit::UploadAuditEventParams;
pub use audit::UploadAuditSink;
pub use audit::UploadOutcome;
pub use auth::API_KEY_HEADER;
pub use auth::ApiKeyAuth;
pub use auth::AuthError;
pub use server::AppState;
pub use server::FundLedgerServer;
pub use server::ServerError;
pub use server::UploadLimits;
pub use server::build_router;
pub use server::handle_health;
pub use upload::DATE_FIELD;
pub use upload::FILE_FIELD;
pub use upload::UploadError;
pub use upload::handle_upload;

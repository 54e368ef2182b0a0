// fund-ledger-server/src/audit.rs
// ============================================================================
// Module: Upload Audit Logging
// Description: Structured audit events for upload request handling.
// Purpose: Emit one JSON line per upload attempt without hard dependencies.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every upload attempt, accepted or not, produces one [`UploadAuditEvent`].
//! Sinks write events as JSON lines; failures to write are swallowed so that
//! auditing never fails a request.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Final disposition of an upload request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadOutcome {
    /// Snapshots were stored.
    Accepted,
    /// Caller error (4xx).
    Rejected,
    /// Server-side failure (5xx).
    Failed,
}

impl UploadOutcome {
    /// Classifies an HTTP status code.
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            200..=299 => Self::Accepted,
            400..=499 => Self::Rejected,
            _ => Self::Failed,
        }
    }
}

/// Upload audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct UploadAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Request identifier.
    pub request_id: String,
    /// Peer IP address.
    pub peer_ip: Option<String>,
    /// Request outcome.
    pub outcome: UploadOutcome,
    /// HTTP status returned.
    pub status: u16,
    /// Number of snapshots stored.
    pub fund_count: Option<usize>,
    /// Size of the uploaded file in bytes, when read.
    pub file_bytes: Option<usize>,
    /// Upload date applied to the batch (RFC 3339).
    pub upload_date: Option<String>,
    /// Stable error classification on failure.
    pub error_kind: Option<&'static str>,
}

/// Upload audit event inputs.
#[derive(Debug, Clone, Default)]
pub struct UploadAuditEventParams {
    /// Request identifier.
    pub request_id: String,
    /// Peer IP address.
    pub peer_ip: Option<String>,
    /// HTTP status returned.
    pub status: u16,
    /// Number of snapshots stored.
    pub fund_count: Option<usize>,
    /// Size of the uploaded file in bytes.
    pub file_bytes: Option<usize>,
    /// Upload date applied to the batch.
    pub upload_date: Option<String>,
    /// Stable error classification on failure.
    pub error_kind: Option<&'static str>,
}

impl UploadAuditEvent {
    /// Creates a new audit event stamped with the current time.
    #[must_use]
    pub fn new(params: UploadAuditEventParams) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            event: "fund_upload",
            timestamp_ms,
            request_id: params.request_id,
            peer_ip: params.peer_ip,
            outcome: UploadOutcome::from_status(params.status),
            status: params.status,
            fund_count: params.fund_count,
            file_bytes: params.file_bytes,
            upload_date: params.upload_date,
            error_kind: params.error_kind,
        }
    }
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink for upload events.
pub trait UploadAuditSink: Send + Sync {
    /// Record an audit event.
    fn record(&self, event: &UploadAuditEvent);
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrUploadAuditSink;

impl UploadAuditSink for StderrUploadAuditSink {
    fn record(&self, event: &UploadAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that appends JSON lines to a file.
pub struct FileUploadAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileUploadAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl UploadAuditSink for FileUploadAuditSink {
    fn record(&self, event: &UploadAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// No-op audit sink.
pub struct NoopUploadAuditSink;

impl UploadAuditSink for NoopUploadAuditSink {
    fn record(&self, _event: &UploadAuditEvent) {}
}

// ============================================================================
// SECTION: Tests
// ============================================================================

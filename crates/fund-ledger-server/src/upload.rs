// fund-ledger-server/src/upload.rs
// ============================================================================
// Module: Upload Handler
// Description: Authenticated multipart upload, extraction, and storage.
// Purpose: Turn one uploaded report into one stored batch of snapshots.
// Dependencies: axum, fund-ledger-core, time, tokio, tracing, uuid
// ============================================================================

//! ## Overview
//! `POST /upload` runs a fixed pipeline: API key, method, multipart form,
//! capped file read, upload date, extraction, storage, JSON echo. Each step
//! either advances or ends the request with a plain-text error. Extraction
//! completes before storage starts and storage is all-or-nothing, so a
//! rejected request never leaves rows behind.
//!
//! The whole pipeline runs under the configured request deadline. Storage
//! runs on the blocking pool under a [`StoreCancellation`] that fires when the
//! pipeline is dropped, so a deadline or a client disconnect rolls the batch
//! back instead of letting it commit unobserved.
//!
//! The `date` form part wins over a `?date=` query parameter; the query is
//! only read when the form carries no `date` part at all.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ConnectInfo;
use axum::extract::FromRequest;
use axum::extract::Multipart;
use axum::extract::Query;
use axum::extract::Request;
use axum::extract::State;
use axum::extract::multipart::Field;
use axum::extract::multipart::MultipartError;
use axum::http::Method;
use axum::http::StatusCode;
use axum::http::header;
use axum::response::IntoResponse;
use axum::response::Response;
use fund_ledger_core::ExtractionError;
use fund_ledger_core::FundSnapshot;
use fund_ledger_core::SnapshotStore;
use fund_ledger_core::StoreCancellation;
use fund_ledger_core::StoreError;
use fund_ledger_core::date_instant;
use fund_ledger_core::extract;
use fund_ledger_core::format_timestamp;
use fund_ledger_core::has_plain_year;
use serde::Deserialize;
use thiserror::Error;
use time::Date;
use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use tracing::Instrument;
use uuid::Uuid;

use crate::audit::UploadAuditEvent;
use crate::audit::UploadAuditEventParams;
use crate::auth::AuthError;
use crate::server::AppState;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Multipart field carrying the report document.
pub const FILE_FIELD: &str = "file";
/// Multipart field carrying the optional upload date.
pub const DATE_FIELD: &str = "date";
/// Accepted `date` layout.
const UPLOAD_DATE_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]");

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Upload failures, each mapped to one HTTP status.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Missing or wrong API key.
    #[error("unauthorized: {0}")]
    Unauthorized(#[from] AuthError),
    /// Method other than POST.
    #[error("method {0} not allowed")]
    MethodNotAllowed(Method),
    /// Body is not a readable multipart form.
    #[error("invalid multipart form: {0}")]
    InvalidForm(String),
    /// No `file` part with a filename.
    #[error("missing file part")]
    MissingFile,
    /// `date` is not `YYYY-MM-DD`.
    #[error("invalid upload date {0:?}")]
    InvalidDate(String),
    /// File exceeds the upload cap.
    #[error("file exceeds {limit} bytes")]
    TooLarge {
        /// Configured cap in bytes.
        limit: usize,
    },
    /// File part could not be read.
    #[error("failed to read file: {0}")]
    ReadFailed(String),
    /// Document could not be parsed.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    /// Document parsed but held no fund rows.
    #[error("no funds found")]
    NoFunds,
    /// Batch could not be stored.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Stored batch could not be serialized.
    #[error("failed to encode response: {0}")]
    Encode(String),
    /// Request deadline elapsed.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

impl UploadError {
    /// HTTP status for this failure.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::InvalidForm(_) | Self::MissingFile | Self::InvalidDate(_) | Self::NoFunds => {
                StatusCode::BAD_REQUEST
            }
            Self::TooLarge {
                ..
            } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            Self::ReadFailed(_) | Self::Extraction(_) | Self::Store(_) | Self::Encode(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message returned to the caller.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Unauthorized(_) => "Unauthorized".to_string(),
            Self::MethodNotAllowed(_) => "Method not allowed".to_string(),
            Self::InvalidForm(_) => "Invalid request format".to_string(),
            Self::MissingFile => "Invalid file upload".to_string(),
            Self::InvalidDate(_) => "Invalid date format. Please use YYYY-MM-DD".to_string(),
            Self::TooLarge {
                ..
            } => "File too large".to_string(),
            Self::ReadFailed(_) => "Failed to read file".to_string(),
            Self::Extraction(err) => format!("Failed to parse HTML: {err}"),
            Self::NoFunds => "No funds found in the provided HTML".to_string(),
            Self::Store(err) => format!("Failed to store funds in database: {err}"),
            Self::Encode(_) => "Failed to generate response".to_string(),
            Self::Timeout(_) => "Request timed out".to_string(),
        }
    }

    /// Stable label used in logs and audit events.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "unauthorized",
            Self::MethodNotAllowed(_) => "method_not_allowed",
            Self::InvalidForm(_) => "invalid_form",
            Self::MissingFile => "missing_file",
            Self::InvalidDate(_) => "invalid_date",
            Self::TooLarge {
                ..
            } => "too_large",
            Self::ReadFailed(_) => "read_failed",
            Self::Extraction(_) => "parse_failed",
            Self::NoFunds => "no_funds",
            Self::Store(_) => "store_failed",
            Self::Encode(_) => "encode_failed",
            Self::Timeout(_) => "timeout",
        }
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        plain_text(self.status(), &self.public_message())
    }
}

/// Builds a plain-text response terminated by a newline.
pub(crate) fn plain_text(status: StatusCode, message: &str) -> Response {
    (
        status,
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        ],
        format!("{message}\n"),
    )
        .into_response()
}

// ============================================================================
// SECTION: Handler
// ============================================================================

/// Facts gathered while a request runs, for the audit event.
#[derive(Debug, Default)]
struct UploadFacts {
    /// Size of the uploaded file.
    file_bytes: Option<usize>,
    /// Upload date applied to the batch.
    upload_date: Option<String>,
}

/// Handles `/upload` for every method.
pub async fn handle_upload(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let span = tracing::info_span!(
        "upload",
        request_id = %request_id,
        remote_addr = %peer,
        method = %request.method(),
        path = %request.uri().path(),
    );
    async move {
        let mut facts = UploadFacts::default();
        let deadline = state.limits.request_timeout;
        let outcome =
            match tokio::time::timeout(deadline, process_upload(&state, request, &mut facts)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(UploadError::Timeout(deadline)),
            };
        let (response, fund_count, error_kind) = match outcome.and_then(|funds| {
            let count = funds.len();
            json_response(&funds).map(|response| (response, count))
        }) {
            Ok((response, count)) => {
                tracing::info!(fund_count = count, "request completed successfully");
                (response, Some(count), None)
            }
            Err(err) => {
                log_failure(&err);
                let kind = err.kind();
                (err.into_response(), None, Some(kind))
            }
        };
        state.audit.record(&UploadAuditEvent::new(UploadAuditEventParams {
            request_id,
            peer_ip: Some(peer.ip().to_string()),
            status: response.status().as_u16(),
            fund_count,
            file_bytes: facts.file_bytes,
            upload_date: facts.upload_date,
            error_kind,
        }));
        response
    }
    .instrument(span)
    .await
}

/// Runs the upload pipeline up to and including storage.
async fn process_upload(
    state: &AppState,
    request: Request,
    facts: &mut UploadFacts,
) -> Result<Vec<FundSnapshot>, UploadError> {
    state.auth.authorize(request.headers())?;
    if request.method() != Method::POST {
        return Err(UploadError::MethodNotAllowed(request.method().clone()));
    }
    tracing::info!("processing upload request");

    let query = Query::<UploadQuery>::try_from_uri(request.uri())
        .map_err(|rejection| UploadError::InvalidForm(rejection.body_text()))?;
    let multipart = Multipart::from_request(request, &())
        .await
        .map_err(|rejection| UploadError::InvalidForm(rejection.body_text()))?;
    let form = read_upload(multipart, state.limits.max_upload_bytes).await?;
    facts.file_bytes = Some(form.file.len());

    let date = form.date.or(query.0.date);
    let upload_date = resolve_upload_date(date.as_deref())?;
    facts.upload_date = format_timestamp(upload_date).ok();

    let funds = extract(&form.file, upload_date)?;
    if funds.is_empty() {
        return Err(UploadError::NoFunds);
    }
    tracing::debug!(fund_count = funds.len(), "extracted funds");
    store_batch(state, funds).await
}

/// Stores `funds` on the blocking pool, cancelling the batch if this future
/// is dropped before the write finishes.
async fn store_batch(
    state: &AppState,
    funds: Vec<FundSnapshot>,
) -> Result<Vec<FundSnapshot>, UploadError> {
    let cancellation = StoreCancellation::new();
    let _guard = cancellation.cancel_on_drop();
    let store = state.store.clone();
    let stored = tokio::task::spawn_blocking(move || {
        store.store_cancellable(&funds, &cancellation).map(|()| funds)
    })
    .await
    .map_err(|err| StoreError::Store(format!("store task failed: {err}")))??;
    Ok(stored)
}

/// Serializes the stored batch as the success response.
fn json_response(funds: &[FundSnapshot]) -> Result<Response, UploadError> {
    let body = serde_json::to_vec(funds).map_err(|err| UploadError::Encode(err.to_string()))?;
    Ok((StatusCode::OK, [(header::CONTENT_TYPE, "application/json")], body).into_response())
}

/// Logs a failed request at a level matching its status class.
fn log_failure(err: &UploadError) {
    if err.status().is_server_error() {
        tracing::error!(error = %err, kind = err.kind(), "upload failed");
    } else {
        tracing::warn!(error = %err, kind = err.kind(), "upload rejected");
    }
}

// ============================================================================
// SECTION: Form Reading
// ============================================================================

/// Query parameters `/upload` understands.
#[derive(Debug, Deserialize)]
struct UploadQuery {
    /// Upload date used when the form has no `date` part.
    date: Option<String>,
}

/// Parts of the upload form the pipeline uses.
#[derive(Debug)]
struct UploadForm {
    /// Raw report bytes.
    file: Vec<u8>,
    /// Raw `date` text, when sent.
    date: Option<String>,
}

/// Reads the `file` and `date` parts, enforcing the file cap while streaming.
async fn read_upload(mut multipart: Multipart, limit: usize) -> Result<UploadForm, UploadError> {
    let mut file = None;
    let mut date = None;
    while let Some(mut field) =
        multipart.next_field().await.map_err(|err| form_error(&err, limit))?
    {
        let name = field.name().map(str::to_owned);
        let is_file = field.file_name().is_some();
        match name.as_deref() {
            Some(FILE_FIELD) if is_file && file.is_none() => {
                file = Some(read_capped(&mut field, limit).await?);
            }
            Some(DATE_FIELD) if date.is_none() => {
                date = Some(field.text().await.map_err(|err| form_error(&err, limit))?);
            }
            _ => {}
        }
    }
    let file = file.ok_or(UploadError::MissingFile)?;
    Ok(UploadForm {
        file,
        date,
    })
}

/// Reads one field, failing as soon as it exceeds `limit` bytes.
async fn read_capped(field: &mut Field<'_>, limit: usize) -> Result<Vec<u8>, UploadError> {
    let mut buffer = Vec::new();
    while let Some(chunk) = field.chunk().await.map_err(|err| read_error(&err, limit))? {
        if buffer.len().saturating_add(chunk.len()) > limit {
            return Err(UploadError::TooLarge {
                limit,
            });
        }
        buffer.extend_from_slice(&chunk);
    }
    Ok(buffer)
}

/// Maps a multipart framing error.
fn form_error(err: &MultipartError, limit: usize) -> UploadError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        UploadError::TooLarge {
            limit,
        }
    } else {
        UploadError::InvalidForm(err.body_text())
    }
}

/// Maps an error while streaming the file part.
fn read_error(err: &MultipartError, limit: usize) -> UploadError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        UploadError::TooLarge {
            limit,
        }
    } else {
        UploadError::ReadFailed(err.body_text())
    }
}

/// Resolves the batch upload date; absent or empty means now.
///
/// Years carry exactly four unsigned digits.
fn resolve_upload_date(text: Option<&str>) -> Result<OffsetDateTime, UploadError> {
    match text {
        None | Some("") => Ok(OffsetDateTime::now_utc()),
        Some(text) if text.starts_with(['+', '-']) => {
            Err(UploadError::InvalidDate(text.to_string()))
        }
        Some(text) => Date::parse(text, UPLOAD_DATE_FORMAT)
            .ok()
            .filter(|date| has_plain_year(*date))
            .map(date_instant)
            .ok_or_else(|| UploadError::InvalidDate(text.to_string())),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

// fund-ledger-server/src/server.rs
// ============================================================================
// Module: Fund Ledger HTTP Server
// Description: Router, shared state, and serve loop.
// Purpose: Expose upload and health endpoints over the snapshot store.
// Dependencies: axum, fund-ledger-config, fund-ledger-store-sqlite, tokio
// ============================================================================

//! ## Overview
//! [`FundLedgerServer`] is built once from configuration and owns the
//! request-independent state: store handle, authenticator, audit sink, and
//! limits. Handlers receive that state through [`AppState`]; nothing is
//! global.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::any;
use fund_ledger_config::AuditConfig;
use fund_ledger_config::AuditSinkKind;
use fund_ledger_config::FundLedgerConfig;
use fund_ledger_config::ServerConfig;
use fund_ledger_core::SharedSnapshotStore;
use fund_ledger_core::SnapshotStore;
use fund_ledger_store_sqlite::SqliteSnapshotStore;
use thiserror::Error;

use crate::audit::FileUploadAuditSink;
use crate::audit::NoopUploadAuditSink;
use crate::audit::StderrUploadAuditSink;
use crate::audit::UploadAuditSink;
use crate::auth::ApiKeyAuth;
use crate::upload::handle_upload;
use crate::upload::plain_text;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Request body allowance on top of the file cap for multipart framing.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

// ============================================================================
// SECTION: State
// ============================================================================

/// Upload size and time limits.
#[derive(Debug, Clone, Copy)]
pub struct UploadLimits {
    /// Maximum file size in bytes.
    pub max_upload_bytes: usize,
    /// Deadline for a whole upload request.
    pub request_timeout: Duration,
}

impl UploadLimits {
    /// Reads limits from server configuration.
    #[must_use]
    pub const fn from_config(config: &ServerConfig) -> Self {
        Self {
            max_upload_bytes: config.max_upload_bytes,
            request_timeout: config.request_timeout(),
        }
    }
}

/// State shared by every request handler.
pub struct AppState {
    /// Snapshot store.
    pub(crate) store: SharedSnapshotStore,
    /// API key authenticator.
    pub(crate) auth: ApiKeyAuth,
    /// Upload audit sink.
    pub(crate) audit: Arc<dyn UploadAuditSink>,
    /// Upload limits.
    pub(crate) limits: UploadLimits,
}

impl AppState {
    /// Assembles handler state.
    #[must_use]
    pub fn new(
        store: SharedSnapshotStore,
        auth: ApiKeyAuth,
        audit: Arc<dyn UploadAuditSink>,
        limits: UploadLimits,
    ) -> Self {
        Self {
            store,
            auth,
            audit,
            limits,
        }
    }
}

/// Builds the HTTP router.
///
/// `/upload` accepts every method so the API key is checked before the
/// method, matching the status precedence callers rely on.
#[must_use]
pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state.limits.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES);
    Router::new()
        .route("/upload", any(handle_upload))
        .route("/health", any(handle_health))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// Configured upload server.
pub struct FundLedgerServer {
    /// Listen address.
    addr: SocketAddr,
    /// Handler state.
    state: Arc<AppState>,
}

impl FundLedgerServer {
    /// Builds a server backed by the configured `SQLite` store.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when configuration is invalid or the store or
    /// audit sink cannot be opened.
    pub fn from_config(config: &FundLedgerConfig) -> Result<Self, ServerError> {
        config.validate().map_err(|err| ServerError::Config(err.to_string()))?;
        let store = SqliteSnapshotStore::new(&config.store.sqlite_config())
            .map_err(|err| ServerError::Init(err.to_string()))?;
        tracing::info!(path = %config.store.path.display(), "snapshot store ready");
        Self::with_store(config, SharedSnapshotStore::from_store(store))
    }

    /// Builds a server over an existing store.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when configuration is invalid or the audit
    /// sink cannot be opened.
    pub fn with_store(
        config: &FundLedgerConfig,
        store: SharedSnapshotStore,
    ) -> Result<Self, ServerError> {
        let addr = config.server.socket_addr().map_err(|err| ServerError::Config(err.to_string()))?;
        let audit = build_audit_sink(&config.server.audit)?;
        if config.uses_default_api_key() {
            tracing::warn!("using default API key; set API_KEY before exposing this service");
        }
        let state = AppState::new(
            store,
            ApiKeyAuth::new(config.server.api_key.clone()),
            audit,
            UploadLimits::from_config(&config.server),
        );
        Ok(Self {
            addr,
            state: Arc::new(state),
        })
    }

    /// Returns the configured listen address.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Returns the HTTP router for this server.
    #[must_use]
    pub fn router(&self) -> Router {
        build_router(Arc::clone(&self.state))
    }

    /// Serves until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when binding or serving fails.
    pub async fn serve(self) -> Result<(), ServerError> {
        self.serve_with_shutdown(shutdown_signal()).await
    }

    /// Serves until `signal` resolves, then drains in-flight requests.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when binding or serving fails.
    pub async fn serve_with_shutdown(
        self,
        signal: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|err| ServerError::Transport(format!("bind {} failed: {err}", self.addr)))?;
        tracing::info!(addr = %self.addr, "server listening");
        axum::serve(listener, self.router().into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(signal)
            .await
            .map_err(|err| ServerError::Transport(err.to_string()))?;
        tracing::info!("server stopped");
        Ok(())
    }
}

/// Builds the configured audit sink.
fn build_audit_sink(config: &AuditConfig) -> Result<Arc<dyn UploadAuditSink>, ServerError> {
    let sink: Arc<dyn UploadAuditSink> = match (config.sink, config.path.as_deref()) {
        (AuditSinkKind::Stderr, _) => Arc::new(StderrUploadAuditSink),
        (AuditSinkKind::None, _) => Arc::new(NoopUploadAuditSink),
        (AuditSinkKind::File, Some(path)) => Arc::new(
            FileUploadAuditSink::new(Path::new(path))
                .map_err(|err| ServerError::Init(format!("audit log {path}: {err}")))?,
        ),
        (AuditSinkKind::File, None) => {
            return Err(ServerError::Config("audit file sink requires a path".to_string()));
        }
    };
    Ok(sink)
}

/// Resolves on Ctrl-C; never resolves if the handler cannot be installed.
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "ctrl-c handler unavailable; graceful shutdown disabled");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

// ============================================================================
// SECTION: Health
// ============================================================================

/// Handles `/health` by pinging the store.
pub async fn handle_health(State(state): State<Arc<AppState>>) -> Response {
    match with_blocking(|| state.store.ping()) {
        Ok(()) => (StatusCode::OK, "OK\n").into_response(),
        Err(err) => {
            tracing::error!(error = %err, "database health check failed");
            plain_text(StatusCode::SERVICE_UNAVAILABLE, "Database connection failed")
        }
    }
}

/// Runs store work, shifting to a blocking context when the runtime allows.
fn with_blocking<T>(work: impl FnOnce() -> T) -> T {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == tokio::runtime::RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(work)
        }
        _ => work(),
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
    /// Initialization errors.
    #[error("init error: {0}")]
    Init(String),
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
}

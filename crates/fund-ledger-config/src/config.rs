// fund-ledger-config/src/config.rs
// ============================================================================
// Module: Fund Ledger Configuration
// Description: Configuration loading and validation for the upload service.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: fund-ledger-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is layered: built-in defaults, then an optional TOML file,
//! then the deployment environment variables `API_KEY`, `PORT`, and `DB_PATH`.
//! The merged result is validated before use; invalid configuration fails
//! closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::net::IpAddr;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use fund_ledger_store_sqlite::SqliteStoreConfig;
use fund_ledger_store_sqlite::SqliteStoreMode;
use fund_ledger_store_sqlite::SqliteSyncMode;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename, read only when present.
const DEFAULT_CONFIG_NAME: &str = "fund-ledger.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "FUND_LEDGER_CONFIG";
/// Environment variable overriding `server.api_key`.
pub const API_KEY_ENV_VAR: &str = "API_KEY";
/// Environment variable overriding `server.port`.
pub const PORT_ENV_VAR: &str = "PORT";
/// Environment variable overriding `store.path`.
pub const DB_PATH_ENV_VAR: &str = "DB_PATH";
/// Placeholder API key used when none is configured.
pub const DEFAULT_API_KEY: &str = "your-secret-api-key";
/// Config files larger than this are refused unread.
const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Longest accepted path component in bytes.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Longest accepted path in bytes.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum length of the API key.
const MAX_API_KEY_LENGTH: usize = 256;
/// Upper bound on the upload size cap.
const MAX_UPLOAD_BYTES_LIMIT: usize = 64 * 1024 * 1024;
/// Minimum request timeout in milliseconds.
const MIN_REQUEST_TIMEOUT_MS: u64 = 100;
/// Maximum request timeout in milliseconds.
const MAX_REQUEST_TIMEOUT_MS: u64 = 300_000;

// ============================================================================
// SECTION: Config Model
// ============================================================================

/// Top-level service configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FundLedgerConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Snapshot store configuration.
    #[serde(default)]
    pub store: StoreConfig,
}

impl FundLedgerConfig {
    /// Loads configuration using the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, |key| env::var(key).ok())
    }

    /// Loads configuration with an explicit environment lookup.
    ///
    /// An explicit `path` (or `FUND_LEDGER_CONFIG`) must exist. Without
    /// either, `fund-ledger.toml` is read when present and defaults apply
    /// otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load_with_env(
        path: Option<&Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = match resolve_path(path, &lookup)? {
            Some(resolved) => Self::from_file(&resolved)?,
            None => Self::default(),
        };
        config.apply_env(&lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses a config file without applying overrides.
    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        check_path("config path", path)?;
        let bytes = fs::read(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid(format!(
                "{} is larger than {MAX_CONFIG_FILE_SIZE} bytes",
                path.display()
            )));
        }
        let content = String::from_utf8(bytes).map_err(|_| {
            ConfigError::Invalid(format!("{} is not valid utf-8", path.display()))
        })?;
        toml::from_str(&content).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Applies `API_KEY`, `PORT`, and `DB_PATH` overrides.
    fn apply_env(&mut self, lookup: &impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(api_key) = lookup(API_KEY_ENV_VAR).filter(|value| !value.is_empty()) {
            self.server.api_key = api_key;
        }
        if let Some(port) = lookup(PORT_ENV_VAR).filter(|value| !value.is_empty()) {
            self.server.port = port.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("{PORT_ENV_VAR} must be a port number, got {port:?}"))
            })?;
        }
        if let Some(db_path) = lookup(DB_PATH_ENV_VAR).filter(|value| !value.is_empty()) {
            self.store.path = PathBuf::from(db_path);
        }
        Ok(())
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.store.validate()
    }

    /// Returns true when the API key is still the placeholder.
    #[must_use]
    pub fn uses_default_api_key(&self) -> bool {
        self.server.api_key == DEFAULT_API_KEY
    }
}

// ============================================================================
// SECTION: Server Config
// ============================================================================

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Bind address (IP literal).
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Listen port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Shared secret expected in `X-API-Key`.
    #[serde(default = "default_api_key")]
    pub api_key: String,
    /// Maximum accepted size of the uploaded file in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    /// Deadline for a whole upload request in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Upload audit configuration.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            api_key: default_api_key(),
            max_upload_bytes: default_max_upload_bytes(),
            request_timeout_ms: default_request_timeout_ms(),
            audit: AuditConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Validates server configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        self.bind_ip()?;
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::Invalid("server.api_key must be non-empty".to_string()));
        }
        if self.api_key.len() > MAX_API_KEY_LENGTH {
            return Err(ConfigError::Invalid("server.api_key exceeds max length".to_string()));
        }
        if self.max_upload_bytes == 0 {
            return Err(ConfigError::Invalid(
                "server.max_upload_bytes must be greater than zero".to_string(),
            ));
        }
        if self.max_upload_bytes > MAX_UPLOAD_BYTES_LIMIT {
            return Err(ConfigError::Invalid("server.max_upload_bytes exceeds limit".to_string()));
        }
        if !(MIN_REQUEST_TIMEOUT_MS..=MAX_REQUEST_TIMEOUT_MS).contains(&self.request_timeout_ms) {
            return Err(ConfigError::Invalid(
                "server.request_timeout_ms out of range".to_string(),
            ));
        }
        self.audit.validate()
    }

    /// Parses the bind address.
    fn bind_ip(&self) -> Result<IpAddr, ConfigError> {
        self.bind.trim().parse().map_err(|_| {
            ConfigError::Invalid(format!("server.bind must be an IP address, got {:?}", self.bind))
        })
    }

    /// Returns the socket address to listen on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when `bind` is not an IP address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        Ok(SocketAddr::new(self.bind_ip()?, self.port))
    }

    /// Returns the request deadline.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Upload audit sink selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkKind {
    /// JSON lines on stderr.
    #[default]
    Stderr,
    /// JSON lines appended to `server.audit.path`.
    File,
    /// Audit disabled.
    None,
}

/// Upload audit configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Where audit events go.
    #[serde(default)]
    pub sink: AuditSinkKind,
    /// Audit log path for the file sink.
    #[serde(default)]
    pub path: Option<String>,
}

impl AuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (AuditSinkKind::File, None) => {
                Err(ConfigError::Invalid("server.audit.path is required for the file sink".to_string()))
            }
            (AuditSinkKind::File, Some(path)) => check_path("server.audit.path", Path::new(path)),
            (AuditSinkKind::Stderr | AuditSinkKind::None, Some(_)) => Err(ConfigError::Invalid(
                "server.audit.path is only valid for the file sink".to_string(),
            )),
            (AuditSinkKind::Stderr | AuditSinkKind::None, None) => Ok(()),
        }
    }
}

// ============================================================================
// SECTION: Store Config
// ============================================================================

/// Snapshot store configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// `SQLite` database path.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_store_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            busy_timeout_ms: default_store_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

impl StoreConfig {
    /// Validates store configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        check_path("store.path", &self.path)
    }

    /// Builds the `SQLite` store configuration.
    #[must_use]
    pub fn sqlite_config(&self) -> SqliteStoreConfig {
        SqliteStoreConfig {
            path: self.path.clone(),
            busy_timeout_ms: self.busy_timeout_ms,
            journal_mode: self.journal_mode,
            sync_mode: self.sync_mode,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Why configuration could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// A value failed validation.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI, environment, or the optional default.
fn resolve_path(
    path: Option<&Path>,
    lookup: &impl Fn(&str) -> Option<String>,
) -> Result<Option<PathBuf>, ConfigError> {
    if let Some(path) = path {
        return Ok(Some(path.to_path_buf()));
    }
    if let Some(env_path) = lookup(CONFIG_ENV_VAR).filter(|value| !value.is_empty()) {
        return Ok(Some(PathBuf::from(env_path)));
    }
    let fallback = PathBuf::from(DEFAULT_CONFIG_NAME);
    Ok(fallback.is_file().then_some(fallback))
}

/// Checks a configured path: non-blank, bounded total and per-component length.
fn check_path(field: &str, path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    let reason = if text.trim().is_empty() {
        "must be non-empty"
    } else if text.len() > MAX_TOTAL_PATH_LENGTH {
        "is longer than 4096 bytes"
    } else if path.components().any(|part| part.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH) {
        "has a component longer than 255 bytes"
    } else {
        return Ok(());
    };
    Err(ConfigError::Invalid(format!("{field} {reason}")))
}

/// Default bind address (all interfaces).
fn default_bind() -> String {
    "0.0.0.0".to_string()
}

/// Default listen port.
const fn default_port() -> u16 {
    8089
}

/// Default API key placeholder.
fn default_api_key() -> String {
    DEFAULT_API_KEY.to_string()
}

/// Default upload cap (512 KiB).
const fn default_max_upload_bytes() -> usize {
    512 * 1024
}

/// Default request deadline (15 s).
const fn default_request_timeout_ms() -> u64 {
    15_000
}

/// Default database path.
fn default_store_path() -> PathBuf {
    PathBuf::from("./funds.db")
}

/// Default busy timeout for `SQLite` connections.
const fn default_store_busy_timeout_ms() -> u64 {
    5_000
}

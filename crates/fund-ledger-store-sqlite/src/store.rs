// fund-ledger-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Snapshot Store
// Description: Durable SnapshotStore backed by SQLite WAL.
// Purpose: Append fund snapshots in all-or-nothing batches.
// Dependencies: fund-ledger-core, rusqlite, serde, thiserror, time
// ============================================================================

//! ## Overview
//! This module implements a durable [`SnapshotStore`] using `SQLite`. The
//! `funds` table is append-only: rows are inserted, never updated. Calendar
//! dates and upload dates are stored as RFC 3339 text and absent metrics as
//! `NULL`.
//!
//! Writers are serialized by `SQLite` itself (WAL journal plus busy timeout).
//! The store keeps one long-lived connection; the mutex around it only makes
//! the non-`Sync` connection handle shareable.
//!
//! `(name, upload_date)` is indexed but not unique. Re-uploading a report
//! appends a second copy of each row.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;

use fund_ledger_core::FundSnapshot;
use fund_ledger_core::SnapshotStore;
use fund_ledger_core::StoreCancellation;
use fund_ledger_core::StoreError;
use fund_ledger_core::date_instant;
use fund_ledger_core::format_timestamp;
use fund_ledger_core::parse_timestamp;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;
use time::Date;
use time::OffsetDateTime;
use time::UtcOffset;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Version recorded in `ledger_meta`.
const SCHEMA_VERSION: i64 = 1;
/// Milliseconds a writer waits on a locked database.
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Longest accepted path component in bytes.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Longest accepted database path in bytes.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

/// Insert statement for one snapshot.
const INSERT_SNAPSHOT_SQL: &str = "INSERT INTO funds (name, launch_date, validity_date, \
                                   repurchase, offer, nav, mtd, fytd, cytd, fy24, fy23, \
                                   since_inception, upload_date) VALUES (?1, ?2, ?3, ?4, ?5, ?6, \
                                   ?7, ?8, ?9, ?10, ?11, ?12, ?13)";
/// Column list used by read queries, in [`decode_row`] order.
const SELECT_SNAPSHOT_COLUMNS: &str = "id, name, launch_date, validity_date, repurchase, offer, \
                                       nav, mtd, fytd, cytd, fy24, fy23, since_inception, \
                                       upload_date";

// ============================================================================
// SECTION: Config
// ============================================================================

/// Journal mode applied when the database is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// Write-ahead log; readers never block the writer.
    #[default]
    Wal,
    /// Rollback journal deleted after each commit.
    Delete,
}

impl SqliteStoreMode {
    /// Value for `PRAGMA journal_mode`.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// How hard `SQLite` syncs to disk on commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Sync on every commit.
    #[default]
    Full,
    /// Sync at WAL checkpoints only.
    Normal,
}

impl SqliteSyncMode {
    /// Value for `PRAGMA synchronous`.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Where the ledger database lives and how it is tuned.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Database file; parent directories are created on open.
    pub path: PathBuf,
    /// Lock wait before a write fails with `SQLITE_BUSY`.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// Journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// Commit durability.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Builds a config for `path` with default tuning.
    #[must_use]
    pub fn for_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Serde default for `busy_timeout_ms`.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Failures opening, writing, or reading the ledger database.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Filesystem failure around the database file.
    #[error("ledger db io error: {0}")]
    Io(String),
    /// Engine failure outside a specific row insert.
    #[error("ledger db error: {0}")]
    Db(String),
    /// Stored row could not be decoded.
    #[error("ledger db corrupt row: {0}")]
    Corrupt(String),
    /// Database was created by another schema version.
    #[error("ledger db schema mismatch: {0}")]
    VersionMismatch(String),
    /// Rejected path or value.
    #[error("ledger db invalid input: {0}")]
    Invalid(String),
    /// The batch was cancelled and rolled back.
    #[error("ledger db batch cancelled before commit")]
    Cancelled,
    /// Insert of one snapshot failed; the batch was rolled back.
    #[error("failed to insert fund '{name}': {message}")]
    Insert {
        /// Name of the offending snapshot.
        name: String,
        /// `SQLite` error message.
        message: String,
    },
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Store(message),
            SqliteStoreError::Corrupt(message) => Self::Store(format!("corrupt row: {message}")),
            SqliteStoreError::VersionMismatch(message) => {
                Self::Store(format!("version mismatch: {message}"))
            }
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
            SqliteStoreError::Cancelled => Self::Cancelled,
            SqliteStoreError::Insert {
                name,
                message,
            } => Self::Insert {
                name,
                message,
            },
        }
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// A persisted snapshot with its surrogate row id.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSnapshot {
    /// Auto-increment row identifier.
    pub id: i64,
    /// Persisted snapshot.
    pub snapshot: FundSnapshot,
}

/// Append-only snapshot ledger in one `SQLite` file.
#[derive(Clone)]
pub struct SqliteSnapshotStore {
    /// The single connection every caller shares.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteSnapshotStore {
    /// Opens (or creates) the ledger at `config.path`.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] for a rejected path, an unreadable file,
    /// or a schema from another version.
    pub fn new(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        create_parent_dir(&config.path)?;
        let mut connection = open_connection(config)?;
        prepare_schema(&mut connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Returns the number of persisted snapshots.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the query fails.
    pub fn count(&self) -> Result<u64, SqliteStoreError> {
        let guard = self.lock()?;
        let count: i64 = guard
            .query_row("SELECT COUNT(*) FROM funds", params![], |row| row.get(0))
            .map_err(db_error)?;
        drop(guard);
        u64::try_from(count)
            .map_err(|_| SqliteStoreError::Corrupt("negative snapshot count".to_string()))
    }

    /// Loads every snapshot recorded for a fund, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the query fails or a row is corrupt.
    pub fn load_by_name(&self, name: &str) -> Result<Vec<StoredSnapshot>, SqliteStoreError> {
        let sql = format!("SELECT {SELECT_SNAPSHOT_COLUMNS} FROM funds WHERE name = ?1 ORDER BY id");
        self.load_where(&sql, name)
    }

    /// Loads every snapshot recorded for an upload date, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the query fails or a row is corrupt.
    pub fn load_by_upload_date(
        &self,
        upload_date: OffsetDateTime,
    ) -> Result<Vec<StoredSnapshot>, SqliteStoreError> {
        let key = encode_timestamp(upload_date)?;
        let sql = format!(
            "SELECT {SELECT_SNAPSHOT_COLUMNS} FROM funds WHERE upload_date = ?1 ORDER BY id"
        );
        self.load_where(&sql, &key)
    }

    /// Runs a single-parameter read query and decodes the rows.
    fn load_where(&self, sql: &str, key: &str) -> Result<Vec<StoredSnapshot>, SqliteStoreError> {
        let guard = self.lock()?;
        let mut statement =
            guard.prepare(sql).map_err(db_error)?;
        let rows = statement
            .query_map(params![key], read_raw_row)
            .map_err(db_error)?;
        let mut raw = Vec::new();
        for row in rows {
            raw.push(row.map_err(db_error)?);
        }
        drop(statement);
        drop(guard);
        raw.into_iter().map(decode_row).collect()
    }

    /// Inserts a batch of snapshots in one transaction.
    ///
    /// `cancellation` is checked before each insert and before commit; a
    /// fired flag drops the transaction, which rolls it back.
    fn insert_batch(
        &self,
        snapshots: &[FundSnapshot],
        cancellation: &StoreCancellation,
    ) -> Result<(), SqliteStoreError> {
        let rows = snapshots
            .iter()
            .map(|snapshot| {
                EncodedSnapshot::encode(snapshot).map_err(|err| SqliteStoreError::Insert {
                    name: snapshot.name.clone(),
                    message: err.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(db_error)?;
        {
            let mut statement = tx.prepare(INSERT_SNAPSHOT_SQL).map_err(db_error)?;
            for row in &rows {
                if cancellation.is_cancelled() {
                    return Err(SqliteStoreError::Cancelled);
                }
                statement
                    .execute(params![
                        row.name,
                        row.launch_date,
                        row.validity_date,
                        row.metrics[0],
                        row.metrics[1],
                        row.metrics[2],
                        row.metrics[3],
                        row.metrics[4],
                        row.metrics[5],
                        row.metrics[6],
                        row.metrics[7],
                        row.metrics[8],
                        row.upload_date,
                    ])
                    .map_err(|err| SqliteStoreError::Insert {
                        name: row.name.to_string(),
                        message: err.to_string(),
                    })?;
            }
        }
        if cancellation.is_cancelled() {
            return Err(SqliteStoreError::Cancelled);
        }
        tx.commit().map_err(db_error)?;
        drop(guard);
        Ok(())
    }

    /// Runs a trivial query to prove the connection is usable.
    fn ping_connection(&self) -> Result<(), SqliteStoreError> {
        let guard = self.lock()?;
        guard
            .query_row("SELECT 1", params![], |row| row.get::<_, i64>(0))
            .map_err(db_error)?;
        drop(guard);
        Ok(())
    }

    /// Locks the connection handle.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection.lock().map_err(|_| SqliteStoreError::Db("mutex poisoned".to_string()))
    }
}

impl SnapshotStore for SqliteSnapshotStore {
    fn store(&self, snapshots: &[FundSnapshot]) -> Result<(), StoreError> {
        self.insert_batch(snapshots, &StoreCancellation::new()).map_err(StoreError::from)
    }

    fn store_cancellable(
        &self,
        snapshots: &[FundSnapshot],
        cancellation: &StoreCancellation,
    ) -> Result<(), StoreError> {
        self.insert_batch(snapshots, cancellation).map_err(StoreError::from)
    }

    fn ping(&self) -> Result<(), StoreError> {
        self.ping_connection().map_err(StoreError::from)
    }
}

// ============================================================================
// SECTION: Row Encoding
// ============================================================================

/// Column values for one snapshot insert.
struct EncodedSnapshot<'a> {
    /// Fund name.
    name: &'a str,
    /// Launch date timestamp text.
    launch_date: Option<String>,
    /// Validity date timestamp text.
    validity_date: Option<String>,
    /// Metric columns in table order.
    metrics: [Option<f64>; 9],
    /// Upload date timestamp text.
    upload_date: String,
}

impl<'a> EncodedSnapshot<'a> {
    /// Encodes a snapshot's dates; fails on years RFC 3339 cannot express.
    fn encode(snapshot: &'a FundSnapshot) -> Result<Self, SqliteStoreError> {
        let encode_date = |date: Option<Date>| date.map(date_instant).map(encode_timestamp).transpose();
        Ok(Self {
            name: &snapshot.name,
            launch_date: encode_date(snapshot.launch_date)?,
            validity_date: encode_date(snapshot.validity_date)?,
            metrics: [
                snapshot.repurchase,
                snapshot.offer,
                snapshot.nav,
                snapshot.mtd,
                snapshot.fytd,
                snapshot.cytd,
                snapshot.fy24,
                snapshot.fy23,
                snapshot.since_inception,
            ],
            upload_date: encode_timestamp(snapshot.upload_date)?,
        })
    }
}

/// Raw column values as read from `SQLite`.
struct RawRow {
    /// Row identifier.
    id: i64,
    /// Fund name.
    name: String,
    /// Launch date text.
    launch_date: Option<String>,
    /// Validity date text.
    validity_date: Option<String>,
    /// Metric columns in table order.
    metrics: [Option<f64>; 9],
    /// Upload date text.
    upload_date: String,
}

/// Reads one row in [`SELECT_SNAPSHOT_COLUMNS`] order.
fn read_raw_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        id: row.get(0)?,
        name: row.get(1)?,
        launch_date: row.get(2)?,
        validity_date: row.get(3)?,
        metrics: [
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
            row.get(7)?,
            row.get(8)?,
            row.get(9)?,
            row.get(10)?,
            row.get(11)?,
            row.get(12)?,
        ],
        upload_date: row.get(13)?,
    })
}

/// Decodes raw column text into a snapshot.
fn decode_row(raw: RawRow) -> Result<StoredSnapshot, SqliteStoreError> {
    let decode_date = |text: Option<String>| {
        text.map(|text| decode_timestamp(raw.id, &text).map(|value| value.date())).transpose()
    };
    let [repurchase, offer, nav, mtd, fytd, cytd, fy24, fy23, since_inception] = raw.metrics;
    Ok(StoredSnapshot {
        id: raw.id,
        snapshot: FundSnapshot {
            name: raw.name,
            launch_date: decode_date(raw.launch_date)?,
            validity_date: decode_date(raw.validity_date)?,
            repurchase,
            offer,
            nav,
            mtd,
            fytd,
            cytd,
            fy24,
            fy23,
            since_inception,
            upload_date: decode_timestamp(raw.id, &raw.upload_date)?,
        },
    })
}

/// Formats a timestamp for storage.
fn encode_timestamp(value: OffsetDateTime) -> Result<String, SqliteStoreError> {
    format_timestamp(value).map_err(|err| SqliteStoreError::Invalid(err.to_string()))
}

/// Parses stored timestamp text, normalized to UTC.
fn decode_timestamp(id: i64, text: &str) -> Result<OffsetDateTime, SqliteStoreError> {
    parse_timestamp(text)
        .map(|value| value.to_offset(UtcOffset::UTC))
        .map_err(|err| SqliteStoreError::Corrupt(format!("row {id}: bad timestamp {text:?}: {err}")))
}

// ============================================================================
// SECTION: Opening
// ============================================================================

/// Wraps an engine error.
#[allow(clippy::needless_pass_by_value, reason = "Used directly as a map_err adapter.")]
fn db_error(err: rusqlite::Error) -> SqliteStoreError {
    SqliteStoreError::Db(err.to_string())
}

/// Rejects paths that are blank, too long, or name a directory.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    let text = path.to_string_lossy();
    let problem = if text.trim().is_empty() {
        Some("database path is blank")
    } else if text.len() > MAX_TOTAL_PATH_LENGTH {
        Some("database path is too long")
    } else if path
        .components()
        .any(|part| part.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH)
    {
        Some("database path has a component longer than 255 bytes")
    } else if path.is_dir() {
        Some("database path names a directory")
    } else {
        None
    };
    problem.map_or(Ok(()), |message| Err(SqliteStoreError::Invalid(message.to_string())))
}

/// Creates the directory that will hold the database file.
fn create_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)
            .map_err(|err| {
                SqliteStoreError::Io(format!("cannot create {}: {err}", parent.display()))
            }),
        _ => Ok(()),
    }
}

/// Opens the database and applies journal, sync, and busy settings.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let connection = Connection::open_with_flags(
        &config.path,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
    )
    .map_err(db_error)?;
    let pragmas = format!(
        "PRAGMA journal_mode = {journal}; PRAGMA synchronous = {sync};",
        journal = config.journal_mode.pragma_value(),
        sync = config.sync_mode.pragma_value(),
    );
    connection.execute_batch(&pragmas).map_err(db_error)?;
    connection.busy_timeout(Duration::from_millis(config.busy_timeout_ms)).map_err(db_error)?;
    Ok(connection)
}

// ============================================================================
// SECTION: Schema
// ============================================================================

/// Table holding the single schema version row.
const META_SCHEMA_SQL: &str =
    "CREATE TABLE IF NOT EXISTS ledger_meta (schema_version INTEGER NOT NULL);";

/// Snapshot table and its lookup indexes.
const FUNDS_SCHEMA_SQL: &str = "
    CREATE TABLE IF NOT EXISTS funds (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL CHECK (length(name) > 0),
        launch_date TEXT,
        validity_date TEXT,
        repurchase REAL,
        offer REAL,
        nav REAL,
        mtd REAL,
        fytd REAL,
        cytd REAL,
        fy24 REAL,
        fy23 REAL,
        since_inception REAL,
        upload_date TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_fund_name ON funds (name);
    CREATE INDEX IF NOT EXISTS idx_upload_date ON funds (upload_date);";

/// Creates the schema on first open; refuses databases from other versions.
fn prepare_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(db_error)?;
    tx.execute_batch(META_SCHEMA_SQL).map_err(db_error)?;
    let recorded: Option<i64> = tx
        .query_row("SELECT schema_version FROM ledger_meta", params![], |row| row.get(0))
        .optional()
        .map_err(db_error)?;
    match recorded {
        Some(SCHEMA_VERSION) => {}
        Some(other) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "database has schema {other}, expected {SCHEMA_VERSION}"
            )));
        }
        None => {
            tx.execute("INSERT INTO ledger_meta (schema_version) VALUES (?1)", params![
                SCHEMA_VERSION
            ])
            .map_err(db_error)?;
            tx.execute_batch(FUNDS_SCHEMA_SQL).map_err(db_error)?;
        }
    }
    tx.commit().map_err(db_error)
}

// fund-ledger-core/src/interfaces/mod.rs
// ============================================================================
// Module: Fund Ledger Interfaces
// Description: Backend-agnostic persistence contract for fund snapshots.
// Purpose: Define the storage surface used by the ingestion endpoint.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! Stores append snapshots; they never update or delete them. A `store` call
//! is all-or-nothing: either the whole batch becomes visible or none of it
//! does. Write serialization is the backend's job.
//!
//! Callers that may give up on a write (client disconnect, deadline) pass a
//! [`StoreCancellation`]. Backends check it while the batch is in flight and
//! roll back instead of committing once it fires.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use thiserror::Error;

use crate::core::FundSnapshot;

// ============================================================================
// SECTION: Snapshot Store
// ============================================================================

/// Snapshot store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store I/O error.
    #[error("snapshot store io error: {0}")]
    Io(String),
    /// Store data is invalid.
    #[error("snapshot store invalid data: {0}")]
    Invalid(String),
    /// A single snapshot insert failed; the batch was rolled back.
    #[error("failed to insert fund '{name}': {message}")]
    Insert {
        /// Name of the offending snapshot.
        name: String,
        /// Backend error message.
        message: String,
    },
    /// Store reported an error.
    #[error("snapshot store error: {0}")]
    Store(String),
    /// The caller cancelled the batch before it committed.
    #[error("snapshot batch cancelled before commit")]
    Cancelled,
}

// ============================================================================
// SECTION: Cancellation
// ============================================================================

/// Shared flag telling a store to abandon an in-flight batch.
#[derive(Debug, Clone, Default)]
pub struct StoreCancellation {
    /// Set once; never cleared.
    cancelled: Arc<AtomicBool>,
}

impl StoreCancellation {
    /// Creates a flag that has not fired.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires the flag.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Returns true once [`StoreCancellation::cancel`] has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Returns a guard that fires this flag when dropped.
    #[must_use]
    pub fn cancel_on_drop(&self) -> CancelOnDrop {
        CancelOnDrop {
            cancellation: self.clone(),
        }
    }
}

/// Fires its [`StoreCancellation`] on drop, e.g. when a request future is
/// dropped mid-write.
#[derive(Debug)]
pub struct CancelOnDrop {
    /// Flag to fire.
    cancellation: StoreCancellation,
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.cancellation.cancel();
    }
}

/// Append-only persistence for fund snapshots.
pub trait SnapshotStore {
    /// Persists a batch of snapshots atomically.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when any snapshot fails to persist; no snapshot
    /// from the batch is visible afterwards.
    fn store(&self, snapshots: &[FundSnapshot]) -> Result<(), StoreError>;

    /// Persists a batch unless `cancellation` fires before it commits.
    ///
    /// The default checks the flag once up front; backends with real
    /// transactions should also check it between writes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Cancelled`] when the flag fired first, otherwise
    /// as [`SnapshotStore::store`].
    fn store_cancellable(
        &self,
        snapshots: &[FundSnapshot],
        cancellation: &StoreCancellation,
    ) -> Result<(), StoreError> {
        if cancellation.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        self.store(snapshots)
    }

    /// Checks that the backend is reachable.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend cannot answer.
    fn ping(&self) -> Result<(), StoreError>;
}

// fund-ledger-core/src/runtime/store.rs
// ============================================================================
// Module: Fund Ledger In-Memory Store
// Description: In-memory snapshot store and shared store wrapper.
// Purpose: Provide a deterministic store for tests plus an Arc-backed handle.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! [`InMemorySnapshotStore`] mirrors the durable backend's acceptance rules
//! (non-empty names, all-or-nothing batches) without any I/O. It is meant for
//! tests and local demos, not production. [`SharedSnapshotStore`] is the
//! clonable handle servers hold.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;

use crate::core::FundSnapshot;
use crate::interfaces::SnapshotStore;
use crate::interfaces::StoreCancellation;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// In-memory snapshot store for tests and local demos.
#[derive(Debug, Default, Clone)]
pub struct InMemorySnapshotStore {
    /// Appended snapshots in insertion order.
    snapshots: Arc<Mutex<Vec<FundSnapshot>>>,
}

impl InMemorySnapshotStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every stored snapshot in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Store`] when the store mutex is poisoned.
    pub fn snapshots(&self) -> Result<Vec<FundSnapshot>, StoreError> {
        let guard = self
            .snapshots
            .lock()
            .map_err(|_| StoreError::Store("snapshot store mutex poisoned".to_string()))?;
        Ok(guard.clone())
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn store(&self, snapshots: &[FundSnapshot]) -> Result<(), StoreError> {
        if let Some(invalid) = snapshots.iter().find(|snapshot| snapshot.name.is_empty()) {
            return Err(StoreError::Insert {
                name: invalid.name.clone(),
                message: "fund name must be non-empty".to_string(),
            });
        }
        self.snapshots
            .lock()
            .map_err(|_| StoreError::Store("snapshot store mutex poisoned".to_string()))?
            .extend_from_slice(snapshots);
        Ok(())
    }

    fn ping(&self) -> Result<(), StoreError> {
        self.snapshots
            .lock()
            .map(|_| ())
            .map_err(|_| StoreError::Store("snapshot store mutex poisoned".to_string()))
    }
}

// ============================================================================
// SECTION: Shared Store Wrapper
// ============================================================================

/// Shared snapshot store backed by an `Arc` trait object.
#[derive(Clone)]
pub struct SharedSnapshotStore {
    /// Inner store implementation.
    inner: Arc<dyn SnapshotStore + Send + Sync>,
}

impl SharedSnapshotStore {
    /// Wraps a snapshot store in a shared, clonable wrapper.
    #[must_use]
    pub fn from_store(store: impl SnapshotStore + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(store),
        }
    }

    /// Wraps an existing shared store.
    #[must_use]
    pub const fn new(store: Arc<dyn SnapshotStore + Send + Sync>) -> Self {
        Self {
            inner: store,
        }
    }
}

impl SnapshotStore for SharedSnapshotStore {
    fn store(&self, snapshots: &[FundSnapshot]) -> Result<(), StoreError> {
        self.inner.store(snapshots)
    }

    fn store_cancellable(
        &self,
        snapshots: &[FundSnapshot],
        cancellation: &StoreCancellation,
    ) -> Result<(), StoreError> {
        self.inner.store_cancellable(snapshots, cancellation)
    }

    fn ping(&self) -> Result<(), StoreError> {
        self.inner.ping()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions use unwrap for clarity."
    )]

    use time::macros::datetime;

    use super::InMemorySnapshotStore;
    use super::SharedSnapshotStore;
    use crate::core::FundSnapshot;
    use crate::interfaces::SnapshotStore;
    use crate::interfaces::StoreCancellation;
    use crate::interfaces::StoreError;

    fn named(name: &str) -> FundSnapshot {
        FundSnapshot {
            name: name.to_string(),
            launch_date: None,
            validity_date: None,
            repurchase: None,
            offer: None,
            nav: None,
            mtd: None,
            fytd: None,
            cytd: None,
            fy24: None,
            fy23: None,
            since_inception: None,
            upload_date: datetime!(2024-03-01 0:00 UTC),
        }
    }

    #[test]
    fn rejected_batch_leaves_store_untouched() {
        let store = InMemorySnapshotStore::new();
        store.store(&[named("Alpha")]).unwrap();
        let err = store.store(&[named("Beta"), named("")]).unwrap_err();
        assert!(matches!(err, StoreError::Insert { .. }));
        assert_eq!(store.snapshots().unwrap().len(), 1);
    }

    #[test]
    fn cancelled_batch_is_not_stored() {
        let store = SharedSnapshotStore::from_store(InMemorySnapshotStore::new());
        let cancellation = StoreCancellation::new();
        drop(cancellation.cancel_on_drop());
        let err = store.store_cancellable(&[named("Alpha")], &cancellation).unwrap_err();
        assert!(matches!(err, StoreError::Cancelled));
    }

    #[test]
    fn shared_wrapper_delegates_to_inner_store() {
        let inner = InMemorySnapshotStore::new();
        let shared = SharedSnapshotStore::from_store(inner.clone());
        shared.store(&[named("Alpha"), named("Alpha")]).unwrap();
        shared.ping().unwrap();
        assert_eq!(inner.snapshots().unwrap().len(), 2);
    }
}

use recovery_core::{AssetKey, RestoreKind, RestoreRecord, SnapshotEpoch};

use crate::Result;

/// Mutual exclusion for exports of the same snapshot.
pub trait ExportLock: Send + Sync {
    /// # Errors
    ///
    /// Returns `OperationError::ExportLocked` if another export of the same
    /// snapshot holds the lock.
    fn acquire(&self, asset: &AssetKey, snapshot: SnapshotEpoch) -> Result<()>;

    /// # Errors
    ///
    /// Returns an error if the lock cannot be released.
    fn release(&self, asset: &AssetKey, snapshot: SnapshotEpoch) -> Result<()>;
}

/// Persistent list of restores that exist on the appliance.
pub trait RestoreStore: Send + Sync {
    /// # Errors
    ///
    /// Returns `OperationError::RestoreExists` if a record for the same
    /// asset, snapshot and kind exists, or an error if the store cannot be
    /// written.
    fn add(&self, record: &RestoreRecord) -> Result<()>;

    /// Remove a record, returning whether it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn remove(&self, asset: &AssetKey, snapshot: SnapshotEpoch, kind: RestoreKind)
    -> Result<bool>;

    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn list(&self) -> Result<Vec<RestoreRecord>>;
}

/// User-triggered cancellation of a running export.
pub trait CancellationMarker: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the marker cannot be created.
    fn request_cancel(&self, asset: &AssetKey, snapshot: SnapshotEpoch) -> Result<()>;

    fn is_cancel_requested(&self, asset: &AssetKey, snapshot: SnapshotEpoch) -> bool;

    /// # Errors
    ///
    /// Returns an error if an existing marker cannot be removed.
    fn clear(&self, asset: &AssetKey, snapshot: SnapshotEpoch) -> Result<()>;
}

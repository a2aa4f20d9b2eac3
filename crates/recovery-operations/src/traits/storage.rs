use recovery_core::{CloneHandle, CloneSpec, SnapshotEpoch};

use crate::Result;

/// Copy-on-write storage pool holding asset datasets and their snapshots.
pub trait StorageManager: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the snapshot does not exist or the clone cannot be
    /// created.
    fn create_clone(&self, spec: &CloneSpec) -> Result<CloneHandle>;

    /// # Errors
    ///
    /// Returns an error if the clone cannot be destroyed.
    fn destroy_clone(&self, clone: &CloneHandle) -> Result<()>;

    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be taken.
    fn take_snapshot(&self, dataset: &str) -> Result<SnapshotEpoch>;

    /// Hide files matching `patterns` inside the clone, returning how many
    /// were hidden.
    ///
    /// # Errors
    ///
    /// Returns an error if the clone's filesystem cannot be modified.
    fn hide_files(&self, clone: &CloneHandle, patterns: &[String]) -> Result<usize>;
}

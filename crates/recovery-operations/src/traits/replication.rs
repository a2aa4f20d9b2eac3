use recovery_core::AssetKey;

use crate::Result;

/// Offsite replication daemon.
pub trait ReplicationClient: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the daemon rejects the registration.
    fn register(&self, asset: &AssetKey, dataset: &str) -> Result<()>;

    /// # Errors
    ///
    /// Returns an error if the daemon cannot be reached.
    fn deregister(&self, asset: &AssetKey) -> Result<()>;
}

/// Pushes auxiliary asset metadata to remote consumers.
pub trait MetadataPublisher: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the metadata could not be delivered.
    fn publish(&self, asset: &AssetKey) -> Result<()>;
}

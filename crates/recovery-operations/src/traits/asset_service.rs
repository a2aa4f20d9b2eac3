use chrono::{DateTime, Utc};
use recovery_core::{AssetKey, SnapshotEpoch};

use crate::Result;

/// Everything needed to register a rescue asset booted from a clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RescueAssetSpec {
    pub key: AssetKey,
    pub source: AssetKey,
    pub snapshot: SnapshotEpoch,
    pub dataset: String,
    pub created_at: DateTime<Utc>,
}

/// Identity and state of protected assets.
pub trait AssetService: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the asset registry cannot be read.
    fn exists(&self, asset: &AssetKey) -> Result<bool>;

    /// # Errors
    ///
    /// Returns an error if the asset does not exist or cannot be read.
    fn is_paused(&self, asset: &AssetKey) -> Result<bool>;

    /// # Errors
    ///
    /// Returns an error if the asset does not exist or cannot be updated.
    fn set_paused(&self, asset: &AssetKey, paused: bool) -> Result<()>;

    /// # Errors
    ///
    /// Returns an error if an asset with the same key already exists or the
    /// registry cannot be written.
    fn create_rescue_asset(&self, spec: &RescueAssetSpec) -> Result<()>;

    /// # Errors
    ///
    /// Returns an error if the asset cannot be removed.
    fn destroy_asset(&self, asset: &AssetKey) -> Result<()>;
}

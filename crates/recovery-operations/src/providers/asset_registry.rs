use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use recovery_core::{AssetKey, SnapshotEpoch};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::state_file::{load_toml_file, remove_if_exists, save_toml_file};
use crate::Result;
use crate::error::OperationError;
use crate::traits::{AssetService, RescueAssetSpec};

/// Per-asset state.
/// File: `<dir>/<asset>.toml`
/// Format:
/// ```toml
/// key = "web01-rescue-1700000000"
/// paused = false
///
/// [rescue]
/// source = "web01"
/// snapshot = 1700000000
/// dataset = "homePool/home/rescue/web01-rescue-1700000000"
/// created_at = "2024-01-01T00:00:00Z"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct AssetEntry {
    key: AssetKey,
    #[serde(default)]
    paused: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rescue: Option<RescueOrigin>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct RescueOrigin {
    source: AssetKey,
    snapshot: SnapshotEpoch,
    dataset: String,
    created_at: DateTime<Utc>,
}

/// Asset registry stored as one TOML file per asset.
pub struct FileAssetRegistry {
    dir: PathBuf,
}

impl FileAssetRegistry {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, asset: &AssetKey) -> PathBuf {
        self.dir.join(format!("{asset}.toml"))
    }

    fn load(&self, asset: &AssetKey) -> Result<AssetEntry> {
        load_toml_file(&self.path(asset))?
            .ok_or_else(|| OperationError::AssetNotFound(asset.clone()))
    }

    fn save(&self, entry: &AssetEntry) -> Result<()> {
        save_toml_file(&self.path(&entry.key), entry, false)
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Register a protected asset.
    ///
    /// # Errors
    ///
    /// Returns `OperationError::AssetExists` if the asset is already known.
    pub fn register(&self, asset: &AssetKey) -> Result<()> {
        if self.exists(asset)? {
            return Err(OperationError::AssetExists(asset.clone()));
        }
        self.save(&AssetEntry {
            key: asset.clone(),
            paused: false,
            rescue: None,
        })
    }
}

impl AssetService for FileAssetRegistry {
    fn exists(&self, asset: &AssetKey) -> Result<bool> {
        Ok(self.path(asset).is_file())
    }

    fn is_paused(&self, asset: &AssetKey) -> Result<bool> {
        Ok(self.load(asset)?.paused)
    }

    fn set_paused(&self, asset: &AssetKey, paused: bool) -> Result<()> {
        let mut entry = self.load(asset)?;
        entry.paused = paused;
        self.save(&entry)?;
        debug!(asset = %asset, paused, "updated asset pause state");
        Ok(())
    }

    fn create_rescue_asset(&self, spec: &RescueAssetSpec) -> Result<()> {
        if self.exists(&spec.key)? {
            return Err(OperationError::AssetExists(spec.key.clone()));
        }
        self.save(&AssetEntry {
            key: spec.key.clone(),
            paused: false,
            rescue: Some(RescueOrigin {
                source: spec.source.clone(),
                snapshot: spec.snapshot,
                dataset: spec.dataset.clone(),
                created_at: spec.created_at,
            }),
        })
    }

    fn destroy_asset(&self, asset: &AssetKey) -> Result<()> {
        let path = self.path(asset);
        remove_if_exists(&path).map_err(|source| OperationError::StateWrite { path, source })?;
        Ok(())
    }
}

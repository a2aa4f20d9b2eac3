use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::PathBuf;

use recovery_core::{AssetKey, RestoreKind, RestoreRecord, SnapshotEpoch};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::state_file::{load_toml_file, remove_if_exists, save_toml_file};
use crate::Result;
use crate::error::OperationError;
use crate::traits::{CancellationMarker, ExportLock, RestoreStore};

const RESTORES_FILENAME: &str = "restores.toml";

fn slot_name(asset: &AssetKey, snapshot: SnapshotEpoch, extension: &str) -> String {
    format!("{asset}-{snapshot}.{extension}")
}

/// Restores that exist on the appliance.
/// File: `<state_dir>/restores.toml`
/// Format:
/// ```toml
/// [[restore]]
/// asset = "web01"
/// snapshot = 1700000000
/// kind = "export"
/// image_type = "vhdx"
/// target = "usb"
/// created_at = "2024-01-01T00:00:00Z"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RestoreFile {
    #[serde(default, rename = "restore")]
    restores: Vec<RestoreRecord>,
}

pub struct FileRestoreStore {
    path: PathBuf,
}

impl FileRestoreStore {
    #[must_use]
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: state_dir.into().join(RESTORES_FILENAME),
        }
    }

    fn load(&self) -> Result<RestoreFile> {
        Ok(load_toml_file(&self.path)?.unwrap_or_default())
    }

    fn save(&self, file: &RestoreFile) -> Result<()> {
        save_toml_file(&self.path, file, file.restores.is_empty())
    }
}

impl RestoreStore for FileRestoreStore {
    fn add(&self, record: &RestoreRecord) -> Result<()> {
        let mut file = self.load()?;
        if file.restores.iter().any(|r| r.same_restore(record)) {
            return Err(OperationError::RestoreExists {
                asset: record.asset.clone(),
                snapshot: record.snapshot,
            });
        }
        file.restores.push(record.clone());
        self.save(&file)
    }

    fn remove(
        &self,
        asset: &AssetKey,
        snapshot: SnapshotEpoch,
        kind: RestoreKind,
    ) -> Result<bool> {
        let mut file = self.load()?;
        let before = file.restores.len();
        file.restores
            .retain(|r| !(r.asset == *asset && r.snapshot == snapshot && r.kind == kind));
        if file.restores.len() == before {
            return Ok(false);
        }
        self.save(&file)?;
        Ok(true)
    }

    fn list(&self) -> Result<Vec<RestoreRecord>> {
        Ok(self.load()?.restores)
    }
}

/// Export lock held as an exclusively created file.
pub struct FileExportLock {
    dir: PathBuf,
}

impl FileExportLock {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, asset: &AssetKey, snapshot: SnapshotEpoch) -> PathBuf {
        self.dir.join(slot_name(asset, snapshot, "lock"))
    }
}

impl ExportLock for FileExportLock {
    fn acquire(&self, asset: &AssetKey, snapshot: SnapshotEpoch) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|source| OperationError::StateWrite {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.path(asset, snapshot);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => {
                debug!(lock = %path.display(), "acquired export lock");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(OperationError::ExportLocked {
                asset: asset.clone(),
                snapshot,
            }),
            Err(source) => Err(OperationError::StateWrite { path, source }),
        }
    }

    fn release(&self, asset: &AssetKey, snapshot: SnapshotEpoch) -> Result<()> {
        let path = self.path(asset, snapshot);
        remove_if_exists(&path).map_err(|source| OperationError::StateWrite { path, source })?;
        Ok(())
    }
}

/// Cancellation requests stored as marker files.
pub struct FileCancellationMarker {
    dir: PathBuf,
}

impl FileCancellationMarker {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, asset: &AssetKey, snapshot: SnapshotEpoch) -> PathBuf {
        self.dir.join(slot_name(asset, snapshot, "cancel"))
    }
}

impl CancellationMarker for FileCancellationMarker {
    fn request_cancel(&self, asset: &AssetKey, snapshot: SnapshotEpoch) -> Result<()> {
        let path = self.path(asset, snapshot);
        fs::create_dir_all(&self.dir)
            .and_then(|()| fs::write(&path, ""))
            .map_err(|source| OperationError::StateWrite { path, source })
    }

    fn is_cancel_requested(&self, asset: &AssetKey, snapshot: SnapshotEpoch) -> bool {
        self.path(asset, snapshot).exists()
    }

    fn clear(&self, asset: &AssetKey, snapshot: SnapshotEpoch) -> Result<()> {
        let path = self.path(asset, snapshot);
        remove_if_exists(&path).map_err(|source| OperationError::StateWrite { path, source })?;
        Ok(())
    }
}

use std::path::{Path, PathBuf};

use recovery_core::{
    AssetKey, CloneHandle, CloneSpec, ExportTarget, ImageType, LogContext, SnapshotEpoch, UsbDrive,
};

/// Locations an export reads from and writes to, resolved when the
/// pipeline is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    pub staging_dir: PathBuf,
    pub overlay_dir: PathBuf,
    pub usb_mount_point: PathBuf,
    pub destination: PathBuf,
}

/// State shared by the stages of one image export.
#[derive(Debug)]
pub struct ExportContext {
    pub(crate) asset: AssetKey,
    pub(crate) snapshot: SnapshotEpoch,
    pub(crate) image_type: ImageType,
    pub(crate) target: ExportTarget,
    pub(crate) clone_spec: CloneSpec,
    pub(crate) paths: ExportPaths,
    pub(crate) usb_label: String,
    pub(crate) share_name: String,
    pub(crate) log: LogContext,

    pub(crate) lock_held: bool,
    pub(crate) record_created: bool,
    pub(crate) drive: Option<UsbDrive>,
    pub(crate) usb_mounted: bool,
    pub(crate) snapshot_clone: Option<CloneHandle>,
    pub(crate) overlay: Option<PathBuf>,
    pub(crate) artifacts: Vec<PathBuf>,
    pub(crate) delivered: Vec<PathBuf>,
    pub(crate) share_published: bool,
}

impl ExportContext {
    pub(crate) fn new(
        log: LogContext,
        image_type: ImageType,
        target: ExportTarget,
        clone_spec: CloneSpec,
        paths: ExportPaths,
        usb_label: String,
    ) -> Self {
        let asset = log.asset().clone();
        let snapshot = log.snapshot();
        Self {
            share_name: format!("{asset}-{snapshot}"),
            asset,
            snapshot,
            image_type,
            target,
            clone_spec,
            paths,
            usb_label,
            log,
            lock_held: false,
            record_created: false,
            drive: None,
            usb_mounted: false,
            snapshot_clone: None,
            overlay: None,
            artifacts: Vec::new(),
            delivered: Vec::new(),
            share_published: false,
        }
    }

    #[must_use]
    pub fn asset(&self) -> &AssetKey {
        &self.asset
    }

    #[must_use]
    pub fn snapshot(&self) -> SnapshotEpoch {
        self.snapshot
    }

    #[must_use]
    pub fn log(&self) -> &LogContext {
        &self.log
    }

    #[must_use]
    pub fn destination(&self) -> &Path {
        &self.paths.destination
    }

    /// Images in their final location.
    #[must_use]
    pub fn delivered(&self) -> &[PathBuf] {
        &self.delivered
    }

    /// Directory images are read from: the overlay when one is mounted,
    /// otherwise the snapshot clone.
    pub(crate) fn image_source(&self) -> Option<&Path> {
        self.overlay
            .as_deref()
            .or_else(|| self.snapshot_clone.as_ref().map(|c| c.mountpoint.as_path()))
    }
}

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use recovery_core::{RestoreKind, RestoreRecord};
use recovery_transaction::Stage;
use tracing::{debug, info};

use super::context::ExportContext;
use crate::error::OperationError;
use crate::operations::require;
use crate::traits::{
    CancellationMarker, ExportLock, ImageExporter, RemovableMedia, RestoreStore, StorageManager,
};

/// Set while this run holds the slot's export lock. Cancel requests for the
/// slot belong to whichever run holds the lock, so they are ignored while
/// this is unset.
pub type SlotOwnership = Arc<AtomicBool>;

/// Takes the slot's export lock, then clears a cancel marker left behind by
/// an earlier export of the same slot.
///
/// The lock is released by [`ReleaseExportLockStage`], which is added last so
/// that every other stage's cleanup runs while the lock is still held.
pub struct AcquireExportLockStage<L, C> {
    lock: Arc<L>,
    marker: Arc<C>,
    owned: SlotOwnership,
}

impl<L, C> AcquireExportLockStage<L, C> {
    #[must_use]
    pub fn new(lock: Arc<L>, marker: Arc<C>, owned: SlotOwnership) -> Self {
        Self {
            lock,
            marker,
            owned,
        }
    }
}

impl<L: ExportLock, C: CancellationMarker> Stage for AcquireExportLockStage<L, C> {
    type Context = ExportContext;
    type Error = OperationError;

    fn status_message(&self) -> &'static str {
        "Acquiring export lock"
    }

    fn commit(&mut self, ctx: &mut ExportContext) -> Result<(), OperationError> {
        self.lock.acquire(&ctx.asset, ctx.snapshot)?;
        ctx.lock_held = true;
        self.marker.clear(&ctx.asset, ctx.snapshot)?;
        self.owned.store(true, Ordering::SeqCst);
        Ok(())
    }
}

pub struct ReleaseExportLockStage<L> {
    lock: Arc<L>,
    owned: SlotOwnership,
}

impl<L> ReleaseExportLockStage<L> {
    #[must_use]
    pub fn new(lock: Arc<L>, owned: SlotOwnership) -> Self {
        Self { lock, owned }
    }
}

impl<L: ExportLock> Stage for ReleaseExportLockStage<L> {
    type Context = ExportContext;
    type Error = OperationError;

    fn status_message(&self) -> &'static str {
        "Releasing export lock"
    }

    fn commit(&mut self, _ctx: &mut ExportContext) -> Result<(), OperationError> {
        Ok(())
    }

    fn cleanup(&mut self, ctx: &mut ExportContext) -> Result<(), OperationError> {
        if ctx.lock_held {
            self.owned.store(false, Ordering::SeqCst);
            self.lock.release(&ctx.asset, ctx.snapshot)?;
            ctx.lock_held = false;
        }
        Ok(())
    }
}

pub struct CreateRestoreRecordStage<R> {
    restores: Arc<R>,
}

impl<R> CreateRestoreRecordStage<R> {
    #[must_use]
    pub fn new(restores: Arc<R>) -> Self {
        Self { restores }
    }
}

impl<R: RestoreStore> Stage for CreateRestoreRecordStage<R> {
    type Context = ExportContext;
    type Error = OperationError;

    fn status_message(&self) -> &'static str {
        "Recording restore"
    }

    fn commit(&mut self, ctx: &mut ExportContext) -> Result<(), OperationError> {
        self.restores.add(&RestoreRecord::export(
            ctx.asset.clone(),
            ctx.snapshot,
            ctx.image_type,
            ctx.target,
        ))?;
        ctx.record_created = true;
        Ok(())
    }

    fn rollback(&mut self, ctx: &mut ExportContext) -> Result<(), OperationError> {
        if ctx.record_created {
            self.restores
                .remove(&ctx.asset, ctx.snapshot, RestoreKind::Export)?;
            ctx.record_created = false;
        }
        Ok(())
    }
}

pub struct FindUsbDriveStage<U> {
    media: Arc<U>,
}

impl<U> FindUsbDriveStage<U> {
    #[must_use]
    pub fn new(media: Arc<U>) -> Self {
        Self { media }
    }
}

impl<U: RemovableMedia> Stage for FindUsbDriveStage<U> {
    type Context = ExportContext;
    type Error = OperationError;

    fn status_message(&self) -> &'static str {
        "Looking for USB drive"
    }

    fn commit(&mut self, ctx: &mut ExportContext) -> Result<(), OperationError> {
        let drive = self.media.find_drive()?.ok_or(OperationError::NoUsbDrive)?;
        info!(
            context = %ctx.log,
            device = %drive.device.display(),
            size_bytes = drive.size_bytes,
            model = drive.model.as_deref().unwrap_or("unknown"),
            "found USB drive"
        );
        ctx.drive = Some(drive);
        Ok(())
    }
}

/// Destroys the drive's contents; there is nothing to restore on rollback.
pub struct FormatUsbDriveStage<U> {
    media: Arc<U>,
}

impl<U> FormatUsbDriveStage<U> {
    #[must_use]
    pub fn new(media: Arc<U>) -> Self {
        Self { media }
    }
}

impl<U: RemovableMedia> Stage for FormatUsbDriveStage<U> {
    type Context = ExportContext;
    type Error = OperationError;

    fn status_message(&self) -> &'static str {
        "Formatting USB drive"
    }

    fn commit(&mut self, ctx: &mut ExportContext) -> Result<(), OperationError> {
        let drive = require(&ctx.drive, "USB drive")?;
        self.media.format(drive, &ctx.usb_label)
    }
}

pub struct MountUsbDriveStage<U> {
    media: Arc<U>,
}

impl<U> MountUsbDriveStage<U> {
    #[must_use]
    pub fn new(media: Arc<U>) -> Self {
        Self { media }
    }
}

impl<U: RemovableMedia> Stage for MountUsbDriveStage<U> {
    type Context = ExportContext;
    type Error = OperationError;

    fn status_message(&self) -> &'static str {
        "Mounting USB drive"
    }

    fn commit(&mut self, ctx: &mut ExportContext) -> Result<(), OperationError> {
        let drive = require(&ctx.drive, "USB drive")?;
        self.media.mount(drive, &ctx.paths.usb_mount_point)?;
        ctx.usb_mounted = true;
        Ok(())
    }

    fn cleanup(&mut self, ctx: &mut ExportContext) -> Result<(), OperationError> {
        if ctx.usb_mounted {
            self.media.unmount(&ctx.paths.usb_mount_point)?;
            ctx.usb_mounted = false;
        }
        Ok(())
    }
}

/// Mounts a read-only clone of the snapshot.
///
/// Cleanup runs before the overlay stage's cleanup, so it takes down an
/// overlay still stacked on the clone first. An overlay it fails to remove
/// is left in the context for the overlay stage to retry.
pub struct MountSnapshotStage<S, X> {
    storage: Arc<S>,
    exporter: Arc<X>,
}

impl<S, X> MountSnapshotStage<S, X> {
    #[must_use]
    pub fn new(storage: Arc<S>, exporter: Arc<X>) -> Self {
        Self { storage, exporter }
    }
}

impl<S: StorageManager, X: ImageExporter> Stage for MountSnapshotStage<S, X> {
    type Context = ExportContext;
    type Error = OperationError;

    fn status_message(&self) -> &'static str {
        "Mounting snapshot"
    }

    fn commit(&mut self, ctx: &mut ExportContext) -> Result<(), OperationError> {
        let clone = self.storage.create_clone(&ctx.clone_spec)?;
        debug!(context = %ctx.log, clone = %clone.dataset, "mounted snapshot read-only");
        ctx.snapshot_clone = Some(clone);
        Ok(())
    }

    fn cleanup(&mut self, ctx: &mut ExportContext) -> Result<(), OperationError> {
        let mut first_error = None;
        if let Some(overlay) = ctx.overlay.take() {
            if let Err(e) = self.exporter.remove_overlay(&overlay) {
                ctx.overlay = Some(overlay);
                first_error = Some(e);
            }
        }
        if let Some(clone) = ctx.snapshot_clone.take() {
            if let Err(e) = self.storage.destroy_clone(&clone) {
                ctx.snapshot_clone = Some(clone);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Stacks a writable overlay on the snapshot for formats that modify their
/// source while converting.
pub struct OverlayMountStage<X> {
    exporter: Arc<X>,
}

impl<X> OverlayMountStage<X> {
    #[must_use]
    pub fn new(exporter: Arc<X>) -> Self {
        Self { exporter }
    }
}

impl<X: ImageExporter> Stage for OverlayMountStage<X> {
    type Context = ExportContext;
    type Error = OperationError;

    fn status_message(&self) -> &'static str {
        "Mounting overlay"
    }

    fn commit(&mut self, ctx: &mut ExportContext) -> Result<(), OperationError> {
        let clone = require(&ctx.snapshot_clone, "snapshot clone")?;
        self.exporter
            .create_overlay(&clone.mountpoint, &ctx.paths.overlay_dir)?;
        ctx.overlay = Some(ctx.paths.overlay_dir.clone());
        Ok(())
    }

    fn cleanup(&mut self, ctx: &mut ExportContext) -> Result<(), OperationError> {
        if let Some(overlay) = ctx.overlay.take() {
            self.exporter.remove_overlay(&overlay)?;
        }
        Ok(())
    }
}

pub struct ConvertImageStage<X> {
    exporter: Arc<X>,
}

impl<X> ConvertImageStage<X> {
    #[must_use]
    pub fn new(exporter: Arc<X>) -> Self {
        Self { exporter }
    }
}

impl<X: ImageExporter> Stage for ConvertImageStage<X> {
    type Context = ExportContext;
    type Error = OperationError;

    fn status_message(&self) -> &'static str {
        "Converting disk images"
    }

    fn commit(&mut self, ctx: &mut ExportContext) -> Result<(), OperationError> {
        let source = ctx
            .image_source()
            .ok_or(OperationError::MissingStageOutput("snapshot clone"))?;
        let artifacts = self
            .exporter
            .convert(source, ctx.image_type, &ctx.paths.staging_dir)?;
        info!(
            context = %ctx.log,
            images = artifacts.len(),
            format = %ctx.image_type,
            "converted disk images"
        );
        ctx.artifacts = artifacts;
        Ok(())
    }

    fn cleanup(&mut self, ctx: &mut ExportContext) -> Result<(), OperationError> {
        if !ctx.artifacts.is_empty() {
            self.exporter.remove_files(&ctx.artifacts)?;
            ctx.artifacts.clear();
        }
        Ok(())
    }
}

pub struct CopyToDestinationStage<X> {
    exporter: Arc<X>,
}

impl<X> CopyToDestinationStage<X> {
    #[must_use]
    pub fn new(exporter: Arc<X>) -> Self {
        Self { exporter }
    }
}

impl<X: ImageExporter> Stage for CopyToDestinationStage<X> {
    type Context = ExportContext;
    type Error = OperationError;

    fn status_message(&self) -> &'static str {
        "Copying images to destination"
    }

    fn commit(&mut self, ctx: &mut ExportContext) -> Result<(), OperationError> {
        let delivered = self
            .exporter
            .copy(&ctx.artifacts, &ctx.paths.destination)?;
        info!(
            context = %ctx.log,
            destination = %ctx.paths.destination.display(),
            files = delivered.len(),
            "copied images"
        );
        ctx.delivered = delivered;
        Ok(())
    }

    fn rollback(&mut self, ctx: &mut ExportContext) -> Result<(), OperationError> {
        self.exporter.remove_files(&ctx.delivered)?;
        ctx.delivered.clear();
        Ok(())
    }
}

pub struct PublishShareStage<X> {
    exporter: Arc<X>,
}

impl<X> PublishShareStage<X> {
    #[must_use]
    pub fn new(exporter: Arc<X>) -> Self {
        Self { exporter }
    }
}

impl<X: ImageExporter> Stage for PublishShareStage<X> {
    type Context = ExportContext;
    type Error = OperationError;

    fn status_message(&self) -> &'static str {
        "Publishing network share"
    }

    fn commit(&mut self, ctx: &mut ExportContext) -> Result<(), OperationError> {
        self.exporter
            .create_share(&ctx.share_name, &ctx.paths.destination)?;
        ctx.share_published = true;
        info!(context = %ctx.log, share = %ctx.share_name, "published network share");
        Ok(())
    }

    fn rollback(&mut self, ctx: &mut ExportContext) -> Result<(), OperationError> {
        if ctx.share_published {
            self.exporter.remove_share(&ctx.share_name)?;
            ctx.share_published = false;
        }
        Ok(())
    }
}

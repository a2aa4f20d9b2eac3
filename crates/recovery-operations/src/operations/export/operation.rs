use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use recovery_core::{
    AssetKey, CloneSpec, ExportTarget, ImageType, LogContext, Operation, RestoreKind,
    RestoreRecord, SnapshotEpoch,
};
use recovery_transaction::Transaction;
use tracing::{info, warn};

use super::context::{ExportContext, ExportPaths};
use super::stages::{
    AcquireExportLockStage, ConvertImageStage, CopyToDestinationStage, CreateRestoreRecordStage,
    FindUsbDriveStage, FormatUsbDriveStage, MountSnapshotStage, MountUsbDriveStage,
    OverlayMountStage, PublishShareStage, ReleaseExportLockStage,
};
use crate::Result;
use crate::config::RecoveryConfig;
use crate::error::OperationError;
use crate::traits::{
    CancellationMarker, ExportLock, ImageExporter, RemovableMedia, RestoreStore, StorageManager,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportInput {
    pub asset: AssetKey,
    pub snapshot: SnapshotEpoch,
    pub image_type: ImageType,
    pub target: ExportTarget,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOutput {
    pub asset: AssetKey,
    pub snapshot: SnapshotEpoch,
    pub image_type: ImageType,
    pub target: ExportTarget,
    pub destination: PathBuf,
    pub files: Vec<PathBuf>,
    /// Name of the published share, for network share exports.
    pub share: Option<String>,
}

impl From<ExportContext> for ExportOutput {
    fn from(ctx: ExportContext) -> Self {
        Self {
            share: ctx.share_published.then_some(ctx.share_name),
            asset: ctx.asset,
            snapshot: ctx.snapshot,
            image_type: ctx.image_type,
            target: ctx.target,
            destination: ctx.paths.destination,
            files: ctx.delivered,
        }
    }
}

/// Converts a backup snapshot into portable disk images and delivers them
/// to a USB drive or a network share.
pub struct ExportOperation<L, R, S, U, X, C> {
    config: RecoveryConfig,
    lock: Arc<L>,
    restores: Arc<R>,
    storage: Arc<S>,
    media: Arc<U>,
    exporter: Arc<X>,
    marker: Arc<C>,
}

impl<L, R, S, U, X, C> ExportOperation<L, R, S, U, X, C>
where
    L: ExportLock + 'static,
    R: RestoreStore + 'static,
    S: StorageManager + 'static,
    U: RemovableMedia + 'static,
    X: ImageExporter + 'static,
    C: CancellationMarker + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: RecoveryConfig,
        lock: Arc<L>,
        restores: Arc<R>,
        storage: Arc<S>,
        media: Arc<U>,
        exporter: Arc<X>,
        marker: Arc<C>,
    ) -> Self {
        Self {
            config,
            lock,
            restores,
            storage,
            media,
            exporter,
            marker,
        }
    }

    /// Assemble the export pipeline without running it.
    ///
    /// A cancel marker left over from an earlier export of the same
    /// snapshot is removed once the export lock is held. Until then a marker
    /// belongs to the export holding the lock and is left alone.
    #[must_use]
    pub fn build(&self, input: &ExportInput) -> Transaction<ExportContext, OperationError> {
        let export = self.config.export();
        let slot = format!("{}-{}", input.asset, input.snapshot);
        let usb = input.target == ExportTarget::Usb;
        let destination = if usb {
            export.usb_mount_point().join(&slot)
        } else {
            export.share_root().join(&slot)
        };
        let paths = ExportPaths {
            staging_dir: export.staging_dir().join(&slot),
            overlay_dir: export.overlay_dir().join(&slot),
            usb_mount_point: export.usb_mount_point().to_path_buf(),
            destination,
        };
        let storage = self.config.storage();
        let clone_spec = CloneSpec {
            source_dataset: storage.dataset_for(&input.asset),
            snapshot: input.snapshot,
            target_dataset: storage.export_clone_for(&input.asset, input.snapshot),
            read_only: true,
        };
        let log = LogContext::new(input.asset.clone(), input.snapshot, Operation::ImageExport);
        let context = ExportContext::new(
            log.clone(),
            input.image_type,
            input.target,
            clone_spec,
            paths,
            export.usb_label().to_string(),
        );

        let owned = Arc::new(AtomicBool::new(false));
        let should_cancel = {
            let marker = Arc::clone(&self.marker);
            let owned = Arc::clone(&owned);
            let asset = input.asset.clone();
            let snapshot = input.snapshot;
            move || owned.load(Ordering::SeqCst) && marker.is_cancel_requested(&asset, snapshot)
        };
        let on_cancel = {
            let marker = Arc::clone(&self.marker);
            move || {
                info!(context = %log, "export cancelled on request");
                if let Err(e) = marker.clear(log.asset(), log.snapshot()) {
                    warn!(context = %log, error = %e, "failed to remove cancel marker");
                }
            }
        };

        Transaction::new(context)
            .named(format!("export {slot}"))
            .add(AcquireExportLockStage::new(
                Arc::clone(&self.lock),
                Arc::clone(&self.marker),
                Arc::clone(&owned),
            ))
            .add(CreateRestoreRecordStage::new(Arc::clone(&self.restores)))
            .add_if(usb, FindUsbDriveStage::new(Arc::clone(&self.media)))
            .add_if(usb, FormatUsbDriveStage::new(Arc::clone(&self.media)))
            .add_if(usb, MountUsbDriveStage::new(Arc::clone(&self.media)))
            .add(MountSnapshotStage::new(
                Arc::clone(&self.storage),
                Arc::clone(&self.exporter),
            ))
            .add_if(
                input.image_type.needs_overlay(),
                OverlayMountStage::new(Arc::clone(&self.exporter)),
            )
            .add(ConvertImageStage::new(Arc::clone(&self.exporter)))
            .add(CopyToDestinationStage::new(Arc::clone(&self.exporter)))
            .add_if(!usb, PublishShareStage::new(Arc::clone(&self.exporter)))
            .add(ReleaseExportLockStage::new(Arc::clone(&self.lock), owned))
            .on_cancel(should_cancel, on_cancel)
    }

    /// Build and run the export pipeline.
    ///
    /// # Errors
    ///
    /// Returns `OperationError::StageFailed` or `OperationError::Cancelled`
    /// once everything the export created has been removed again.
    pub fn execute(&self, input: &ExportInput) -> Result<ExportOutput> {
        let context = self.build(input).commit()?;
        let output = ExportOutput::from(context);
        info!(
            asset = %output.asset,
            snapshot = %output.snapshot,
            destination = %output.destination.display(),
            "export complete"
        );
        Ok(output)
    }

    /// Ask a running export of `asset` at `snapshot` to stop before its
    /// next stage.
    ///
    /// # Errors
    ///
    /// Returns an error if the cancel marker cannot be written.
    pub fn cancel(&self, asset: &AssetKey, snapshot: SnapshotEpoch) -> Result<()> {
        self.marker.request_cancel(asset, snapshot)?;
        info!(asset = %asset, snapshot = %snapshot, "requested export cancellation");
        Ok(())
    }

    /// Exports that currently exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the restore records cannot be read.
    pub fn list(&self) -> Result<Vec<RestoreRecord>> {
        Ok(self
            .restores
            .list()?
            .into_iter()
            .filter(|record| record.kind == RestoreKind::Export)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use recovery_transaction::CleanupStatus;

    use super::*;
    use crate::mocks::{
        Journal, MockCancellationMarker, MockExportLock, MockImageExporter, MockRemovableMedia,
        MockRestoreStore, MockStorage,
    };

    type MockExport = ExportOperation<
        MockExportLock,
        MockRestoreStore,
        MockStorage,
        MockRemovableMedia,
        MockImageExporter,
        MockCancellationMarker,
    >;

    struct Fixture {
        journal: Arc<Journal>,
        lock: Arc<MockExportLock>,
        restores: Arc<MockRestoreStore>,
        storage: Arc<MockStorage>,
        exporter: Arc<MockImageExporter>,
        marker: Arc<MockCancellationMarker>,
        operation: MockExport,
    }

    struct Setup {
        media: fn(Arc<Journal>) -> MockRemovableMedia,
        marker: fn(Arc<Journal>) -> MockCancellationMarker,
    }

    impl Default for Setup {
        fn default() -> Self {
            Self {
                media: MockRemovableMedia::new,
                marker: MockCancellationMarker::new,
            }
        }
    }

    fn fixture_with(setup: Setup) -> Fixture {
        let journal = Journal::new();
        let lock = Arc::new(MockExportLock::new(Arc::clone(&journal)));
        let restores = Arc::new(MockRestoreStore::new(Arc::clone(&journal)));
        let storage = Arc::new(MockStorage::new(Arc::clone(&journal)));
        let exporter = Arc::new(MockImageExporter::new(Arc::clone(&journal)));
        let marker = Arc::new((setup.marker)(Arc::clone(&journal)));
        let operation = ExportOperation::new(
            RecoveryConfig::default(),
            Arc::clone(&lock),
            Arc::clone(&restores),
            Arc::clone(&storage),
            Arc::new((setup.media)(Arc::clone(&journal))),
            Arc::clone(&exporter),
            Arc::clone(&marker),
        );
        Fixture {
            journal,
            lock,
            restores,
            storage,
            exporter,
            marker,
            operation,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(Setup::default())
    }

    fn asset() -> AssetKey {
        AssetKey::new("web01").expect("valid key")
    }

    fn snapshot() -> SnapshotEpoch {
        SnapshotEpoch::new(1_700_000_000).expect("valid epoch")
    }

    fn input(image_type: ImageType, target: ExportTarget) -> ExportInput {
        ExportInput {
            asset: asset(),
            snapshot: snapshot(),
            image_type,
            target,
        }
    }

    #[test]
    fn usb_export_runs_drive_stages_and_cleans_up() -> anyhow::Result<()> {
        let f = fixture();

        let output = f.operation.execute(&input(ImageType::Vhdx, ExportTarget::Usb))?;

        assert_eq!(
            f.journal.events(),
            vec![
                "lock.acquire",
                "marker.clear",
                "restores.add",
                "usb.find",
                "usb.format",
                "usb.mount",
                "storage.create_clone",
                "image.convert",
                "image.copy",
                "usb.unmount",
                "storage.destroy_clone",
                "image.remove_files",
                "lock.release",
            ]
        );
        assert_eq!(
            output.files,
            vec![PathBuf::from("/mnt/recovery-usb/web01-1700000000/disk0.vhdx")]
        );
        assert!(output.share.is_none());
        assert!(!f.lock.is_held(&asset(), snapshot()));
        Ok(())
    }

    #[test]
    fn network_share_export_publishes_share() -> anyhow::Result<()> {
        let f = fixture();

        let output = f
            .operation
            .execute(&input(ImageType::Vmdk, ExportTarget::NetworkShare))?;

        assert!(!f.journal.contains("usb.find"));
        assert_eq!(output.share.as_deref(), Some("web01-1700000000"));
        assert_eq!(
            f.exporter.shares(),
            vec![(
                "web01-1700000000".to_string(),
                PathBuf::from("/srv/exports/web01-1700000000")
            )]
        );
        assert_eq!(f.operation.list()?.len(), 1);
        Ok(())
    }

    #[test]
    fn snapshot_is_cloned_read_only() -> anyhow::Result<()> {
        let f = fixture();

        f.operation
            .execute(&input(ImageType::Vhd, ExportTarget::NetworkShare))?;

        let clones = f.storage.clones();
        assert!(clones[0].read_only);
        assert_eq!(
            clones[0].target_dataset,
            "homePool/home/exports/web01-1700000000"
        );
        Ok(())
    }

    #[test]
    fn linked_vmdk_mounts_overlay_and_tears_it_down_before_clone() -> anyhow::Result<()> {
        let f = fixture();

        let tx = f
            .operation
            .build(&input(ImageType::VmdkLinked, ExportTarget::NetworkShare));
        assert!(tx.status_messages().contains(&"Mounting overlay"));
        tx.commit()?;

        let events = f.journal.events();
        let position = |call: &str| events.iter().position(|e| e == call);
        assert!(position("image.create_overlay") < position("image.convert"));
        assert!(position("image.remove_overlay") < position("storage.destroy_clone"));
        assert_eq!(
            events.iter().filter(|e| *e == "image.remove_overlay").count(),
            1
        );
        Ok(())
    }

    #[test]
    fn copy_failure_rolls_back_record_and_keeps_cleanup() {
        let f = fixture();
        f.journal.fail_on("image.copy");

        let err = f
            .operation
            .execute(&input(ImageType::Vhdx, ExportTarget::Usb))
            .expect_err("copy fails");

        assert!(matches!(
            &err,
            OperationError::StageFailed { stage, .. } if stage == "Copying images to destination"
        ));
        let events = f.journal.events();
        let tail: Vec<&str> = events
            .iter()
            .skip_while(|e| *e != "image.copy")
            .map(String::as_str)
            .collect();
        assert_eq!(
            tail,
            vec![
                "image.copy",
                "restores.remove",
                "usb.unmount",
                "storage.destroy_clone",
                "image.remove_files",
                "lock.release",
            ]
        );
        assert!(f.restores.list().is_ok_and(|records| records.is_empty()));
    }

    #[test]
    fn share_failure_removes_copied_images() {
        let f = fixture();
        f.journal.fail_on("share.create");

        let result = f
            .operation
            .execute(&input(ImageType::Vhd, ExportTarget::NetworkShare));

        assert!(result.is_err());
        let events = f.journal.events();
        let after_share: Vec<&str> = events
            .iter()
            .skip_while(|e| *e != "share.create")
            .skip(1)
            .map(String::as_str)
            .collect();
        assert_eq!(after_share[..2], ["image.remove_files", "restores.remove"]);
    }

    #[test]
    fn missing_usb_drive_fails_without_touching_storage() {
        let f = fixture_with(Setup {
            media: |journal| MockRemovableMedia::new(journal).without_drive(),
            ..Setup::default()
        });

        let err = f
            .operation
            .execute(&input(ImageType::Vhdx, ExportTarget::Usb))
            .expect_err("no drive");

        assert!(matches!(
            &err,
            OperationError::StageFailed { source, .. } if matches!(**source, OperationError::NoUsbDrive)
        ));
        assert!(!f.journal.contains("storage.create_clone"));
        assert!(!f.journal.contains("usb.unmount"));
        assert!(f.journal.contains("lock.release"));
    }

    #[test]
    fn duplicate_export_is_rejected_and_lock_released() -> anyhow::Result<()> {
        let f = fixture();
        f.operation
            .execute(&input(ImageType::Vhdx, ExportTarget::NetworkShare))?;

        let err = f
            .operation
            .execute(&input(ImageType::Vmdk, ExportTarget::NetworkShare))
            .expect_err("already exported");

        assert!(matches!(
            &err,
            OperationError::StageFailed { source, .. }
                if matches!(**source, OperationError::RestoreExists { .. })
        ));
        assert!(!f.lock.is_held(&asset(), snapshot()));
        assert_eq!(f.operation.list()?.len(), 1);
        Ok(())
    }

    #[test]
    fn cancellation_between_stages_unwinds() {
        let f = fixture_with(Setup {
            marker: |journal| MockCancellationMarker::new(journal).cancel_after_polls(2),
            ..Setup::default()
        });

        let err = f
            .operation
            .execute(&input(ImageType::Vhd, ExportTarget::NetworkShare))
            .expect_err("cancelled");

        assert!(err.is_cancelled());
        assert!(matches!(
            &err,
            OperationError::Cancelled { stage } if stage == "Converting disk images"
        ));
        assert_eq!(
            f.journal.events(),
            vec![
                "lock.acquire",
                "marker.clear",
                "restores.add",
                "storage.create_clone",
                "marker.clear",
                "restores.remove",
                "storage.destroy_clone",
                "lock.release",
            ]
        );
        assert_eq!(f.marker.polls(), 3);
    }

    #[test]
    fn cancel_request_for_locked_slot_survives_second_export() -> anyhow::Result<()> {
        let f = fixture();
        f.lock.acquire(&asset(), snapshot())?;
        f.operation.cancel(&asset(), snapshot())?;

        let err = f
            .operation
            .execute(&input(ImageType::Vhd, ExportTarget::NetworkShare))
            .expect_err("slot is locked");

        assert!(matches!(
            &err,
            OperationError::StageFailed { stage, source, .. }
                if stage == "Acquiring export lock"
                    && matches!(**source, OperationError::ExportLocked { .. })
        ));
        assert!(f.marker.is_requested());
        assert!(!f.journal.contains("marker.clear"));
        assert!(!f.journal.contains("lock.release"));
        assert!(f.lock.is_held(&asset(), snapshot()));
        Ok(())
    }

    #[test]
    fn overlay_removal_failure_still_destroys_clone() -> anyhow::Result<()> {
        let f = fixture();
        f.journal.fail_on("image.remove_overlay");

        let (result, audit) = f
            .operation
            .build(&input(ImageType::VmdkLinked, ExportTarget::NetworkShare))
            .commit_with_audit();

        assert!(result.is_ok());
        let events = f.journal.events();
        assert!(f.journal.contains("storage.destroy_clone"));
        assert_eq!(
            events.iter().filter(|e| *e == "image.remove_overlay").count(),
            2
        );
        assert_eq!(events.last().map(String::as_str), Some("lock.release"));
        let failed_cleanups: Vec<&str> = audit
            .records()
            .iter()
            .filter(|record| record.cleanup == CleanupStatus::Failed)
            .map(|record| record.name.as_str())
            .collect();
        assert_eq!(failed_cleanups, vec!["Mounting snapshot", "Mounting overlay"]);
        Ok(())
    }

    #[test]
    fn stale_cancel_request_is_cleared_once_lock_is_held() -> anyhow::Result<()> {
        let f = fixture();
        f.operation.cancel(&asset(), snapshot())?;
        assert!(f.marker.is_requested());

        f.operation
            .execute(&input(ImageType::Vhd, ExportTarget::NetworkShare))?;

        assert!(!f.marker.is_requested());
        Ok(())
    }

    #[test]
    fn list_ignores_rescue_records() -> anyhow::Result<()> {
        let journal = Journal::new();
        let restores =
            Arc::new(MockRestoreStore::new(Arc::clone(&journal)).with_rescue(&asset(), snapshot()));
        let operation = ExportOperation::new(
            RecoveryConfig::default(),
            Arc::new(MockExportLock::new(Arc::clone(&journal))),
            restores,
            Arc::new(MockStorage::new(Arc::clone(&journal))),
            Arc::new(MockRemovableMedia::new(Arc::clone(&journal))),
            Arc::new(MockImageExporter::new(Arc::clone(&journal))),
            Arc::new(MockCancellationMarker::new(Arc::clone(&journal))),
        );

        assert!(operation.list()?.is_empty());
        Ok(())
    }
}

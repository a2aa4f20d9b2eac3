use std::sync::Arc;

use chrono::Utc;
use recovery_transaction::Stage;
use tracing::{debug, info, warn};

use super::context::RescueContext;
use crate::error::OperationError;
use crate::operations::require;
use crate::traits::{
    AssetService, Hypervisor, MetadataPublisher, ReplicationClient, RescueAssetSpec,
    StorageManager,
};

pub struct PauseSourceStage<A> {
    assets: Arc<A>,
}

impl<A> PauseSourceStage<A> {
    #[must_use]
    pub fn new(assets: Arc<A>) -> Self {
        Self { assets }
    }
}

impl<A: AssetService> Stage for PauseSourceStage<A> {
    type Context = RescueContext;
    type Error = OperationError;

    fn status_message(&self) -> &'static str {
        "Pausing source asset"
    }

    fn commit(&mut self, ctx: &mut RescueContext) -> Result<(), OperationError> {
        if self.assets.is_paused(&ctx.source)? {
            debug!(context = %ctx.log, "source already paused");
            return Ok(());
        }
        self.assets.set_paused(&ctx.source, true)?;
        ctx.paused_source = true;
        Ok(())
    }

    fn rollback(&mut self, ctx: &mut RescueContext) -> Result<(), OperationError> {
        if ctx.paused_source {
            self.assets.set_paused(&ctx.source, false)?;
            ctx.paused_source = false;
        }
        Ok(())
    }
}

pub struct CloneDatasetStage<S> {
    storage: Arc<S>,
}

impl<S> CloneDatasetStage<S> {
    #[must_use]
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }
}

impl<S: StorageManager> Stage for CloneDatasetStage<S> {
    type Context = RescueContext;
    type Error = OperationError;

    fn status_message(&self) -> &'static str {
        "Cloning snapshot"
    }

    fn commit(&mut self, ctx: &mut RescueContext) -> Result<(), OperationError> {
        let clone = self.storage.create_clone(&ctx.clone_spec)?;
        info!(
            context = %ctx.log,
            clone = %clone.dataset,
            mountpoint = %clone.mountpoint.display(),
            "cloned snapshot"
        );
        ctx.clone = Some(clone);
        Ok(())
    }

    fn rollback(&mut self, ctx: &mut RescueContext) -> Result<(), OperationError> {
        if let Some(clone) = ctx.clone.take() {
            self.storage.destroy_clone(&clone)?;
        }
        Ok(())
    }
}

pub struct CreateRescueAssetStage<A> {
    assets: Arc<A>,
}

impl<A> CreateRescueAssetStage<A> {
    #[must_use]
    pub fn new(assets: Arc<A>) -> Self {
        Self { assets }
    }
}

impl<A: AssetService> Stage for CreateRescueAssetStage<A> {
    type Context = RescueContext;
    type Error = OperationError;

    fn status_message(&self) -> &'static str {
        "Creating rescue asset"
    }

    fn commit(&mut self, ctx: &mut RescueContext) -> Result<(), OperationError> {
        let dataset = require(&ctx.clone, "dataset clone")?.dataset.clone();
        self.assets.create_rescue_asset(&RescueAssetSpec {
            key: ctx.rescue.clone(),
            source: ctx.source.clone(),
            snapshot: ctx.snapshot,
            dataset,
            created_at: Utc::now(),
        })?;
        ctx.asset_created = true;
        ctx.log = ctx.source_log.for_asset(ctx.rescue.clone());
        info!(context = %ctx.log, source = %ctx.source, "created rescue asset");
        Ok(())
    }

    fn rollback(&mut self, ctx: &mut RescueContext) -> Result<(), OperationError> {
        if ctx.asset_created {
            self.assets.destroy_asset(&ctx.rescue)?;
            ctx.asset_created = false;
        }
        Ok(())
    }

    fn cleanup(&mut self, ctx: &mut RescueContext) -> Result<(), OperationError> {
        ctx.log = ctx.source_log.clone();
        Ok(())
    }
}

/// Best effort: failures leave the files in place and are only logged.
pub struct HideExcludedFilesStage<S> {
    storage: Arc<S>,
}

impl<S> HideExcludedFilesStage<S> {
    #[must_use]
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }
}

impl<S: StorageManager> Stage for HideExcludedFilesStage<S> {
    type Context = RescueContext;
    type Error = OperationError;

    fn status_message(&self) -> &'static str {
        "Hiding excluded files"
    }

    fn commit(&mut self, ctx: &mut RescueContext) -> Result<(), OperationError> {
        let clone = require(&ctx.clone, "dataset clone")?;
        match self.storage.hide_files(clone, &ctx.excluded_paths) {
            Ok(hidden) => debug!(context = %ctx.log, hidden, "hid excluded files"),
            Err(e) => warn!(context = %ctx.log, error = %e, "could not hide excluded files"),
        }
        Ok(())
    }
}

pub struct RegisterReplicationStage<R> {
    replication: Arc<R>,
}

impl<R> RegisterReplicationStage<R> {
    #[must_use]
    pub fn new(replication: Arc<R>) -> Self {
        Self { replication }
    }
}

impl<R: ReplicationClient> Stage for RegisterReplicationStage<R> {
    type Context = RescueContext;
    type Error = OperationError;

    fn status_message(&self) -> &'static str {
        "Registering with replication"
    }

    fn commit(&mut self, ctx: &mut RescueContext) -> Result<(), OperationError> {
        let dataset = &require(&ctx.clone, "dataset clone")?.dataset;
        self.replication.register(&ctx.rescue, dataset)?;
        ctx.replication_registered = true;
        Ok(())
    }

    fn rollback(&mut self, ctx: &mut RescueContext) -> Result<(), OperationError> {
        if ctx.replication_registered {
            self.replication.deregister(&ctx.rescue)?;
            ctx.replication_registered = false;
        }
        Ok(())
    }
}

/// The snapshot is destroyed together with the clone.
pub struct TakeInitialSnapshotStage<S> {
    storage: Arc<S>,
}

impl<S> TakeInitialSnapshotStage<S> {
    #[must_use]
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }
}

impl<S: StorageManager> Stage for TakeInitialSnapshotStage<S> {
    type Context = RescueContext;
    type Error = OperationError;

    fn status_message(&self) -> &'static str {
        "Taking initial snapshot"
    }

    fn commit(&mut self, ctx: &mut RescueContext) -> Result<(), OperationError> {
        let dataset = &require(&ctx.clone, "dataset clone")?.dataset;
        let epoch = self.storage.take_snapshot(dataset)?;
        debug!(context = %ctx.log, snapshot = %epoch, "took initial snapshot");
        ctx.initial_snapshot = Some(epoch);
        Ok(())
    }
}

pub struct StartVmStage<H> {
    hypervisor: Arc<H>,
}

impl<H> StartVmStage<H> {
    #[must_use]
    pub fn new(hypervisor: Arc<H>) -> Self {
        Self { hypervisor }
    }
}

impl<H: Hypervisor> Stage for StartVmStage<H> {
    type Context = RescueContext;
    type Error = OperationError;

    fn status_message(&self) -> &'static str {
        "Starting virtual machine"
    }

    fn commit(&mut self, ctx: &mut RescueContext) -> Result<(), OperationError> {
        let clone = require(&ctx.clone, "dataset clone")?;
        let vm = self.hypervisor.create_vm(&ctx.vm_settings, clone)?;

        // Not committed yet, so rollback will not see this VM.
        if let Err(e) = self.hypervisor.start_vm(&vm) {
            if let Err(destroy) = self.hypervisor.destroy_vm(&vm) {
                warn!(context = %ctx.log, vm = %vm.name, error = %destroy, "failed to remove VM that did not start");
            }
            return Err(e);
        }

        info!(context = %ctx.log, vm = %vm.name, "virtual machine running");
        ctx.vm = Some(vm);
        Ok(())
    }

    fn rollback(&mut self, ctx: &mut RescueContext) -> Result<(), OperationError> {
        if let Some(vm) = ctx.vm.take() {
            self.hypervisor.destroy_vm(&vm)?;
        }
        Ok(())
    }
}

/// Non-critical: a failed push is logged and the rescue still succeeds.
pub struct PublishMetadataStage<M> {
    publisher: Arc<M>,
}

impl<M> PublishMetadataStage<M> {
    #[must_use]
    pub fn new(publisher: Arc<M>) -> Self {
        Self { publisher }
    }
}

impl<M: MetadataPublisher> Stage for PublishMetadataStage<M> {
    type Context = RescueContext;
    type Error = OperationError;

    fn status_message(&self) -> &'static str {
        "Publishing asset metadata"
    }

    fn commit(&mut self, ctx: &mut RescueContext) -> Result<(), OperationError> {
        match self.publisher.publish(&ctx.rescue) {
            Ok(()) => ctx.metadata_published = true,
            Err(e) => warn!(context = %ctx.log, error = %e, "failed to publish asset metadata"),
        }
        Ok(())
    }
}

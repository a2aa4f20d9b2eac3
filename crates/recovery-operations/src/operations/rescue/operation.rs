use std::sync::Arc;

use recovery_core::{
    AssetKey, CloneHandle, CloneSpec, NetworkMode, SnapshotEpoch, VmHandle, VmSettings,
};
use recovery_transaction::Transaction;
use tracing::info;

use super::context::RescueContext;
use super::stages::{
    CloneDatasetStage, CreateRescueAssetStage, HideExcludedFilesStage, PauseSourceStage,
    PublishMetadataStage, RegisterReplicationStage, StartVmStage, TakeInitialSnapshotStage,
};
use crate::Result;
use crate::config::{RecoveryConfig, RescueConfig};
use crate::error::OperationError;
use crate::traits::{AssetService, Hypervisor, MetadataPublisher, ReplicationClient, StorageManager};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RescueInput {
    pub asset: AssetKey,
    pub snapshot: SnapshotEpoch,
    /// Pause backups of the source asset while the rescue runs.
    pub pause_source: bool,
    pub cpu_count: u32,
    pub memory_mib: u64,
    pub network_mode: NetworkMode,
}

impl RescueInput {
    /// Input using the configured VM defaults.
    #[must_use]
    pub fn with_defaults(asset: AssetKey, snapshot: SnapshotEpoch, config: &RescueConfig) -> Self {
        Self {
            asset,
            snapshot,
            pause_source: config.pause_source(),
            cpu_count: config.cpu_count(),
            memory_mib: config.memory_mib(),
            network_mode: config.network_mode(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RescueOutput {
    pub rescue: AssetKey,
    pub clone: CloneHandle,
    pub vm: VmHandle,
    pub initial_snapshot: SnapshotEpoch,
    pub source_paused: bool,
    pub metadata_published: bool,
}

impl TryFrom<RescueContext> for RescueOutput {
    type Error = OperationError;

    fn try_from(ctx: RescueContext) -> Result<Self> {
        Ok(Self {
            clone: ctx
                .clone
                .ok_or(OperationError::MissingStageOutput("dataset clone"))?,
            vm: ctx
                .vm
                .ok_or(OperationError::MissingStageOutput("virtual machine"))?,
            initial_snapshot: ctx
                .initial_snapshot
                .ok_or(OperationError::MissingStageOutput("initial snapshot"))?,
            rescue: ctx.rescue,
            source_paused: ctx.paused_source,
            metadata_published: ctx.metadata_published,
        })
    }
}

/// Boots a virtual machine from a writable clone of a backup snapshot.
pub struct RescueOperation<A, S, R, H, M> {
    config: RecoveryConfig,
    assets: Arc<A>,
    storage: Arc<S>,
    replication: Arc<R>,
    hypervisor: Arc<H>,
    metadata: Arc<M>,
}

impl<A, S, R, H, M> RescueOperation<A, S, R, H, M>
where
    A: AssetService + 'static,
    S: StorageManager + 'static,
    R: ReplicationClient + 'static,
    H: Hypervisor + 'static,
    M: MetadataPublisher + 'static,
{
    pub fn new(
        config: RecoveryConfig,
        assets: Arc<A>,
        storage: Arc<S>,
        replication: Arc<R>,
        hypervisor: Arc<H>,
        metadata: Arc<M>,
    ) -> Self {
        Self {
            config,
            assets,
            storage,
            replication,
            hypervisor,
            metadata,
        }
    }

    /// Validate `input` and assemble the rescue pipeline without running it.
    ///
    /// # Errors
    ///
    /// Returns `OperationError::AssetNotFound` if the source asset is
    /// unknown, or `OperationError::AssetExists` if a rescue of the same
    /// snapshot already exists.
    pub fn build(&self, input: &RescueInput) -> Result<Transaction<RescueContext, OperationError>> {
        if !self.assets.exists(&input.asset)? {
            return Err(OperationError::AssetNotFound(input.asset.clone()));
        }
        let rescue = input.asset.rescue_key(input.snapshot);
        if self.assets.exists(&rescue)? {
            return Err(OperationError::AssetExists(rescue));
        }

        let storage = self.config.storage();
        let clone_spec = CloneSpec {
            source_dataset: storage.dataset_for(&input.asset),
            snapshot: input.snapshot,
            target_dataset: storage.rescue_clone_for(&rescue),
            read_only: false,
        };
        let vm_settings = VmSettings {
            name: rescue.to_string(),
            cpu_count: input.cpu_count,
            memory_mib: input.memory_mib,
            network_mode: input.network_mode,
            disk_dir: self.config.rescue().vm_disk_dir().to_path_buf(),
        };
        let context = RescueContext::new(
            input.asset.clone(),
            input.snapshot,
            clone_spec,
            storage.excluded_paths().to_vec(),
            vm_settings,
        );

        Ok(Transaction::new(context)
            .named(format!("rescue {rescue}"))
            .add_if(
                input.pause_source,
                PauseSourceStage::new(Arc::clone(&self.assets)),
            )
            .add(CloneDatasetStage::new(Arc::clone(&self.storage)))
            .add(CreateRescueAssetStage::new(Arc::clone(&self.assets)))
            .add(HideExcludedFilesStage::new(Arc::clone(&self.storage)))
            .add(RegisterReplicationStage::new(Arc::clone(&self.replication)))
            .add(TakeInitialSnapshotStage::new(Arc::clone(&self.storage)))
            .add(StartVmStage::new(Arc::clone(&self.hypervisor)))
            .add(PublishMetadataStage::new(Arc::clone(&self.metadata))))
    }

    /// Build and run the rescue pipeline.
    ///
    /// # Errors
    ///
    /// Returns the validation errors of [`build`](Self::build), or
    /// `OperationError::StageFailed` after everything created so far has
    /// been rolled back.
    pub fn execute(&self, input: &RescueInput) -> Result<RescueOutput> {
        let context = self.build(input)?.commit()?;
        let output = RescueOutput::try_from(context)?;
        info!(rescue = %output.rescue, vm = %output.vm.name, "rescue VM created");
        Ok(output)
    }
}

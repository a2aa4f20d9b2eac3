use recovery_core::{
    AssetKey, CloneHandle, CloneSpec, LogContext, Operation, SnapshotEpoch, VmHandle, VmSettings,
};

/// State shared by the stages of one rescue VM creation.
///
/// The inputs are fixed when the pipeline is built; every stage records
/// what it created so later stages and compensations can find it.
#[derive(Debug)]
pub struct RescueContext {
    pub(crate) source: AssetKey,
    pub(crate) snapshot: SnapshotEpoch,
    pub(crate) rescue: AssetKey,
    pub(crate) clone_spec: CloneSpec,
    pub(crate) excluded_paths: Vec<String>,
    pub(crate) vm_settings: VmSettings,
    pub(crate) source_log: LogContext,
    pub(crate) log: LogContext,

    pub(crate) paused_source: bool,
    pub(crate) clone: Option<CloneHandle>,
    pub(crate) asset_created: bool,
    pub(crate) replication_registered: bool,
    pub(crate) initial_snapshot: Option<SnapshotEpoch>,
    pub(crate) vm: Option<VmHandle>,
    pub(crate) metadata_published: bool,
}

impl RescueContext {
    pub(crate) fn new(
        source: AssetKey,
        snapshot: SnapshotEpoch,
        clone_spec: CloneSpec,
        excluded_paths: Vec<String>,
        vm_settings: VmSettings,
    ) -> Self {
        let rescue = source.rescue_key(snapshot);
        let source_log = LogContext::new(source.clone(), snapshot, Operation::RescueCreate);
        Self {
            log: source_log.clone(),
            source_log,
            source,
            snapshot,
            rescue,
            clone_spec,
            excluded_paths,
            vm_settings,
            paused_source: false,
            clone: None,
            asset_created: false,
            replication_registered: false,
            initial_snapshot: None,
            vm: None,
            metadata_published: false,
        }
    }

    #[must_use]
    pub fn source(&self) -> &AssetKey {
        &self.source
    }

    #[must_use]
    pub fn snapshot(&self) -> SnapshotEpoch {
        self.snapshot
    }

    #[must_use]
    pub fn rescue(&self) -> &AssetKey {
        &self.rescue
    }

    /// Logging fields for the asset currently being worked on.
    #[must_use]
    pub fn log(&self) -> &LogContext {
        &self.log
    }

    #[must_use]
    pub fn clone_handle(&self) -> Option<&CloneHandle> {
        self.clone.as_ref()
    }

    #[must_use]
    pub fn vm(&self) -> Option<&VmHandle> {
        self.vm.as_ref()
    }

    #[must_use]
    pub fn source_paused(&self) -> bool {
        self.paused_source
    }
}

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use recovery_core::{
    AssetKey, CloneHandle, CloneSpec, ImageType, RestoreKind, RestoreRecord, SnapshotEpoch,
    UsbDrive, VmHandle, VmSettings,
};

use crate::Result;
use crate::error::OperationError;
use crate::traits::{
    AssetService, CancellationMarker, CommandOutput, CommandRunner, ExportLock, Hypervisor,
    ImageExporter, MetadataPublisher, RemovableMedia, ReplicationClient, RescueAssetSpec,
    RestoreStore, StorageManager, render_command,
};

/// Ordered record of collaborator calls shared by all mocks of one test,
/// with per-call failure injection.
#[derive(Default)]
pub struct Journal {
    events: Mutex<Vec<String>>,
    failures: Mutex<HashSet<String>>,
}

impl Journal {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every future call named `call` fail after being recorded.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn fail_on(&self, call: &str) {
        self.failures
            .lock()
            .expect("lock poisoned")
            .insert(call.to_string());
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn events(&self) -> Vec<String> {
        self.events.lock().expect("lock poisoned").clone()
    }

    #[must_use]
    pub fn contains(&self, call: &str) -> bool {
        self.events().iter().any(|event| event == call)
    }

    fn record(&self, call: &str) -> Result<()> {
        self.events
            .lock()
            .expect("lock poisoned")
            .push(call.to_string());
        if self.failures.lock().expect("lock poisoned").contains(call) {
            return Err(OperationError::CommandFailed {
                command: call.to_string(),
                status: Some(1),
                stderr: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

/// Command runner answering from prefix-matched rules; unmatched commands
/// succeed with empty output.
pub struct MockCommandRunner {
    rules: Vec<(String, CommandOutput)>,
    calls: Mutex<Vec<String>>,
}

impl MockCommandRunner {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_stdout(mut self, prefix: &str, stdout: &str) -> Self {
        self.rules.push((
            prefix.to_string(),
            CommandOutput {
                status: Some(0),
                stdout: stdout.to_string(),
                stderr: String::new(),
            },
        ));
        self
    }

    #[must_use]
    pub fn with_failure(mut self, prefix: &str, stderr: &str) -> Self {
        self.rules.push((
            prefix.to_string(),
            CommandOutput {
                status: Some(1),
                stdout: String::new(),
                stderr: stderr.to_string(),
            },
        ));
        self
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("lock poisoned").clone()
    }
}

impl Default for MockCommandRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner for MockCommandRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        let command = render_command(program, args);
        self.calls
            .lock()
            .expect("lock poisoned")
            .push(command.clone());
        Ok(self
            .rules
            .iter()
            .find(|(prefix, _)| command.starts_with(prefix.as_str()))
            .map_or_else(
                || CommandOutput {
                    status: Some(0),
                    ..CommandOutput::default()
                },
                |(_, output)| output.clone(),
            ))
    }
}

pub struct MockAssetService {
    journal: Arc<Journal>,
    known: Mutex<HashSet<AssetKey>>,
    paused: Mutex<HashSet<AssetKey>>,
}

impl MockAssetService {
    #[must_use]
    pub fn new(journal: Arc<Journal>) -> Self {
        Self {
            journal,
            known: Mutex::new(HashSet::new()),
            paused: Mutex::new(HashSet::new()),
        }
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn with_asset(self, asset: &AssetKey) -> Self {
        self.known.lock().expect("lock poisoned").insert(asset.clone());
        self
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn with_paused_asset(self, asset: &AssetKey) -> Self {
        self.paused
            .lock()
            .expect("lock poisoned")
            .insert(asset.clone());
        self.with_asset(asset)
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn paused(&self, asset: &AssetKey) -> bool {
        self.paused.lock().expect("lock poisoned").contains(asset)
    }
}

impl AssetService for MockAssetService {
    fn exists(&self, asset: &AssetKey) -> Result<bool> {
        Ok(self.known.lock().expect("lock poisoned").contains(asset))
    }

    fn is_paused(&self, asset: &AssetKey) -> Result<bool> {
        Ok(self.paused(asset))
    }

    fn set_paused(&self, asset: &AssetKey, paused: bool) -> Result<()> {
        self.journal
            .record(if paused { "assets.pause" } else { "assets.unpause" })?;
        let mut set = self.paused.lock().expect("lock poisoned");
        if paused {
            set.insert(asset.clone());
        } else {
            set.remove(asset);
        }
        Ok(())
    }

    fn create_rescue_asset(&self, spec: &RescueAssetSpec) -> Result<()> {
        self.journal.record("assets.create_rescue")?;
        self.known
            .lock()
            .expect("lock poisoned")
            .insert(spec.key.clone());
        Ok(())
    }

    fn destroy_asset(&self, asset: &AssetKey) -> Result<()> {
        self.journal.record("assets.destroy")?;
        self.known.lock().expect("lock poisoned").remove(asset);
        Ok(())
    }
}

pub struct MockStorage {
    journal: Arc<Journal>,
    clones: Mutex<Vec<CloneSpec>>,
}

impl MockStorage {
    #[must_use]
    pub fn new(journal: Arc<Journal>) -> Self {
        Self {
            journal,
            clones: Mutex::new(Vec::new()),
        }
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn clones(&self) -> Vec<CloneSpec> {
        self.clones.lock().expect("lock poisoned").clone()
    }
}

impl StorageManager for MockStorage {
    fn create_clone(&self, spec: &CloneSpec) -> Result<CloneHandle> {
        self.journal.record("storage.create_clone")?;
        self.clones
            .lock()
            .expect("lock poisoned")
            .push(spec.clone());
        Ok(CloneHandle {
            dataset: spec.target_dataset.clone(),
            mountpoint: Path::new("/mnt").join(&spec.target_dataset),
        })
    }

    fn destroy_clone(&self, _clone: &CloneHandle) -> Result<()> {
        self.journal.record("storage.destroy_clone")
    }

    fn take_snapshot(&self, _dataset: &str) -> Result<SnapshotEpoch> {
        self.journal.record("storage.snapshot")?;
        SnapshotEpoch::new(1_800_000_000).map_err(OperationError::from)
    }

    fn hide_files(&self, _clone: &CloneHandle, patterns: &[String]) -> Result<usize> {
        self.journal.record("storage.hide_files")?;
        Ok(patterns.len())
    }
}

pub struct MockHypervisor {
    journal: Arc<Journal>,
}

impl MockHypervisor {
    #[must_use]
    pub fn new(journal: Arc<Journal>) -> Self {
        Self { journal }
    }
}

impl Hypervisor for MockHypervisor {
    fn create_vm(&self, settings: &VmSettings, _clone: &CloneHandle) -> Result<VmHandle> {
        self.journal.record("vm.create")?;
        Ok(VmHandle {
            name: settings.name.clone(),
        })
    }

    fn start_vm(&self, _vm: &VmHandle) -> Result<()> {
        self.journal.record("vm.start")
    }

    fn destroy_vm(&self, _vm: &VmHandle) -> Result<()> {
        self.journal.record("vm.destroy")
    }
}

pub struct MockReplication {
    journal: Arc<Journal>,
}

impl MockReplication {
    #[must_use]
    pub fn new(journal: Arc<Journal>) -> Self {
        Self { journal }
    }
}

impl ReplicationClient for MockReplication {
    fn register(&self, _asset: &AssetKey, _dataset: &str) -> Result<()> {
        self.journal.record("replication.register")
    }

    fn deregister(&self, _asset: &AssetKey) -> Result<()> {
        self.journal.record("replication.deregister")
    }
}

impl MetadataPublisher for MockReplication {
    fn publish(&self, _asset: &AssetKey) -> Result<()> {
        self.journal.record("metadata.publish")
    }
}

pub struct MockRemovableMedia {
    journal: Arc<Journal>,
    drive: Option<UsbDrive>,
}

impl MockRemovableMedia {
    #[must_use]
    pub fn new(journal: Arc<Journal>) -> Self {
        Self {
            journal,
            drive: Some(UsbDrive {
                device: PathBuf::from("/dev/sdc"),
                size_bytes: 64 * 1024 * 1024 * 1024,
                model: Some("Ultra Fit".to_string()),
            }),
        }
    }

    #[must_use]
    pub fn without_drive(mut self) -> Self {
        self.drive = None;
        self
    }
}

impl RemovableMedia for MockRemovableMedia {
    fn find_drive(&self) -> Result<Option<UsbDrive>> {
        self.journal.record("usb.find")?;
        Ok(self.drive.clone())
    }

    fn format(&self, _drive: &UsbDrive, _label: &str) -> Result<()> {
        self.journal.record("usb.format")
    }

    fn mount(&self, _drive: &UsbDrive, _mountpoint: &Path) -> Result<()> {
        self.journal.record("usb.mount")
    }

    fn unmount(&self, _mountpoint: &Path) -> Result<()> {
        self.journal.record("usb.unmount")
    }
}

pub struct MockImageExporter {
    journal: Arc<Journal>,
    shares: Mutex<Vec<(String, PathBuf)>>,
}

impl MockImageExporter {
    #[must_use]
    pub fn new(journal: Arc<Journal>) -> Self {
        Self {
            journal,
            shares: Mutex::new(Vec::new()),
        }
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn shares(&self) -> Vec<(String, PathBuf)> {
        self.shares.lock().expect("lock poisoned").clone()
    }
}

impl ImageExporter for MockImageExporter {
    fn create_overlay(&self, _source: &Path, _overlay: &Path) -> Result<()> {
        self.journal.record("image.create_overlay")
    }

    fn remove_overlay(&self, _overlay: &Path) -> Result<()> {
        self.journal.record("image.remove_overlay")
    }

    fn convert(
        &self,
        _source: &Path,
        image_type: ImageType,
        output_dir: &Path,
    ) -> Result<Vec<PathBuf>> {
        self.journal.record("image.convert")?;
        Ok(vec![
            output_dir.join(format!("disk0.{}", image_type.extension())),
        ])
    }

    fn copy(&self, files: &[PathBuf], destination: &Path) -> Result<Vec<PathBuf>> {
        self.journal.record("image.copy")?;
        Ok(files
            .iter()
            .filter_map(|file| file.file_name().map(|name| destination.join(name)))
            .collect())
    }

    fn remove_files(&self, _files: &[PathBuf]) -> Result<()> {
        self.journal.record("image.remove_files")
    }

    fn create_share(&self, name: &str, path: &Path) -> Result<()> {
        self.journal.record("share.create")?;
        self.shares
            .lock()
            .expect("lock poisoned")
            .push((name.to_string(), path.to_path_buf()));
        Ok(())
    }

    fn remove_share(&self, _name: &str) -> Result<()> {
        self.journal.record("share.remove")
    }
}

pub struct MockExportLock {
    journal: Arc<Journal>,
    held: Mutex<HashSet<(AssetKey, SnapshotEpoch)>>,
}

impl MockExportLock {
    #[must_use]
    pub fn new(journal: Arc<Journal>) -> Self {
        Self {
            journal,
            held: Mutex::new(HashSet::new()),
        }
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn is_held(&self, asset: &AssetKey, snapshot: SnapshotEpoch) -> bool {
        self.held
            .lock()
            .expect("lock poisoned")
            .contains(&(asset.clone(), snapshot))
    }
}

impl ExportLock for MockExportLock {
    fn acquire(&self, asset: &AssetKey, snapshot: SnapshotEpoch) -> Result<()> {
        self.journal.record("lock.acquire")?;
        if !self
            .held
            .lock()
            .expect("lock poisoned")
            .insert((asset.clone(), snapshot))
        {
            return Err(OperationError::ExportLocked {
                asset: asset.clone(),
                snapshot,
            });
        }
        Ok(())
    }

    fn release(&self, asset: &AssetKey, snapshot: SnapshotEpoch) -> Result<()> {
        self.journal.record("lock.release")?;
        self.held
            .lock()
            .expect("lock poisoned")
            .remove(&(asset.clone(), snapshot));
        Ok(())
    }
}

pub struct MockRestoreStore {
    journal: Arc<Journal>,
    records: Mutex<Vec<RestoreRecord>>,
}

impl MockRestoreStore {
    #[must_use]
    pub fn new(journal: Arc<Journal>) -> Self {
        Self {
            journal,
            records: Mutex::new(Vec::new()),
        }
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn with_rescue(self, asset: &AssetKey, snapshot: SnapshotEpoch) -> Self {
        self.records.lock().expect("lock poisoned").push(RestoreRecord {
            asset: asset.clone(),
            snapshot,
            kind: RestoreKind::Rescue,
            image_type: None,
            target: None,
            created_at: Utc::now(),
        });
        self
    }
}

impl RestoreStore for MockRestoreStore {
    fn add(&self, record: &RestoreRecord) -> Result<()> {
        self.journal.record("restores.add")?;
        let mut records = self.records.lock().expect("lock poisoned");
        if records.iter().any(|r| r.same_restore(record)) {
            return Err(OperationError::RestoreExists {
                asset: record.asset.clone(),
                snapshot: record.snapshot,
            });
        }
        records.push(record.clone());
        Ok(())
    }

    fn remove(
        &self,
        asset: &AssetKey,
        snapshot: SnapshotEpoch,
        kind: RestoreKind,
    ) -> Result<bool> {
        self.journal.record("restores.remove")?;
        let mut records = self.records.lock().expect("lock poisoned");
        let before = records.len();
        records.retain(|r| !(r.asset == *asset && r.snapshot == snapshot && r.kind == kind));
        Ok(records.len() != before)
    }

    fn list(&self) -> Result<Vec<RestoreRecord>> {
        Ok(self.records.lock().expect("lock poisoned").clone())
    }
}

/// Cancellation marker that reports a request after `request_cancel`, or
/// once it has been polled a scripted number of times.
pub struct MockCancellationMarker {
    journal: Arc<Journal>,
    requested: AtomicBool,
    polls: AtomicUsize,
    cancel_after: Option<usize>,
}

impl MockCancellationMarker {
    #[must_use]
    pub fn new(journal: Arc<Journal>) -> Self {
        Self {
            journal,
            requested: AtomicBool::new(false),
            polls: AtomicUsize::new(0),
            cancel_after: None,
        }
    }

    /// Report cancellation from the `polls + 1`-th poll on.
    #[must_use]
    pub fn cancel_after_polls(mut self, polls: usize) -> Self {
        self.cancel_after = Some(polls);
        self
    }

    #[must_use]
    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

impl CancellationMarker for MockCancellationMarker {
    fn request_cancel(&self, _asset: &AssetKey, _snapshot: SnapshotEpoch) -> Result<()> {
        self.journal.record("marker.request")?;
        self.requested.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_cancel_requested(&self, _asset: &AssetKey, _snapshot: SnapshotEpoch) -> bool {
        let seen = self.polls.fetch_add(1, Ordering::SeqCst);
        self.is_requested() || self.cancel_after.is_some_and(|after| seen >= after)
    }

    fn clear(&self, _asset: &AssetKey, _snapshot: SnapshotEpoch) -> Result<()> {
        self.journal.record("marker.clear")?;
        self.requested.store(false, Ordering::SeqCst);
        Ok(())
    }
}

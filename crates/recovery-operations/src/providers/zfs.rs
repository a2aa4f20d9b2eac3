use std::fs;
use std::path::PathBuf;

use chrono::Utc;
use recovery_core::{CloneHandle, CloneSpec, SnapshotEpoch};
use tracing::debug;

use crate::Result;
use crate::error::OperationError;
use crate::traits::{CommandRunner, StorageManager};

const HIDDEN_SUFFIX: &str = ".recovery-hidden";

/// Storage backed by the `zfs` command line tool.
pub struct ZfsStorage<R> {
    runner: R,
}

impl<R: CommandRunner> ZfsStorage<R> {
    #[must_use]
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    fn mountpoint(&self, dataset: &str) -> Result<PathBuf> {
        let output = self
            .runner
            .run_checked("zfs", &["get", "-H", "-o", "value", "mountpoint", dataset])?;
        let value = output.stdout.trim();
        if value.is_empty() || value == "none" || value == "legacy" {
            return Err(OperationError::UnexpectedOutput {
                command: format!("zfs get mountpoint {dataset}"),
                reason: format!("dataset has no usable mountpoint ('{value}')"),
            });
        }
        Ok(PathBuf::from(value))
    }
}

impl<R: CommandRunner> StorageManager for ZfsStorage<R> {
    fn create_clone(&self, spec: &CloneSpec) -> Result<CloneHandle> {
        let snapshot = spec.snapshot_name();
        let mut args = vec!["clone", "-p"];
        if spec.read_only {
            args.extend(["-o", "readonly=on"]);
        }
        args.extend([snapshot.as_str(), spec.target_dataset.as_str()]);
        self.runner.run_checked("zfs", &args)?;

        let mountpoint = self.mountpoint(&spec.target_dataset)?;
        debug!(
            snapshot = %snapshot,
            clone = %spec.target_dataset,
            mountpoint = %mountpoint.display(),
            "created clone"
        );
        Ok(CloneHandle {
            dataset: spec.target_dataset.clone(),
            mountpoint,
        })
    }

    fn destroy_clone(&self, clone: &CloneHandle) -> Result<()> {
        self.runner
            .run_checked("zfs", &["destroy", "-r", &clone.dataset])?;
        Ok(())
    }

    fn take_snapshot(&self, dataset: &str) -> Result<SnapshotEpoch> {
        let epoch = SnapshotEpoch::new(Utc::now().timestamp())?;
        let name = format!("{dataset}@{epoch}");
        self.runner.run_checked("zfs", &["snapshot", &name])?;
        Ok(epoch)
    }

    fn hide_files(&self, clone: &CloneHandle, patterns: &[String]) -> Result<usize> {
        let mut hidden = 0;
        for pattern in patterns {
            let path = clone.mountpoint.join(pattern);
            if !path.exists() {
                continue;
            }
            let mut target = path.clone().into_os_string();
            target.push(HIDDEN_SUFFIX);
            fs::rename(&path, &target)?;
            debug!(path = %path.display(), "hid file in clone");
            hidden += 1;
        }
        Ok(hidden)
    }
}

use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::asset::SnapshotEpoch;

/// Request to clone a dataset at a given snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneSpec {
    pub source_dataset: String,
    pub snapshot: SnapshotEpoch,
    pub target_dataset: String,
    pub read_only: bool,
}

impl CloneSpec {
    /// Fully qualified name of the snapshot being cloned.
    #[must_use]
    pub fn snapshot_name(&self) -> String {
        format!("{}@{}", self.source_dataset, self.snapshot)
    }
}

/// A clone that exists on the storage pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneHandle {
    pub dataset: String,
    pub mountpoint: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum NetworkMode {
    /// No network interface attached.
    None,
    #[default]
    Nat,
    Bridged,
}

/// Settings of a virtual machine booted from a clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmSettings {
    pub name: String,
    pub cpu_count: u32,
    pub memory_mib: u64,
    pub network_mode: NetworkMode,
    pub disk_dir: PathBuf,
}

/// A VM registered with the hypervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmHandle {
    pub name: String,
}

/// A removable drive suitable as an export destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsbDrive {
    pub device: PathBuf,
    pub size_bytes: u64,
    pub model: Option<String>,
}

impl UsbDrive {
    /// Path of the first partition on the drive.
    #[must_use]
    pub fn partition(&self) -> PathBuf {
        let mut device = self.device.clone().into_os_string();
        device.push("1");
        PathBuf::from(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_name_joins_dataset_and_epoch() -> crate::Result<()> {
        let spec = CloneSpec {
            source_dataset: "homePool/home/agents/web01".to_string(),
            snapshot: SnapshotEpoch::new(1_700_000_000)?,
            target_dataset: "homePool/web01-rescue".to_string(),
            read_only: false,
        };

        assert_eq!(
            spec.snapshot_name(),
            "homePool/home/agents/web01@1700000000"
        );
        Ok(())
    }

    #[test]
    fn usb_partition_appends_number() {
        let drive = UsbDrive {
            device: PathBuf::from("/dev/sdc"),
            size_bytes: 64 * 1024 * 1024 * 1024,
            model: None,
        };

        assert_eq!(drive.partition(), PathBuf::from("/dev/sdc1"));
    }
}

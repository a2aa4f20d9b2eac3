use std::fs;
use std::path::{Path, PathBuf};

use recovery_core::{AssetKey, NetworkMode, SnapshotEpoch};
use serde::Deserialize;

use crate::Result;
use crate::error::OperationError;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/recovery/recovery.toml";

/// Appliance configuration.
/// File: `/etc/recovery/recovery.toml`
/// Format:
/// ```toml
/// [storage]
/// agents_dataset = "homePool/home/agents"
/// excluded_paths = ["pagefile.sys", "hiberfil.sys"]
///
/// [rescue]
/// memory_mib = 8192
///
/// [export]
/// usb_label = "RECOVERY"
/// ```
///
/// Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecoveryConfig {
    storage: StorageConfig,
    rescue: RescueConfig,
    export: ExportConfig,
    commands: CommandsConfig,
}

impl RecoveryConfig {
    /// Load from `path`, falling back to defaults if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns `OperationError::ConfigRead` if the file exists but cannot be
    /// read, or `OperationError::ConfigParse` if it is not valid TOML for
    /// this schema.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no configuration file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| OperationError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| OperationError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    #[must_use]
    pub fn storage(&self) -> &StorageConfig {
        &self.storage
    }

    #[must_use]
    pub fn rescue(&self) -> &RescueConfig {
        &self.rescue
    }

    #[must_use]
    pub fn export(&self) -> &ExportConfig {
        &self.export
    }

    #[must_use]
    pub fn commands(&self) -> &CommandsConfig {
        &self.commands
    }

    /// Point every state and staging directory below `root`.
    #[must_use]
    pub fn with_state_root(mut self, root: &Path) -> Self {
        self.export = ExportConfig::rooted_at(root);
        self.rescue.vm_disk_dir = root.join("vms");
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    agents_dataset: String,
    rescue_dataset: String,
    export_dataset: String,
    excluded_paths: Vec<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            agents_dataset: String::from("homePool/home/agents"),
            rescue_dataset: String::from("homePool/home/rescue"),
            export_dataset: String::from("homePool/home/exports"),
            excluded_paths: vec![String::from("pagefile.sys"), String::from("hiberfil.sys")],
        }
    }
}

impl StorageConfig {
    /// Dataset holding the backups of `asset`.
    #[must_use]
    pub fn dataset_for(&self, asset: &AssetKey) -> String {
        format!("{}/{}", self.agents_dataset, asset)
    }

    /// Writable clone a rescue VM boots from.
    #[must_use]
    pub fn rescue_clone_for(&self, rescue: &AssetKey) -> String {
        format!("{}/{}", self.rescue_dataset, rescue)
    }

    /// Read-only clone an export reads from.
    #[must_use]
    pub fn export_clone_for(&self, asset: &AssetKey, snapshot: SnapshotEpoch) -> String {
        format!("{}/{}-{}", self.export_dataset, asset, snapshot)
    }

    #[must_use]
    pub fn excluded_paths(&self) -> &[String] {
        &self.excluded_paths
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RescueConfig {
    cpu_count: u32,
    memory_mib: u64,
    network_mode: NetworkMode,
    pause_source: bool,
    vm_disk_dir: PathBuf,
}

impl Default for RescueConfig {
    fn default() -> Self {
        Self {
            cpu_count: 2,
            memory_mib: 4096,
            network_mode: NetworkMode::default(),
            pause_source: true,
            vm_disk_dir: PathBuf::from("/var/lib/recovery/vms"),
        }
    }
}

impl RescueConfig {
    #[must_use]
    pub fn cpu_count(&self) -> u32 {
        self.cpu_count
    }

    #[must_use]
    pub fn memory_mib(&self) -> u64 {
        self.memory_mib
    }

    #[must_use]
    pub fn network_mode(&self) -> NetworkMode {
        self.network_mode
    }

    #[must_use]
    pub fn pause_source(&self) -> bool {
        self.pause_source
    }

    #[must_use]
    pub fn vm_disk_dir(&self) -> &Path {
        &self.vm_disk_dir
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    state_dir: PathBuf,
    staging_dir: PathBuf,
    overlay_dir: PathBuf,
    usb_mount_point: PathBuf,
    usb_label: String,
    share_root: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            usb_mount_point: PathBuf::from("/mnt/recovery-usb"),
            usb_label: String::from("RECOVERY"),
            share_root: PathBuf::from("/srv/exports"),
            ..Self::rooted_at(Path::new("/var/lib/recovery"))
        }
    }
}

impl ExportConfig {
    fn rooted_at(root: &Path) -> Self {
        Self {
            state_dir: root.join("state"),
            staging_dir: root.join("staging"),
            overlay_dir: root.join("overlay"),
            usb_mount_point: root.join("usb"),
            usb_label: String::from("RECOVERY"),
            share_root: root.join("shares"),
        }
    }

    /// Directory holding the asset registry and export bookkeeping.
    #[must_use]
    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    #[must_use]
    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    #[must_use]
    pub fn overlay_dir(&self) -> &Path {
        &self.overlay_dir
    }

    #[must_use]
    pub fn usb_mount_point(&self) -> &Path {
        &self.usb_mount_point
    }

    #[must_use]
    pub fn usb_label(&self) -> &str {
        &self.usb_label
    }

    #[must_use]
    pub fn share_root(&self) -> &Path {
        &self.share_root
    }
}

/// Programs used for the collaborators that have no standard tool.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CommandsConfig {
    replication: String,
    metadata: String,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            replication: String::from("replicationctl"),
            metadata: String::from("assetmeta"),
        }
    }
}

impl CommandsConfig {
    #[must_use]
    pub fn replication(&self) -> &str {
        &self.replication
    }

    #[must_use]
    pub fn metadata(&self) -> &str {
        &self.metadata
    }
}

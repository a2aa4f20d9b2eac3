mod export;
mod rescue;

use clap::{Args, Subcommand};
use recovery_core::{AssetKey, ExportTarget, ImageType, NetworkMode, SnapshotEpoch};
use recovery_operations::RecoveryConfig;

use crate::error::Result;

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Boot a virtual machine from a backup snapshot
    #[command(subcommand)]
    Rescue(RescueCommand),
    /// Export a backup snapshot as portable disk images
    #[command(subcommand)]
    Export(ExportCommand),
}

#[derive(Subcommand)]
pub(crate) enum RescueCommand {
    /// Create a rescue VM
    Create(RescueCreateArgs),
}

#[derive(Args)]
pub(crate) struct RescueCreateArgs {
    /// Protected asset to rescue
    pub asset: AssetKey,

    /// Snapshot epoch to boot from
    pub snapshot: SnapshotEpoch,

    /// Leave backups of the source asset running
    #[arg(long)]
    pub no_pause: bool,

    /// Virtual CPUs (default from configuration)
    #[arg(long)]
    pub cpus: Option<u32>,

    /// Memory in MiB (default from configuration)
    #[arg(long)]
    pub memory: Option<u64>,

    /// Network attachment (default from configuration)
    #[arg(long, value_enum)]
    pub network: Option<NetworkMode>,
}

#[derive(Subcommand)]
pub(crate) enum ExportCommand {
    /// Export a snapshot
    Create(ExportCreateArgs),
    /// Ask a running export to stop
    Cancel(ExportSlotArgs),
    /// List exports on this appliance
    Status,
}

#[derive(Args)]
pub(crate) struct ExportCreateArgs {
    /// Protected asset to export
    pub asset: AssetKey,

    /// Snapshot epoch to export
    pub snapshot: SnapshotEpoch,

    /// Disk image format
    #[arg(long = "format", value_enum, default_value_t = ImageType::Vhdx)]
    pub image_type: ImageType,

    /// Where the images are delivered
    #[arg(long, value_enum, default_value_t)]
    pub target: ExportTarget,
}

#[derive(Args)]
pub(crate) struct ExportSlotArgs {
    pub asset: AssetKey,
    pub snapshot: SnapshotEpoch,
}

impl Commands {
    pub(crate) fn execute(self, config: &RecoveryConfig) -> Result<()> {
        match self {
            Self::Rescue(RescueCommand::Create(args)) => rescue::create(args, config),
            Self::Export(ExportCommand::Create(args)) => export::create(args, config),
            Self::Export(ExportCommand::Cancel(args)) => export::cancel(&args, config),
            Self::Export(ExportCommand::Status) => export::status(config),
        }
    }
}

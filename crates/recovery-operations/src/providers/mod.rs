mod asset_registry;
mod block_device;
mod command;
mod disk;
mod export_state;
mod qemu;
mod replication;
mod state_file;
mod virsh;
mod zfs;

pub use asset_registry::FileAssetRegistry;
pub use block_device::BlockDeviceMedia;
pub use command::SystemCommandRunner;
pub use export_state::{FileCancellationMarker, FileExportLock, FileRestoreStore};
pub use qemu::QemuImageExporter;
pub use replication::{CommandMetadataPublisher, ReplicationCtl};
pub use virsh::VirshHypervisor;
pub use zfs::ZfsStorage;

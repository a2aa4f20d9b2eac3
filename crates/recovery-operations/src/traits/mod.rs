mod asset_service;
mod command_runner;
mod export_state;
mod hypervisor;
mod image_exporter;
mod removable_media;
mod replication;
mod storage;

pub use asset_service::{AssetService, RescueAssetSpec};
pub use command_runner::{CommandOutput, CommandRunner};
pub(crate) use command_runner::render_command;
pub use export_state::{CancellationMarker, ExportLock, RestoreStore};
pub use hypervisor::Hypervisor;
pub use image_exporter::ImageExporter;
pub use removable_media::RemovableMedia;
pub use replication::{MetadataPublisher, ReplicationClient};
pub use storage::StorageManager;

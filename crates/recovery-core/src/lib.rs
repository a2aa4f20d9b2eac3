pub mod asset;
pub mod error;
pub mod image;
mod log;
pub mod resources;
pub mod restore;

pub use asset::{AssetKey, SnapshotEpoch};
pub use error::*;
pub use image::{ExportTarget, ImageType};
pub use log::{LogContext, Operation};
pub use resources::{CloneHandle, CloneSpec, NetworkMode, UsbDrive, VmHandle, VmSettings};
pub use restore::{RestoreKind, RestoreRecord};

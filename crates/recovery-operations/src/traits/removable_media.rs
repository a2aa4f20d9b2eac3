use std::path::Path;

use recovery_core::UsbDrive;

use crate::Result;

pub trait RemovableMedia: Send + Sync {
    /// Locate the single attached removable drive, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if block devices cannot be listed or more than one
    /// candidate drive is attached.
    fn find_drive(&self) -> Result<Option<UsbDrive>>;

    /// Partition and format the drive, destroying its contents.
    ///
    /// # Errors
    ///
    /// Returns an error if partitioning or formatting fails.
    fn format(&self, drive: &UsbDrive, label: &str) -> Result<()>;

    /// # Errors
    ///
    /// Returns an error if the drive cannot be mounted.
    fn mount(&self, drive: &UsbDrive, mountpoint: &Path) -> Result<()>;

    /// # Errors
    ///
    /// Returns an error if the mountpoint cannot be unmounted.
    fn unmount(&self, mountpoint: &Path) -> Result<()>;
}

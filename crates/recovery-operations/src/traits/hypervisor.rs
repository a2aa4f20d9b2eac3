use recovery_core::{CloneHandle, VmHandle, VmSettings};

use crate::Result;

pub trait Hypervisor: Send + Sync {
    /// Define a VM whose disks live on `clone`.
    ///
    /// # Errors
    ///
    /// Returns an error if the VM cannot be defined.
    fn create_vm(&self, settings: &VmSettings, clone: &CloneHandle) -> Result<VmHandle>;

    /// # Errors
    ///
    /// Returns an error if the VM does not boot.
    fn start_vm(&self, vm: &VmHandle) -> Result<()>;

    /// Stop the VM if running and remove its definition.
    ///
    /// # Errors
    ///
    /// Returns an error if the VM cannot be removed.
    fn destroy_vm(&self, vm: &VmHandle) -> Result<()>;
}

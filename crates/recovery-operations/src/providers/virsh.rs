use std::fs;

use recovery_core::{CloneHandle, NetworkMode, VmHandle, VmSettings};
use tracing::{debug, warn};

use super::disk::disk_images;
use crate::Result;
use crate::traits::{CommandRunner, Hypervisor};

/// libvirt hypervisor driven through `virt-install` and `virsh`.
pub struct VirshHypervisor<R> {
    runner: R,
}

impl<R: CommandRunner> VirshHypervisor<R> {
    #[must_use]
    pub fn new(runner: R) -> Self {
        Self { runner }
    }
}

fn network_arg(mode: NetworkMode) -> &'static str {
    match mode {
        NetworkMode::None => "none",
        NetworkMode::Nat => "network=default",
        NetworkMode::Bridged => "bridge=br0",
    }
}

impl<R: CommandRunner> Hypervisor for VirshHypervisor<R> {
    fn create_vm(&self, settings: &VmSettings, clone: &CloneHandle) -> Result<VmHandle> {
        let vcpus = settings.cpu_count.to_string();
        let memory = settings.memory_mib.to_string();
        let disks: Vec<String> = disk_images(&clone.mountpoint)?
            .iter()
            .map(|path| format!("path={},bus=sata", path.display()))
            .collect();

        let mut args = vec![
            "--name",
            settings.name.as_str(),
            "--vcpus",
            vcpus.as_str(),
            "--memory",
            memory.as_str(),
            "--import",
            "--os-variant",
            "generic",
            "--network",
            network_arg(settings.network_mode),
            "--graphics",
            "vnc",
            "--print-xml",
        ];
        for disk in &disks {
            args.extend(["--disk", disk.as_str()]);
        }
        let xml = self.runner.run_checked("virt-install", &args)?.stdout;

        fs::create_dir_all(&settings.disk_dir)?;
        let definition = settings.disk_dir.join(format!("{}.xml", settings.name));
        fs::write(&definition, xml)?;

        let definition = definition.display().to_string();
        self.runner.run_checked("virsh", &["define", &definition])?;
        debug!(vm = %settings.name, disks = disks.len(), "defined virtual machine");

        Ok(VmHandle {
            name: settings.name.clone(),
        })
    }

    fn start_vm(&self, vm: &VmHandle) -> Result<()> {
        self.runner.run_checked("virsh", &["start", &vm.name])?;
        Ok(())
    }

    fn destroy_vm(&self, vm: &VmHandle) -> Result<()> {
        // Fails when the domain is not running, which is fine here.
        let stopped = self.runner.run("virsh", &["destroy", &vm.name])?;
        if !stopped.success() {
            warn!(vm = %vm.name, stderr = %stopped.stderr.trim(), "virsh destroy failed");
        }
        self.runner
            .run_checked("virsh", &["undefine", &vm.name, "--nvram"])?;
        Ok(())
    }
}

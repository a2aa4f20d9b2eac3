use std::fs;
use std::path::{Path, PathBuf};

use recovery_core::UsbDrive;
use tracing::debug;

use crate::Result;
use crate::error::OperationError;
use crate::traits::{CommandRunner, RemovableMedia};

const LSBLK_ARGS: &[&str] = &["-d", "-b", "-n", "-P", "-o", "NAME,SIZE,RM,TRAN,MODEL"];

/// USB drives handled through `lsblk`, `parted`, `mkfs.exfat` and `mount`.
pub struct BlockDeviceMedia<R> {
    runner: R,
}

impl<R: CommandRunner> BlockDeviceMedia<R> {
    #[must_use]
    pub fn new(runner: R) -> Self {
        Self { runner }
    }
}

/// Parse one `KEY="value"` line of `lsblk -P` output.
fn parse_pairs(line: &str) -> Vec<(&str, &str)> {
    let mut pairs = Vec::new();
    let mut rest = line.trim();
    while let Some((key, tail)) = rest.split_once("=\"") {
        let Some((value, tail)) = tail.split_once('"') else {
            break;
        };
        pairs.push((key.trim(), value));
        rest = tail;
    }
    pairs
}

fn parse_drive(line: &str) -> Option<UsbDrive> {
    let pairs = parse_pairs(line);
    let field = |name: &str| {
        pairs
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| *value)
    };

    if field("TRAN")? != "usb" || field("RM")? != "1" {
        return None;
    }
    let model = field("MODEL")
        .map(str::trim)
        .filter(|model| !model.is_empty())
        .map(String::from);

    Some(UsbDrive {
        device: PathBuf::from("/dev").join(field("NAME")?),
        size_bytes: field("SIZE")?.parse().ok()?,
        model,
    })
}

impl<R: CommandRunner> RemovableMedia for BlockDeviceMedia<R> {
    fn find_drive(&self) -> Result<Option<UsbDrive>> {
        let output = self.runner.run_checked("lsblk", LSBLK_ARGS)?;
        let mut drives: Vec<UsbDrive> = output.stdout.lines().filter_map(parse_drive).collect();

        match drives.len() {
            0 => Ok(None),
            1 => Ok(drives.pop()),
            _ => Err(OperationError::AmbiguousUsbDrive {
                devices: drives
                    .iter()
                    .map(|drive| drive.device.display().to_string())
                    .collect(),
            }),
        }
    }

    fn format(&self, drive: &UsbDrive, label: &str) -> Result<()> {
        let device = drive.device.display().to_string();
        let partition = drive.partition().display().to_string();

        self.runner.run_checked(
            "parted",
            &["-s", &device, "mklabel", "gpt", "mkpart", "primary", "0%", "100%"],
        )?;
        self.runner
            .run_checked("mkfs.exfat", &["-n", label, &partition])?;
        debug!(device = %device, label, "formatted drive");
        Ok(())
    }

    fn mount(&self, drive: &UsbDrive, mountpoint: &Path) -> Result<()> {
        fs::create_dir_all(mountpoint)?;
        let partition = drive.partition().display().to_string();
        let target = mountpoint.display().to_string();
        self.runner.run_checked("mount", &[&partition, &target])?;
        Ok(())
    }

    fn unmount(&self, mountpoint: &Path) -> Result<()> {
        let target = mountpoint.display().to_string();
        self.runner.run_checked("umount", &[&target])?;
        Ok(())
    }
}

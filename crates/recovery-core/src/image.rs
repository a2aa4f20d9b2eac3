use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Disk image format produced by an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ImageType {
    /// Monolithic VMDK copy of the disk.
    Vmdk,
    /// VMDK descriptor referencing the raw image through an overlay mount.
    VmdkLinked,
    Vhd,
    Vhdx,
}

impl ImageType {
    /// File extension of the produced disk files.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Vmdk | Self::VmdkLinked => "vmdk",
            Self::Vhd => "vhd",
            Self::Vhdx => "vhdx",
        }
    }

    /// Format name understood by `qemu-img convert -O`.
    #[must_use]
    pub fn qemu_format(self) -> &'static str {
        match self {
            Self::Vmdk | Self::VmdkLinked => "vmdk",
            Self::Vhd => "vpc",
            Self::Vhdx => "vhdx",
        }
    }

    /// Whether the export reads through a transparent overlay mount instead
    /// of the snapshot clone directly.
    #[must_use]
    pub fn needs_overlay(self) -> bool {
        matches!(self, Self::VmdkLinked)
    }
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Vmdk => "vmdk",
            Self::VmdkLinked => "vmdk-linked",
            Self::Vhd => "vhd",
            Self::Vhdx => "vhdx",
        };
        f.write_str(s)
    }
}

impl FromStr for ImageType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "vmdk" => Ok(Self::Vmdk),
            "vmdk-linked" | "vmdklinked" => Ok(Self::VmdkLinked),
            "vhd" => Ok(Self::Vhd),
            "vhdx" => Ok(Self::Vhdx),
            _ => Err(CoreError::UnknownImageType(s.to_string())),
        }
    }
}

/// Where an exported image is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ExportTarget {
    /// Copied onto a freshly formatted removable drive.
    Usb,
    /// Published as a network share on the appliance.
    #[default]
    NetworkShare,
}

impl fmt::Display for ExportTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Usb => f.write_str("usb"),
            Self::NetworkShare => f.write_str("network-share"),
        }
    }
}

// file: src/config/bootloader.rs
// version: 1.0.0
// guid: 388a220d-4ffb-4500-b13f-244368450742

//! Bootloader installation approaches

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where and how the bootloader gets installed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BootloaderApproach {
    /// Let the distribution pick
    Auto,
    /// grub-install from inside the chroot, addressing the device
    #[value(name = "chroot-grub2-device")]
    #[serde(rename = "chroot-grub2-device")]
    ChrootGrub2Device,
    /// grub-install from inside the chroot, through a device map drive
    #[value(name = "chroot-grub2-drive")]
    #[serde(rename = "chroot-grub2-drive")]
    ChrootGrub2Drive,
    /// grub-install of the host, addressing the device
    #[value(name = "host-grub2-device")]
    #[serde(rename = "host-grub2-device")]
    HostGrub2Device,
    /// grub-install of the host, through a device map drive
    #[value(name = "host-grub2-drive")]
    #[serde(rename = "host-grub2-drive")]
    HostGrub2Drive,
    /// extlinux and a generic MBR from the host
    HostExtlinux,
    /// Do not install a bootloader
    None,
}

impl BootloaderApproach {
    pub const ALL: [BootloaderApproach; 7] = [
        Self::Auto,
        Self::ChrootGrub2Device,
        Self::ChrootGrub2Drive,
        Self::HostGrub2Device,
        Self::HostGrub2Drive,
        Self::HostExtlinux,
        Self::None,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::ChrootGrub2Device => "chroot-grub2-device",
            Self::ChrootGrub2Drive => "chroot-grub2-drive",
            Self::HostGrub2Device => "host-grub2-device",
            Self::HostGrub2Drive => "host-grub2-drive",
            Self::HostExtlinux => "host-extlinux",
            Self::None => "none",
        }
    }

    /// Any of the four GRUB2 variants
    pub fn is_grub2(self) -> bool {
        self.is_chroot_grub2() || self.is_host_grub2()
    }

    pub fn is_chroot_grub2(self) -> bool {
        matches!(self, Self::ChrootGrub2Device | Self::ChrootGrub2Drive)
    }

    pub fn is_host_grub2(self) -> bool {
        matches!(self, Self::HostGrub2Device | Self::HostGrub2Drive)
    }

    /// Whether GRUB is pointed at a synthetic device map drive
    pub fn uses_device_map(self) -> bool {
        matches!(self, Self::ChrootGrub2Drive | Self::HostGrub2Drive)
    }
}

impl fmt::Display for BootloaderApproach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

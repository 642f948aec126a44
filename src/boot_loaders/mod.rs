// file: src/boot_loaders/mod.rs
// version: 1.0.0
// guid: 53d5ff76-f952-48cd-a82e-2f09e38580db

//! Bootloader installation (GRUB2 and extlinux)

pub mod extlinux;
pub mod grub2;

pub use extlinux::{ExtlinuxConfig, ExtlinuxInstaller};
pub use grub2::{fix_grub_cfg_root_device, Grub2Installer};

/// Kernel arguments for a serial console, used for OpenStack images
pub const CONSOLE_CONFIG: &str = "console=tty0 console=ttyS0,115200";

// file: src/boot_loaders/extlinux.rs
// version: 1.0.0
// guid: 876001e9-5cb6-4873-9b7b-50a06f8adac9

//! extlinux installation with a generic MBR

use super::CONSOLE_CONFIG;
use crate::executor::{path_arg, CommandExecutor, Invocation};
use crate::types::FsUuid;
use crate::Result;
use std::fs;
use std::path::Path;
use tracing::info;

pub const COMMAND_EXTLINUX: &str = "extlinux";
pub const COMMAND_INSTALL_MBR: &str = "install-mbr";

/// Values rendered into extlinux.conf
#[derive(Debug, Clone)]
pub struct ExtlinuxConfig<'a> {
    pub distro_key: &'a str,
    pub distro_name_long: &'a str,
    pub vmlinuz: &'a str,
    pub initramfs: &'a str,
    pub uuid: &'a FsUuid,
    pub serial_console: bool,
}

impl ExtlinuxConfig<'_> {
    pub fn render(&self) -> String {
        let kernel_extra = if self.serial_console {
            format!(" {}", CONSOLE_CONFIG)
        } else {
            String::new()
        };

        format!(
            "DEFAULT  {key}\n\
             TIMEOUT  1\n\
             \n\
             LABEL    {key}\n\
             SAY      Booting {name}...\n\
             KERNEL   {vmlinuz}\n\
             APPEND   initrd={initramfs} root=/dev/disk/by-uuid/{uuid}{extra}\n\
             INITRD   {initramfs}\n",
            key = self.distro_key,
            name = self.distro_name_long,
            vmlinuz = self.vmlinuz,
            initramfs = self.initramfs,
            uuid = self.uuid,
            extra = kernel_extra,
        )
    }
}

/// Writes extlinux.conf, installs extlinux and a generic MBR
pub struct ExtlinuxInstaller<'a> {
    executor: &'a dyn CommandExecutor,
    root: &'a Path,
    target: &'a Path,
}

impl<'a> ExtlinuxInstaller<'a> {
    pub fn new(executor: &'a dyn CommandExecutor, root: &'a Path, target: &'a Path) -> Self {
        Self {
            executor,
            root,
            target,
        }
    }

    pub fn install(&self, config: &ExtlinuxConfig<'_>) -> Result<()> {
        let boot_extlinux = self.root.join("boot").join("extlinux");
        fs::create_dir_all(&boot_extlinux)?;

        let extlinux_conf = boot_extlinux.join("extlinux.conf");
        info!("Writing file \"{}\"...", extlinux_conf.display());
        fs::write(&extlinux_conf, config.render())?;

        info!("Installing extlinux to \"{}\"...", boot_extlinux.display());
        self.executor.run(&Invocation::new([
            COMMAND_EXTLINUX.to_string(),
            "--install".to_string(),
            format!("{}/", boot_extlinux.display()),
        ]))?;

        info!("Writing MBR of \"{}\"...", self.target.display());
        self.executor.run(&Invocation::new([
            COMMAND_INSTALL_MBR.to_string(),
            "--force".to_string(),
            path_arg(self.target),
        ]))
    }
}

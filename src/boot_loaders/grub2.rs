// file: src/boot_loaders/grub2.rs
// version: 1.1.0
// guid: f0545f36-2944-422e-9f8a-e95568feb99d

//! GRUB2 installation from the host or from inside the chroot

use super::CONSOLE_CONFIG;
use crate::config::BootloaderApproach;
use crate::error::BootstrapError;
use crate::executor::{path_arg, CommandExecutor, Environment, Invocation};
use crate::mount::normalize_path;
use crate::scripts::COMMAND_CHROOT;
use crate::types::FsUuid;
use crate::Result;
use regex::Regex;
use std::fs::{self, DirBuilder};
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};
use tracing::info;

/// Synthetic BIOS drive that the device map points at the target
pub const DEVICE_MAP_DRIVE: &str = "(hd9999)";

/// Installs GRUB2 onto the target device using one of the four GRUB2
/// bootloader approaches
pub struct Grub2Installer<'a> {
    pub executor: &'a dyn CommandExecutor,
    pub approach: BootloaderApproach,
    pub force: bool,
    pub target: &'a Path,
    pub root: &'a Path,
    /// grub-install command of the host, for host-* approaches
    pub host_command: Option<&'a str>,
    /// grub-install command of the distribution, for chroot-* approaches
    pub chroot_command: &'a str,
    pub chroot_env: &'a Environment,
}

impl<'a> Grub2Installer<'a> {
    pub fn run(&self) -> Result<()> {
        if !self.approach.is_grub2() {
            return Err(BootstrapError::unsupported(format!(
                "Bootloader approach \"{}\" is not a GRUB2 approach",
                self.approach
            )));
        }

        let real_target = fs::canonicalize(self.target)?;
        let use_device_map = self.approach.uses_device_map();

        let boot_grub = self.root.join("boot").join("grub");
        DirBuilder::new()
            .recursive(true)
            .mode(0o755)
            .create(&boot_grub)?;

        let device_map = boot_grub.join("device.map");
        if use_device_map {
            info!(
                "Writing device map to \"{}\" (mapping \"{}\" to \"{}\")...",
                device_map.display(),
                DEVICE_MAP_DRIVE,
                real_target.display()
            );
            fs::write(
                &device_map,
                format!("{}\t{}\n", DEVICE_MAP_DRIVE, real_target.display()),
            )?;
        }

        info!("{}", self.install_message(&real_target));

        let mut invocation = self.install_invocation()?;
        invocation.argv.push("--target=i386-pc".to_string());
        if self.force {
            invocation.argv.push("--force".to_string());
        }
        invocation.argv.push(if use_device_map {
            DEVICE_MAP_DRIVE.to_string()
        } else {
            path_arg(self.target)
        });

        self.executor.run(&invocation)?;

        if use_device_map {
            fs::remove_file(&device_map)?;
        }
        Ok(())
    }

    fn install_invocation(&self) -> Result<Invocation> {
        if self.approach.is_chroot_grub2() {
            return Ok(Invocation::new([
                COMMAND_CHROOT.to_string(),
                path_arg(self.root),
                self.chroot_command.to_string(),
            ])
            .with_env(self.chroot_env));
        }

        let host_command = self.host_command.ok_or_else(|| {
            BootstrapError::config("No host GRUB2 install command has been determined")
        })?;
        Ok(Invocation::new([
            host_command.to_string(),
            "--boot-directory".to_string(),
            path_arg(&self.root.join("boot")),
        ]))
    }

    fn install_message(&self, real_target: &Path) -> String {
        let mut hints = Vec::new();
        if real_target != normalize_path(self.target) {
            hints.push(format!("actually \"{}\"", real_target.display()));
        }
        hints.push(format!("approach \"{}\"", self.approach));

        format!(
            "Installing bootloader to device \"{}\" ({})...",
            self.target.display(),
            hints.join(", ")
        )
    }
}

/// Path of the generated GRUB configuration inside the root
pub fn grub_cfg_path(root: &Path) -> PathBuf {
    root.join("boot").join("grub").join("grub.cfg")
}

/// Point every `root=` kernel argument at the file system UUID
pub fn rewrite_root_device(content: &str, uuid: &FsUuid) -> Result<String> {
    let re = Regex::new(r"root=[^ \n]+")
        .map_err(|e| BootstrapError::validation(format!("Invalid regex pattern: {}", e)))?;
    let replacement = format!("root=UUID={}", uuid);
    Ok(re
        .replace_all(content, regex::NoExpand(&replacement))
        .into_owned())
}

/// Rewrite `boot/grub/grub.cfg` below `root` in place
pub fn fix_grub_cfg_root_device(root: &Path, uuid: &FsUuid) -> Result<()> {
    info!("Post-processing GRUB config...");
    let grub_cfg = grub_cfg_path(root);
    let content = fs::read_to_string(&grub_cfg)?;
    fs::write(&grub_cfg, rewrite_root_device(&content, uuid)?)?;
    Ok(())
}

/// Append the serial console to GRUB_CMDLINE_LINUX in /etc/default/grub
pub fn enable_serial_console(
    executor: &dyn CommandExecutor,
    root: &Path,
    chroot_env: &Environment,
) -> Result<()> {
    info!("Enabling serial console...");
    executor.run(
        &Invocation::new([
            COMMAND_CHROOT.to_string(),
            path_arg(root),
            "sed".to_string(),
            format!(
                "s:^\\(GRUB_CMDLINE_LINUX=\"[^\"]*\\)\":\\1 {}\":",
                CONSOLE_CONFIG
            ),
            "-i".to_string(),
            "/etc/default/grub".to_string(),
        ])
        .with_env(chroot_env),
    )
}

// file: src/engine/preflight.rs
// version: 1.0.0
// guid: aafca923-f531-479f-a435-603187d98fed

//! Checks that run before anything is touched

use super::context::RunPlan;
use super::files::resolve_root_password;
use super::BootstrapEngine;
use crate::boot_loaders::extlinux::{COMMAND_EXTLINUX, COMMAND_INSTALL_MBR};
use crate::config::BootloaderApproach;
use crate::disk::{
    COMMAND_BLKID, COMMAND_BLOCKDEV, COMMAND_KPARTX, COMMAND_MKFS_EXT4, COMMAND_PARTED,
    COMMAND_PARTPROBE, COMMAND_TUNE2FS,
};
use crate::distro::COMMAND_FIND;
use crate::error::BootstrapError;
use crate::executor::{CommandExecutor, Invocation};
use crate::host::Host;
use crate::mount::{COMMAND_MOUNT, COMMAND_UMOUNT};
use crate::scripts::{check_script_permissions, COMMAND_CHROOT};
use crate::Result;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{error, info};

pub const COMMAND_GRUB2_INSTALL: &str = "grub2-install";
pub const COMMAND_GRUB_INSTALL: &str = "grub-install";

/// Marker in `grub-install --version` output of GRUB 0.9x
const GRUB_LEGACY_MARKER: &str = "GRUB GRUB 0.";

/// Make sure every command exists, reporting the first missing one.
///
/// Absolute names are checked as files, all others are looked up in PATH.
pub fn check_for_commands<I, S>(host: &dyn Host, commands: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let commands: BTreeSet<String> = commands.into_iter().map(Into::into).collect();
    let mut missing_file = None;
    let mut missing_command = None;

    for command in &commands {
        if command.starts_with('/') {
            if !host.path_exists(Path::new(command)) && missing_file.is_none() {
                missing_file = Some(command.clone());
            }
            continue;
        }

        match host.find_command(command) {
            Some(path) => info!("Checking for {}... {}", command, path.display()),
            None => {
                error!("Checking for {}... NOT FOUND", command);
                missing_command.get_or_insert_with(|| command.clone());
            }
        }
    }

    if let Some(file) = missing_file {
        return Err(BootstrapError::validation(format!("File \"{}\" not found.", file)));
    }
    if let Some(program) = missing_command {
        return Err(BootstrapError::CommandNotFound { program });
    }
    Ok(())
}

/// Refuse GRUB legacy where GRUB 2 is needed
pub fn protect_against_grub_legacy(executor: &dyn CommandExecutor, command: &str) -> Result<()> {
    let output = executor.run_capture(&Invocation::new([command, "--version"]))?;
    if output.contains(GRUB_LEGACY_MARKER) {
        return Err(BootstrapError::unsupported(format!(
            "Command \"{}\" is GRUB legacy while GRUB 2 is needed. \
             Please install GRUB 2 or pass --grub2-install .. on the command line.",
            command
        )));
    }
    Ok(())
}

/// Pick the host's grub-install command for host GRUB2 approaches.
///
/// When neither candidate exists, "grub-install" is returned so that the
/// command check reports it.
pub fn detect_grub2_install(
    executor: &dyn CommandExecutor,
    host: &dyn Host,
    explicit: Option<&str>,
    approach: BootloaderApproach,
) -> Result<Option<String>> {
    if let Some(command) = explicit {
        return Ok(Some(command.to_string()));
    }
    if !approach.is_host_grub2() {
        return Ok(None);
    }

    if host.find_command(COMMAND_GRUB2_INSTALL).is_some() {
        return Ok(Some(COMMAND_GRUB2_INSTALL.to_string()));
    }

    if host.find_command(COMMAND_GRUB_INSTALL).is_some() {
        protect_against_grub_legacy(executor, COMMAND_GRUB_INSTALL)?;
    }
    Ok(Some(COMMAND_GRUB_INSTALL.to_string()))
}

impl<'a> BootstrapEngine<'a> {
    /// Resolve "auto" to the distribution's preferred approach, once
    pub fn resolve_bootloader_approach(&self) -> BootloaderApproach {
        match self.config.bootloader_approach {
            BootloaderApproach::Auto => {
                let selected = self.distro.select_bootloader();
                info!(
                    "Selected approach \"{}\" for bootloader installation.",
                    selected
                );
                selected
            }
            explicit => explicit,
        }
    }

    /// External commands an image bootstrap run needs
    pub fn commands_to_check_for(
        &self,
        approach: BootloaderApproach,
        host_grub2_install: Option<&str>,
    ) -> Vec<String> {
        let mut commands = self.distro.commands_to_check_for();
        commands.extend(
            [
                COMMAND_BLKID,
                COMMAND_BLOCKDEV,
                COMMAND_CHROOT,
                COMMAND_FIND,
                COMMAND_KPARTX,
                COMMAND_MKFS_EXT4,
                COMMAND_MOUNT,
                COMMAND_PARTED,
                COMMAND_PARTPROBE,
                COMMAND_TUNE2FS,
                COMMAND_UMOUNT,
            ]
            .iter()
            .map(|c| c.to_string()),
        );
        commands.extend(host_grub2_install.map(str::to_string));

        if approach == BootloaderApproach::HostExtlinux {
            commands.push(COMMAND_EXTLINUX.to_string());
            commands.push(COMMAND_INSTALL_MBR.to_string());
        }

        commands
    }

    /// Validate everything that can be validated without side effects
    pub fn prepare(&self) -> Result<RunPlan> {
        self.distro.check_release()?;

        let bootloader_approach = self.resolve_bootloader_approach();
        let host_grub2_install = detect_grub2_install(
            self.executor,
            self.host,
            self.config.grub2_install.as_deref(),
            bootloader_approach,
        )?;

        check_for_commands(
            self.host,
            self.commands_to_check_for(bootloader_approach, host_grub2_install.as_deref()),
        )?;

        info!("Checking for known unsupported architecture/machine combination...");
        let architecture = self
            .distro
            .check_architecture(self.executor, &self.config.architecture)?;

        info!("Checking if \"{}\" is a block device...", self.target.display());
        if !self.host.is_block_device(&self.target)? {
            return Err(BootstrapError::NotBlockDevice(self.target.clone()));
        }

        self.check_scripts()?;

        let root_password = resolve_root_password(
            self.config.root_password.as_deref(),
            self.config.root_password_file.as_deref(),
        )?;

        Ok(RunPlan {
            bootloader_approach,
            architecture,
            root_password,
            host_grub2_install,
        })
    }

    pub(crate) fn check_scripts(&self) -> Result<()> {
        check_script_permissions(&self.scripts, &self.settings.script_owner_uids)
    }
}

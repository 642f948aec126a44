// file: src/cli/commands.rs
// version: 2.0.0
// guid: 365c9ffd-ca12-4476-a2f9-60bfa67f40e6

//! Command implementations for the CLI

use super::args::{DebootstrapArgs, DirectoryCli, DistroCommand, ImageCli, MachineArgs, ScriptArgs};
use crate::config::{ConfigFile, ConfigLoader, MachineConfig, ScriptDirs};
use crate::distro::{DebianStrategy, DebootstrapOptions, DistroStrategy};
use crate::engine::BootstrapEngine;
use crate::executor::{InterruptState, LocalExecutor};
use crate::host::LinuxHost;
use crate::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Make a path absolute against the current directory
fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()?.join(path))
}

fn absolute_opt(path: Option<&Path>) -> Result<Option<PathBuf>> {
    path.map(absolute).transpose()
}

/// Read the configuration file, if one was given
pub fn load_config_file(path: Option<&Path>) -> Result<ConfigFile> {
    match path {
        Some(path) => ConfigLoader::new().load(path),
        None => Ok(ConfigFile::default()),
    }
}

/// Combine command line and configuration file; the command line wins
pub fn machine_config(args: &MachineArgs, file: &ConfigFile) -> Result<MachineConfig> {
    let defaults = MachineConfig::default();

    // Either password option on the command line overrides the file
    let root_password_file = if args.password.is_some() {
        None
    } else {
        args.password_file
            .clone()
            .or_else(|| file.password_file.clone())
    };

    Ok(MachineConfig {
        hostname: args
            .hostname
            .clone()
            .or_else(|| file.hostname.clone())
            .unwrap_or(defaults.hostname),
        architecture: args
            .architecture
            .clone()
            .or_else(|| file.arch.clone())
            .unwrap_or(defaults.architecture),
        root_password: args.password.clone(),
        root_password_file: absolute_opt(root_password_file.as_deref())?,
        resolv_conf: absolute(
            args.resolv_conf
                .as_deref()
                .or(file.resolv_conf.as_deref())
                .unwrap_or(defaults.resolv_conf.as_path()),
        )?,
        disk_id: match args.disk_id {
            Some(disk_id) => Some(disk_id),
            None => file.disk_id()?,
        },
        first_partition_uuid: match &args.first_partition_uuid {
            Some(uuid) => Some(uuid.clone()),
            None => file.first_partition_uuid()?,
        },
        machine_id: match &args.machine_id {
            Some(machine_id) => Some(machine_id.clone()),
            None => file.machine_id()?,
        },
        bootloader_approach: args
            .bootloader
            .or(file.bootloader)
            .unwrap_or(defaults.bootloader_approach),
        bootloader_force: args.bootloader_force || file.bootloader_force.unwrap_or(false),
        with_openstack: args.openstack || file.openstack.unwrap_or(false),
        grub2_install: None,
    })
}

/// Script directories from command line and configuration file, absolute
pub fn script_dirs(args: &ScriptArgs, file: &ConfigFile) -> Result<ScriptDirs> {
    Ok(ScriptDirs {
        pre: absolute_opt(args.scripts_pre.as_deref().or(file.scripts.pre.as_deref()))?,
        chroot: absolute_opt(
            args.scripts_chroot
                .as_deref()
                .or(file.scripts.chroot.as_deref()),
        )?,
        post: absolute_opt(args.scripts_post.as_deref().or(file.scripts.post.as_deref()))?,
    })
}

/// Strategy for the distribution picked on the command line
pub fn distro_strategy(command: &DistroCommand) -> Box<dyn DistroStrategy> {
    let options = debootstrap_options(command.args());
    match command {
        DistroCommand::Debian(_) => Box::new(DebianStrategy::debian(options)),
        DistroCommand::Ubuntu(_) => Box::new(DebianStrategy::ubuntu(options)),
    }
}

fn debootstrap_options(args: &DebootstrapArgs) -> DebootstrapOptions {
    DebootstrapOptions {
        release: args.release.clone(),
        mirror_url: args.mirror_url.clone(),
        command_debootstrap: args.command_debootstrap.clone(),
        debootstrap_opt: args.debootstrap_opt.clone(),
    }
}

/// Bootstrap a disk image onto a block device
pub fn image_bootstrap_command(cli: ImageCli, interrupts: Arc<InterruptState>) -> Result<()> {
    let file = load_config_file(cli.config.as_deref())?;

    let mut config = machine_config(&cli.machine, &file)?;
    config.grub2_install = cli.grub2_install.clone().or(file.grub2_install.clone());
    let scripts = script_dirs(&cli.scripts, &file)?;
    let target = absolute(cli.distro.target())?;

    let executor = LocalExecutor::new(interrupts);
    let host = LinuxHost::new();
    let engine = BootstrapEngine::new(
        &executor,
        &host,
        distro_strategy(&cli.distro),
        config,
        scripts,
        target,
    );

    let plan = engine.prepare()?;
    engine.run(&plan)?;

    info!("Done.");
    Ok(())
}

/// Bootstrap a root file system into a directory
pub fn directory_bootstrap_command(cli: DirectoryCli, interrupts: Arc<InterruptState>) -> Result<()> {
    let file = load_config_file(cli.config.as_deref())?;

    let machine = MachineArgs {
        architecture: cli.architecture.clone(),
        hostname: cli.hostname.clone(),
        resolv_conf: cli.resolv_conf.clone(),
        machine_id: cli.machine_id.clone(),
        ..MachineArgs::default()
    };
    let config = machine_config(&machine, &file)?;
    let target = absolute(cli.distro.target())?;

    let executor = LocalExecutor::new(interrupts);
    let host = LinuxHost::new();
    let engine = BootstrapEngine::new(
        &executor,
        &host,
        distro_strategy(&cli.distro),
        config,
        ScriptDirs::default(),
        target,
    );

    let plan = engine.prepare_directory()?;
    engine.run_directory(&plan)?;

    info!("Done.");
    Ok(())
}

// file: src/distro/mod.rs
// version: 1.0.0
// guid: 77fca452-e9ea-4d48-a802-f68518b9dab8

//! Distribution strategies
//!
//! The engine only ever talks to a `dyn DistroStrategy`. Each strategy
//! populates the root file system and performs the distribution specific
//! steps at fixed points of the pipeline.

pub mod debian;

pub use debian::{DebianFlavor, DebianStrategy, DebootstrapOptions};

use crate::config::BootloaderApproach;
use crate::error::BootstrapError;
use crate::executor::{path_arg, CommandExecutor, Environment, Invocation};
use crate::scripts::COMMAND_CHROOT;
use crate::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const COMMAND_FIND: &str = "find";

/// Everything a strategy needs to act on the staged root file system
#[derive(Clone, Copy)]
pub struct ChrootContext<'a> {
    /// Root of the system being bootstrapped (on the host)
    pub root: &'a Path,
    /// Scrubbed environment for commands run inside the chroot
    pub env: &'a Environment,
    pub executor: &'a dyn CommandExecutor,
}

impl<'a> ChrootContext<'a> {
    pub fn new(root: &'a Path, env: &'a Environment, executor: &'a dyn CommandExecutor) -> Self {
        Self {
            root,
            env,
            executor,
        }
    }

    /// Host path of a path inside the root; leading slashes are ignored
    pub fn path(&self, inside: &str) -> PathBuf {
        self.root.join(inside.trim_start_matches('/'))
    }

    /// `chroot <root> <args...>` with the chroot environment
    pub fn chroot_invocation<I, S>(&self, args: I) -> Invocation
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut argv = vec![COMMAND_CHROOT.to_string(), path_arg(self.root)];
        argv.extend(args.into_iter().map(Into::into));
        Invocation::new(argv).with_env(self.env)
    }

    /// Run a command inside the chroot
    pub fn run_in_chroot<I, S>(&self, args: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.executor.run(&self.chroot_invocation(args))
    }
}

/// Contract between the bootstrap engine and a distribution
pub trait DistroStrategy {
    /// Short machine friendly name, e.g. "debian"
    fn distro_key(&self) -> &str;

    /// Human friendly name, e.g. "Debian GNU/Linux"
    fn distro_name_long(&self) -> &str;

    /// Reject releases that cannot be bootstrapped
    fn check_release(&self) -> Result<()> {
        Ok(())
    }

    /// Bootloader approach used when the user asked for "auto"
    fn select_bootloader(&self) -> BootloaderApproach {
        BootloaderApproach::ChrootGrub2Drive
    }

    /// External commands the strategy relies on
    fn commands_to_check_for(&self) -> Vec<String>;

    /// Validate the target architecture against the host, returning the
    /// normalized architecture name
    fn check_architecture(&self, _executor: &dyn CommandExecutor, architecture: &str) -> Result<String> {
        Ok(architecture.to_string())
    }

    fn configure_hostname(&self, ctx: &ChrootContext<'_>, hostname: &str) -> Result<()>;

    /// Allow or prevent package installations from starting services
    fn allow_autostart_of_services(&self, ctx: &ChrootContext<'_>, allow: bool) -> Result<()>;

    /// Populate the root file system
    fn run_directory_bootstrap(
        &self,
        ctx: &ChrootContext<'_>,
        architecture: &str,
        approach: BootloaderApproach,
    ) -> Result<()>;

    /// `use_mtu` is `Some(true)` for OpenStack images, `None` otherwise
    fn create_network_configuration(&self, ctx: &ChrootContext<'_>, use_mtu: Option<bool>) -> Result<()>;

    fn ensure_chroot_has_grub2_installed(&self, ctx: &ChrootContext<'_>) -> Result<()>;

    /// grub-install command name inside the chroot
    fn chroot_command_grub2_install(&self) -> &str;

    fn generate_grub_cfg_from_inside_chroot(&self, ctx: &ChrootContext<'_>) -> Result<()>;

    fn adjust_grub_defaults(&self, _ctx: &ChrootContext<'_>, _with_openstack: bool) -> Result<()> {
        Ok(())
    }

    fn adjust_initramfs_generator_config(&self, _ctx: &ChrootContext<'_>) -> Result<()> {
        Ok(())
    }

    fn generate_initramfs_from_inside_chroot(&self, ctx: &ChrootContext<'_>) -> Result<()>;

    /// Clean-up inside the chroot before the image ships (OpenStack only)
    fn perform_in_chroot_shipping_clean_up(&self, ctx: &ChrootContext<'_>) -> Result<()>;

    /// Clean-up after the virtual file systems are gone
    fn perform_post_chroot_clean_up(&self, ctx: &ChrootContext<'_>) -> Result<()>;

    fn install_dhcp_client(&self, ctx: &ChrootContext<'_>) -> Result<()>;

    fn install_sudo(&self, ctx: &ChrootContext<'_>) -> Result<()>;

    fn install_cloud_init_and_friends(&self, ctx: &ChrootContext<'_>) -> Result<()>;

    /// Absolute path (inside the chroot) of the cloud-init datasource config
    fn cloud_init_datasource_cfg_path(&self) -> &str;

    fn cloud_username(&self) -> &str {
        self.distro_key()
    }

    fn cloud_init_distro(&self) -> &str {
        self.distro_key()
    }

    fn install_sshd(&self, ctx: &ChrootContext<'_>) -> Result<()>;

    fn make_openstack_services_autostart(&self, ctx: &ChrootContext<'_>) -> Result<()>;

    /// Only called for distributions that do not use systemd
    fn install_acpid(&self, _ctx: &ChrootContext<'_>) -> Result<()> {
        Err(BootstrapError::unsupported(format!(
            "Installing acpid is not supported for {}",
            self.distro_name_long()
        )))
    }

    fn vmlinuz_path(&self) -> &str;

    fn initramfs_path(&self) -> &str;

    fn prepare_installation_of_packages(&self, _ctx: &ChrootContext<'_>) -> Result<()> {
        Ok(())
    }

    fn install_kernel(&self, ctx: &ChrootContext<'_>) -> Result<()>;

    fn uses_systemd(&self) -> bool;

    fn uses_systemd_resolved(&self, with_openstack: bool) -> bool;

    fn minimum_size_bytes(&self) -> u64;

    fn extra_mkfs_ext4_options(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Write `etc/hostname` below the root
pub fn write_etc_hostname(root: &Path, hostname: &str) -> Result<()> {
    let filename = root.join("etc").join("hostname");
    info!("Writing file \"{}\"...", filename.display());
    fs::write(&filename, format!("{}\n", hostname))?;
    Ok(())
}

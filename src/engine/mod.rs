// file: src/engine/mod.rs
// version: 1.0.0
// guid: 37136080-db99-4823-86ca-5e7d2569b96e

//! The bootstrap pipeline
//!
//! [`BootstrapEngine::prepare`] runs every check that has no side effects
//! and fixes the outcome in a [`RunPlan`]. [`BootstrapEngine::run`] then
//! walks the pipeline. Each acquired resource has its release pushed onto a
//! [`CleanupStack`] right away, so releases happen in reverse order whether
//! the run succeeds or fails half way.

pub mod context;
pub mod directory;
pub mod environment;
pub mod files;
pub mod guard;
pub mod openstack;
pub mod preflight;

pub use context::{EngineSettings, RunContext, RunPlan};
pub use guard::{CleanupStack, GuardToken};

use crate::boot_loaders::grub2::enable_serial_console;
use crate::boot_loaders::{fix_grub_cfg_root_device, ExtlinuxConfig, ExtlinuxInstaller, Grub2Installer};
use crate::config::{BootloaderApproach, MachineConfig, ScriptDirs};
use crate::disk::{apply_or_discover_uuid, format_partition, DiskManager};
use crate::distro::{ChrootContext, DistroStrategy};
use crate::error::BootstrapError;
use crate::executor::CommandExecutor;
use crate::host::Host;
use crate::logging::with_stage_span;
use crate::mount::MountManager;
use crate::retry::{keep_trying, RetryPolicy};
use crate::scripts::{run_scripts_from, ChrootScripts};
use crate::types::FsUuid;
use crate::Result;
use files::{filter_copy_resolv_conf, write_etc_fstab, write_etc_machine_id};
use std::fs::{self, DirBuilder};
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};
use tracing::info;

/// Prefix of staging mountpoint directories
const MOUNTPOINT_PREFIX: &str = "tmp";

/// Bootstraps a distribution onto a block device or into a directory
pub struct BootstrapEngine<'a> {
    executor: &'a dyn CommandExecutor,
    host: &'a dyn Host,
    distro: Box<dyn DistroStrategy + 'a>,
    config: MachineConfig,
    scripts: ScriptDirs,
    target: PathBuf,
    settings: EngineSettings,
}

impl<'a> BootstrapEngine<'a> {
    pub fn new(
        executor: &'a dyn CommandExecutor,
        host: &'a dyn Host,
        distro: Box<dyn DistroStrategy + 'a>,
        config: MachineConfig,
        scripts: ScriptDirs,
        target: impl Into<PathBuf>,
    ) -> Self {
        Self {
            executor,
            host,
            distro,
            config,
            scripts,
            target: target.into(),
            settings: EngineSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Bootstrap onto the target block device
    pub fn run(&self, plan: &RunPlan) -> Result<()> {
        let mut stack = CleanupStack::with_executor(self.executor);
        let outcome = self.run_guarded(plan, &mut stack);
        stack.finish(outcome)
    }

    fn run_guarded<'s>(&'s self, plan: &'s RunPlan, stack: &mut CleanupStack<'s>) -> Result<()> {
        let disk = DiskManager::new(self.executor, self.host, &self.target);
        let mounts = MountManager::new(self.executor, self.host);

        self.host.enter_namespaces(&self.config.hostname)?;

        let partition_device = with_stage_span("partitioning", || -> Result<PathBuf> {
            disk.check_size(self.distro.minimum_size_bytes())?;
            disk.partition_device()?;
            if let Some(disk_id) = self.config.disk_id {
                disk.set_disk_id(disk_id)?;
            }
            disk.create_partition_devices(&self.settings.mapper_dir)
        })?;
        stack.push("partition devices", move || {
            DiskManager::new(self.executor, self.host, &self.target).remove_partition_devices()
        });

        let partition_uuid = self.create_file_system(plan, &partition_device)?;

        let mountpoint = self.create_mountpoint()?;
        let staging_dir = mountpoint.clone();
        stack.push("staging directory", move || self.remove_mountpoint(&staging_dir));

        mounts.mount_root(&partition_device, &mountpoint)?;
        let root = mountpoint.clone();
        stack.push("root file system", move || {
            info!("Unmounting partitions...");
            MountManager::new(self.executor, self.host).unmount(&root)
        });

        let ctx = RunContext::new(
            plan,
            &self.settings,
            &self.config.hostname,
            partition_device,
            partition_uuid,
            mountpoint,
        );
        let chroot = ctx.chroot(self.executor);

        with_stage_span("bootstrap", || -> Result<()> {
            self.create_etc_dir(ctx.root())?;
            self.write_hostname_and_resolv_conf(&chroot)?;
            self.bootstrap_directory(&chroot, plan, stack)?;
            // The bootstrap tools may have replaced these with defaults
            self.write_hostname_and_resolv_conf(&chroot)?;
            write_etc_fstab(ctx.root(), &ctx.partition_uuid)?;
            if let Some(machine_id) = &self.config.machine_id {
                write_etc_machine_id(ctx.root(), machine_id)?;
            }
            Ok(())
        })?;

        if let Some(dir) = &self.scripts.pre {
            info!("Running pre-chroot scripts...");
            run_scripts_from(self.executor, dir, &ctx.script_env)?;
        }

        match ctx.approach() {
            approach if approach.is_host_grub2() => self.install_grub2(&ctx)?,
            BootloaderApproach::HostExtlinux => self.install_extlinux(&ctx)?,
            _ => {}
        }

        let mounted = mounts.mount_virtual_filesystems(ctx.root())?;
        let virtual_mounts = stack.push("virtual file systems", move || {
            info!("Unmounting non-disk file systems...");
            MountManager::new(self.executor, self.host).unmount_all(&mounted)
        });

        with_stage_span("chroot", || self.configure_inside_chroot(&ctx, &chroot, stack))?;

        stack.release(virtual_mounts)?;

        self.distro.perform_post_chroot_clean_up(&chroot)?;

        if let Some(dir) = &self.scripts.post {
            info!("Running post-chroot scripts...");
            run_scripts_from(self.executor, dir, &ctx.script_env)?;
        }

        Ok(())
    }

    /// Everything that happens while the virtual file systems are mounted
    fn configure_inside_chroot<'s>(
        &'s self,
        ctx: &RunContext<'_>,
        chroot: &ChrootContext<'_>,
        stack: &mut CleanupStack<'s>,
    ) -> Result<()> {
        let approach = ctx.approach();
        let with_openstack = self.config.with_openstack;

        self.distro.allow_autostart_of_services(chroot, false)?;
        self.set_root_password(ctx, chroot)?;
        self.distro.prepare_installation_of_packages(chroot)?;
        // Early, so that later packages see the actual kernel configuration
        self.distro.install_kernel(chroot)?;

        if approach.is_grub2() {
            self.distro.ensure_chroot_has_grub2_installed(chroot)?;
        }
        if approach.is_chroot_grub2() {
            self.install_grub2(ctx)?;
        }

        if with_openstack {
            self.distro.install_dhcp_client(chroot)?;
            self.distro.install_sudo(chroot)?;
            self.distro.install_cloud_init_and_friends(chroot)?;
            openstack::configure_cloud_init(chroot, self.distro.as_ref())?;
            self.distro.install_sshd(chroot)?;
            self.distro.make_openstack_services_autostart(chroot)?;

            openstack::disable_clearing_tty1(chroot)?;
            openstack::disable_pcspkr_autoloading(chroot)?;
            if !self.distro.uses_systemd() {
                self.distro.install_acpid(chroot)?;
            }
        }

        // After the DHCP client is installed
        self.distro
            .create_network_configuration(chroot, with_openstack.then_some(true))?;

        self.distro.adjust_initramfs_generator_config(chroot)?;
        self.distro.generate_initramfs_from_inside_chroot(chroot)?;

        if approach.is_grub2() {
            self.distro.adjust_grub_defaults(chroot, with_openstack)?;
            if with_openstack {
                enable_serial_console(self.executor, ctx.root(), &ctx.chroot_env)?;
            }
            info!("Generating GRUB configuration...");
            self.distro.generate_grub_cfg_from_inside_chroot(chroot)?;
            fix_grub_cfg_root_device(ctx.root(), &ctx.partition_uuid)?;
        }

        if let Some(dir) = &self.scripts.chroot {
            self.run_chroot_scripts(dir, ctx, stack)?;
        }

        if with_openstack {
            openstack::delete_sshd_keys(chroot)?;
            openstack::clean_machine_id(chroot, self.config.machine_id.is_some())?;
            self.distro.perform_in_chroot_shipping_clean_up(chroot)?;

            // Any earlier and the chroot would lose name resolution
            if self.distro.uses_systemd_resolved(with_openstack) {
                openstack::hand_resolv_conf_to_systemd_resolved(chroot)?;
            }
        }

        self.distro.allow_autostart_of_services(chroot, true)
    }

    fn create_file_system(&self, plan: &RunPlan, partition_device: &Path) -> Result<FsUuid> {
        format_partition(
            self.executor,
            partition_device,
            plan.bootloader_approach == BootloaderApproach::HostExtlinux,
            &self.distro.extra_mkfs_ext4_options(),
        )?;
        apply_or_discover_uuid(
            self.executor,
            partition_device,
            self.config.first_partition_uuid.as_ref(),
        )
    }

    fn create_mountpoint(&self) -> Result<PathBuf> {
        let mountpoint = tempfile::Builder::new()
            .prefix(MOUNTPOINT_PREFIX)
            .tempdir_in(&self.settings.mountpoint_parent)?
            .into_path();
        info!("Creating directory \"{}\"...", mountpoint.display());
        Ok(mountpoint)
    }

    /// Remove the staging directory, retrying while it is still busy
    fn remove_mountpoint(&self, mountpoint: &Path) -> Result<()> {
        info!("Removing directory \"{}\"...", mountpoint.display());
        keep_trying(
            self.host,
            RetryPolicy::default(),
            || fs::remove_dir(mountpoint).map_err(BootstrapError::from),
            |e| !e.has_os_error(libc::EBUSY),
        )
    }

    fn create_etc_dir(&self, root: &Path) -> Result<()> {
        let etc = root.join("etc");
        info!("Creating directory \"{}\"...", etc.display());
        DirBuilder::new().mode(0o755).create(&etc)?;
        Ok(())
    }

    fn write_hostname_and_resolv_conf(&self, chroot: &ChrootContext<'_>) -> Result<()> {
        self.distro
            .configure_hostname(chroot, &self.config.hostname)?;
        filter_copy_resolv_conf(&self.config.resolv_conf, &chroot.path("etc/resolv.conf"))
    }

    /// Let the distribution populate the root, then unmount whatever its
    /// tools left mounted below it
    fn bootstrap_directory<'s>(
        &'s self,
        chroot: &ChrootContext<'_>,
        plan: &RunPlan,
        stack: &mut CleanupStack<'s>,
    ) -> Result<()> {
        let root = chroot.root.to_path_buf();
        let sweep = stack.push("leftover mounts", move || {
            MountManager::new(self.executor, self.host).sweep_below(&root)
        });
        self.distro
            .run_directory_bootstrap(chroot, &plan.architecture, plan.bootloader_approach)?;
        stack.release(sweep)
    }

    fn set_root_password(&self, ctx: &RunContext<'_>, chroot: &ChrootContext<'_>) -> Result<()> {
        info!("Setting root password...");
        let Some(password) = &ctx.plan.root_password else {
            return Ok(());
        };
        self.executor.run(
            &chroot
                .chroot_invocation(["chpasswd"])
                .with_stdin(format!("root:{}", password)),
        )
    }

    fn install_grub2(&self, ctx: &RunContext<'_>) -> Result<()> {
        Grub2Installer {
            executor: self.executor,
            approach: ctx.approach(),
            force: self.config.bootloader_force,
            target: &self.target,
            root: ctx.root(),
            host_command: ctx.plan.host_grub2_install.as_deref(),
            chroot_command: self.distro.chroot_command_grub2_install(),
            chroot_env: &ctx.chroot_env,
        }
        .run()
    }

    fn install_extlinux(&self, ctx: &RunContext<'_>) -> Result<()> {
        let config = ExtlinuxConfig {
            distro_key: self.distro.distro_key(),
            distro_name_long: self.distro.distro_name_long(),
            vmlinuz: self.distro.vmlinuz_path(),
            initramfs: self.distro.initramfs_path(),
            uuid: &ctx.partition_uuid,
            serial_console: self.config.with_openstack,
        };
        ExtlinuxInstaller::new(self.executor, ctx.root(), &self.target).install(&config)
    }

    /// Stage, run and remove the chroot scripts; removal happens even if
    /// a script fails
    fn run_chroot_scripts<'s>(
        &'s self,
        dir: &'s Path,
        ctx: &RunContext<'_>,
        stack: &mut CleanupStack<'s>,
    ) -> Result<()> {
        let scripts = ChrootScripts::new(dir, ctx.root());
        scripts.create_staging_dir()?;

        let root = ctx.mountpoint.clone();
        let staged = stack.push("chroot scripts", move || {
            ChrootScripts::new(dir, &root).remove()
        });

        scripts.copy_in()?;
        scripts.run(self.executor, &ctx.chroot_env)?;
        stack.release(staged)
    }
}

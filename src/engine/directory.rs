// file: src/engine/directory.rs
// version: 1.0.0
// guid: f28cc8a0-fdf8-4178-a657-ecd579bea360

//! Bootstrapping into a plain directory
//!
//! No partitioning, no bootloader and no chroot phase: the distribution is
//! bootstrapped straight into the target directory.

use super::context::RunPlan;
use super::environment::chroot_environment;
use super::guard::CleanupStack;
use super::preflight::check_for_commands;
use super::BootstrapEngine;
use crate::config::BootloaderApproach;
use crate::distro::ChrootContext;
use crate::error::BootstrapError;
use crate::logging::with_stage_span;
use crate::mount::{COMMAND_MOUNT, COMMAND_UMOUNT};
use crate::Result;
use std::ffi::CString;
use std::fs::DirBuilder;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::DirBuilderExt;
use std::path::Path;
use tracing::info;

fn is_writable(path: &Path) -> bool {
    match CString::new(path.as_os_str().as_bytes()) {
        // SAFETY: the string is NUL-terminated and outlives the call
        Ok(c_path) => unsafe { libc::access(c_path.as_ptr(), libc::W_OK) == 0 },
        Err(_) => false,
    }
}

impl<'a> BootstrapEngine<'a> {
    /// Preflight for directory mode.
    ///
    /// The bootloader approach is always "none" here.
    pub fn prepare_directory(&self) -> Result<RunPlan> {
        self.distro.check_release()?;

        let mut commands = self.distro.commands_to_check_for();
        commands.extend([COMMAND_MOUNT.to_string(), COMMAND_UMOUNT.to_string()]);
        check_for_commands(self.host, commands)?;

        info!("Checking for known unsupported architecture/machine combination...");
        let architecture = self
            .distro
            .check_architecture(self.executor, &self.config.architecture)?;

        Ok(RunPlan {
            bootloader_approach: BootloaderApproach::None,
            architecture,
            root_password: None,
            host_grub2_install: None,
        })
    }

    /// Bootstrap into the target directory
    pub fn run_directory(&self, plan: &RunPlan) -> Result<()> {
        let mut stack = CleanupStack::with_executor(self.executor);
        let outcome = self.run_directory_guarded(plan, &mut stack);
        stack.finish(outcome)
    }

    fn run_directory_guarded<'s>(
        &'s self,
        plan: &'s RunPlan,
        stack: &mut CleanupStack<'s>,
    ) -> Result<()> {
        self.host.enter_namespaces(&self.config.hostname)?;
        self.ensure_target_directory()?;

        let env = chroot_environment(&self.settings.base_env, &self.config.hostname, None);
        let chroot = ChrootContext::new(&self.target, &env, self.executor);

        with_stage_span("bootstrap", || -> Result<()> {
            DirBuilder::new()
                .recursive(true)
                .mode(0o755)
                .create(self.target.join("etc"))?;
            self.write_hostname_and_resolv_conf(&chroot)?;
            self.bootstrap_directory(&chroot, plan, stack)?;
            self.write_hostname_and_resolv_conf(&chroot)?;
            if let Some(machine_id) = &self.config.machine_id {
                super::files::write_etc_machine_id(&self.target, machine_id)?;
            }
            Ok(())
        })
    }

    fn ensure_target_directory(&self) -> Result<()> {
        if !self.target.exists() {
            info!("Creating directory \"{}\"...", self.target.display());
            DirBuilder::new()
                .recursive(true)
                .mode(0o700)
                .create(&self.target)?;
        }

        if !self.target.is_dir() {
            return Err(BootstrapError::validation(format!(
                "\"{}\" is not a directory",
                self.target.display()
            )));
        }
        if !is_writable(&self.target) {
            return Err(BootstrapError::permission(format!(
                "Directory \"{}\" is not writable",
                self.target.display()
            )));
        }
        Ok(())
    }
}

// file: src/engine/context.rs
// version: 1.0.0
// guid: 4f81d3a9-259f-4ed6-a062-6a265eee7c7e

//! State derived before and during a run
//!
//! The machine configuration is never written to once the engine is built.
//! Whatever preflight works out goes into a [`RunPlan`]; whatever the
//! pipeline discovers on the way goes into a [`RunContext`].

use super::environment::{chroot_environment, process_environment};
use crate::config::BootloaderApproach;
use crate::disk::DEFAULT_MAPPER_DIR;
use crate::distro::ChrootContext;
use crate::executor::{CommandExecutor, Environment};
use crate::scripts::invoking_uids;
use crate::types::FsUuid;
use std::path::{Path, PathBuf};

/// Parent directory of staging mountpoints
pub const DEFAULT_MOUNTPOINT_PARENT: &str = "/mnt";

/// Host specific knobs of the engine
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub mountpoint_parent: PathBuf,
    pub mapper_dir: PathBuf,
    /// Environment the chroot and script environments are derived from
    pub base_env: Environment,
    /// Users allowed to own script directories
    pub script_owner_uids: Vec<u32>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            mountpoint_parent: PathBuf::from(DEFAULT_MOUNTPOINT_PARENT),
            mapper_dir: PathBuf::from(DEFAULT_MAPPER_DIR),
            base_env: process_environment(),
            script_owner_uids: invoking_uids(),
        }
    }
}

/// Outcome of preflight, fixed for the rest of the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPlan {
    /// Never `auto`
    pub bootloader_approach: BootloaderApproach,
    pub architecture: String,
    pub root_password: Option<String>,
    /// Only set for host GRUB2 approaches
    pub host_grub2_install: Option<String>,
}

/// What the pipeline knows once the root file system is mounted
#[derive(Debug, Clone)]
pub struct RunContext<'p> {
    pub plan: &'p RunPlan,
    pub partition_device: PathBuf,
    pub partition_uuid: FsUuid,
    pub mountpoint: PathBuf,
    /// For commands run inside the chroot
    pub chroot_env: Environment,
    /// For pre and post scripts, which also learn the mountpoint
    pub script_env: Environment,
}

impl<'p> RunContext<'p> {
    pub fn new(
        plan: &'p RunPlan,
        settings: &EngineSettings,
        hostname: &str,
        partition_device: PathBuf,
        partition_uuid: FsUuid,
        mountpoint: PathBuf,
    ) -> Self {
        let chroot_env = chroot_environment(&settings.base_env, hostname, None);
        let script_env = chroot_environment(&settings.base_env, hostname, Some(&mountpoint));
        Self {
            plan,
            partition_device,
            partition_uuid,
            mountpoint,
            chroot_env,
            script_env,
        }
    }

    pub fn root(&self) -> &Path {
        &self.mountpoint
    }

    pub fn chroot<'c>(&'c self, executor: &'c dyn CommandExecutor) -> ChrootContext<'c> {
        ChrootContext::new(&self.mountpoint, &self.chroot_env, executor)
    }

    pub fn approach(&self) -> BootloaderApproach {
        self.plan.bootloader_approach
    }
}

// file: src/config/mod.rs
// version: 2.0.0
// guid: 05646458-cc8e-4619-af4f-363273f54543

//! Machine configuration
//!
//! [`MachineConfig`] is built once from the command line (optionally merged
//! with a YAML file) and is never modified afterwards. Values discovered while
//! running live in the engine's run context instead.

pub mod bootloader;
pub mod loader;

pub use bootloader::BootloaderApproach;
pub use loader::{ConfigFile, ConfigLoader, ScriptsSection};

use crate::types::{DiskId, FsUuid, MachineId};
use std::path::PathBuf;

/// Default source for name server configuration
pub const DEFAULT_RESOLV_CONF: &str = "/etc/resolv.conf";

/// Default host name of the bootstrapped system
pub const DEFAULT_HOSTNAME: &str = "machine";

/// Settings describing the machine to be bootstrapped
#[derive(Debug, Clone, PartialEq)]
pub struct MachineConfig {
    pub hostname: String,
    pub architecture: String,
    pub root_password: Option<String>,
    pub root_password_file: Option<PathBuf>,
    pub resolv_conf: PathBuf,
    pub disk_id: Option<DiskId>,
    pub first_partition_uuid: Option<FsUuid>,
    pub machine_id: Option<MachineId>,
    pub bootloader_approach: BootloaderApproach,
    pub bootloader_force: bool,
    pub with_openstack: bool,
    /// Host GRUB2 install command, detected when absent
    pub grub2_install: Option<String>,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            hostname: DEFAULT_HOSTNAME.to_string(),
            architecture: host_architecture().to_string(),
            root_password: None,
            root_password_file: None,
            resolv_conf: PathBuf::from(DEFAULT_RESOLV_CONF),
            disk_id: None,
            first_partition_uuid: None,
            machine_id: None,
            bootloader_approach: BootloaderApproach::Auto,
            bootloader_force: false,
            with_openstack: false,
            grub2_install: None,
        }
    }
}

/// Optional customization script directories
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptDirs {
    /// Run on the host before the chroot phase
    pub pre: Option<PathBuf>,
    /// Run inside the chroot
    pub chroot: Option<PathBuf>,
    /// Run on the host after the chroot phase
    pub post: Option<PathBuf>,
}

impl ScriptDirs {
    /// All configured directories
    pub fn iter(&self) -> impl Iterator<Item = &PathBuf> {
        [&self.pre, &self.chroot, &self.post]
            .into_iter()
            .flatten()
    }
}

/// Debian-style name of the build host's architecture
pub fn host_architecture() -> &'static str {
    match std::env::consts::ARCH {
        "x86" => "i386",
        "aarch64" => "arm64",
        _ => "amd64",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_machine_config() {
        let config = MachineConfig::default();
        assert_eq!(config.hostname, "machine");
        assert_eq!(config.resolv_conf, PathBuf::from("/etc/resolv.conf"));
        assert_eq!(config.bootloader_approach, BootloaderApproach::Auto);
        assert!(!config.with_openstack);
    }

    #[test]
    fn test_script_dirs_iter_skips_unset() {
        let dirs = ScriptDirs {
            pre: Some(PathBuf::from("/srv/pre")),
            chroot: None,
            post: Some(PathBuf::from("/srv/post")),
        };
        let collected: Vec<_> = dirs.iter().collect();
        assert_eq!(
            collected,
            vec![&PathBuf::from("/srv/pre"), &PathBuf::from("/srv/post")]
        );
    }
}

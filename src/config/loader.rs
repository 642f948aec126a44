// file: src/config/loader.rs
// version: 2.0.0
// guid: 7cabb214-d02c-4086-aba2-c6a6a845da73

//! YAML configuration file loading with `${VAR}` substitution

use super::BootloaderApproach;
use crate::error::BootstrapError;
use crate::types::{DiskId, FsUuid, MachineId};
use crate::Result;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const PLACEHOLDER_PATTERN: &str = r"\$\{([^}]+)\}";

/// Machine settings as written in a configuration file.
///
/// Every key is optional; values given on the command line win.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub hostname: Option<String>,
    pub arch: Option<String>,
    pub password_file: Option<PathBuf>,
    pub resolv_conf: Option<PathBuf>,
    pub disk_id: Option<String>,
    pub first_partition_uuid: Option<String>,
    pub machine_id: Option<String>,
    pub bootloader: Option<BootloaderApproach>,
    pub bootloader_force: Option<bool>,
    pub openstack: Option<bool>,
    pub grub2_install: Option<String>,
    #[serde(default)]
    pub scripts: ScriptsSection,
}

/// The `scripts:` block of a configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptsSection {
    pub pre: Option<PathBuf>,
    pub chroot: Option<PathBuf>,
    pub post: Option<PathBuf>,
}

impl ConfigFile {
    /// Check the typed values early so that a bad file fails before any work
    pub fn validate(&self) -> Result<()> {
        self.disk_id()?;
        self.first_partition_uuid()?;
        self.machine_id()?;
        if let Some(hostname) = &self.hostname {
            if hostname.trim().is_empty() {
                return Err(BootstrapError::config("hostname must not be empty"));
            }
        }
        Ok(())
    }

    pub fn disk_id(&self) -> Result<Option<DiskId>> {
        self.disk_id.as_deref().map(DiskId::parse).transpose()
    }

    pub fn first_partition_uuid(&self) -> Result<Option<FsUuid>> {
        self.first_partition_uuid
            .as_deref()
            .map(FsUuid::parse)
            .transpose()
    }

    pub fn machine_id(&self) -> Result<Option<MachineId>> {
        self.machine_id.as_deref().map(MachineId::parse).transpose()
    }
}

/// Reads configuration files, expanding environment placeholders
pub struct ConfigLoader {
    env_vars: HashMap<String, String>,
}

impl ConfigLoader {
    /// Create a loader that substitutes from the process environment
    pub fn new() -> Self {
        Self {
            env_vars: std::env::vars().collect(),
        }
    }

    /// Override or add a variable available for substitution
    pub fn set_env_var(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.env_vars.insert(key.into(), value.into());
    }

    /// Load and validate a machine configuration file
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<ConfigFile> {
        let path = path.as_ref();
        debug!("Loading configuration from {}", path.display());

        let content = fs::read_to_string(path).map_err(|e| {
            BootstrapError::config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let expanded = self.expand_env_vars(&content)?;
        let config: ConfigFile = serde_yaml::from_str(&expanded)?;
        config.validate()?;

        Ok(config)
    }

    /// Replace every `${NAME}` with the value of NAME
    fn expand_env_vars(&self, content: &str) -> Result<String> {
        let re = Regex::new(PLACEHOLDER_PATTERN)
            .map_err(|e| BootstrapError::config(format!("Invalid regex pattern: {}", e)))?;

        let mut missing_vars: Vec<String> = Vec::new();
        let expanded = re.replace_all(content, |caps: &regex::Captures| {
            let name = &caps[1];
            match self.env_vars.get(name) {
                Some(value) => value.clone(),
                None => {
                    if !missing_vars.iter().any(|m| m == name) {
                        missing_vars.push(name.to_string());
                    }
                    String::new()
                }
            }
        });

        if !missing_vars.is_empty() {
            return Err(BootstrapError::config(format!(
                "Missing environment variables: {}",
                missing_vars.join(", ")
            )));
        }

        Ok(expanded.into_owned())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

// file: src/scripts.rs
// version: 1.1.0
// guid: c0ada703-4c79-4d0f-86f2-932ca38fd57a

//! User supplied customization scripts
//!
//! Pre-chroot and post-chroot scripts run on the host. Chroot scripts are
//! copied into the image first because host paths are not visible from
//! inside the chroot.

use crate::config::ScriptDirs;
use crate::error::BootstrapError;
use crate::executor::{path_arg, CommandExecutor, Environment, Invocation};
use crate::Result;
use std::ffi::{CString, OsStr, OsString};
use std::fs;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};
use tracing::info;

/// Where chroot scripts are staged, relative to the root of the chroot
pub const CHROOT_SCRIPT_TARGET_DIR: &str = "root/chroot-scripts";

pub const COMMAND_CHROOT: &str = "chroot";

/// Hidden files and editor backups are never run
pub fn should_be_run(basename: &OsStr) -> bool {
    let bytes = basename.as_bytes();
    !bytes.starts_with(b".") && !bytes.ends_with(b"~")
}

/// Names of the scripts in `dir` that are to be run, sorted bytewise
pub fn eligible_scripts(dir: &Path) -> Result<Vec<OsString>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let name = entry?.file_name();
        if should_be_run(&name) {
            names.push(name);
        }
    }
    names.sort_by(|a, b| a.as_bytes().cmp(b.as_bytes()));
    Ok(names)
}

/// User ids allowed to own script directories: the effective user and,
/// when running through sudo, the user who invoked sudo
pub fn invoking_uids() -> Vec<u32> {
    // SAFETY: geteuid has no preconditions
    let mut uids = vec![unsafe { libc::geteuid() }];
    if let Some(sudo_uid) = std::env::var("SUDO_UID")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
    {
        if !uids.contains(&sudo_uid) {
            uids.push(sudo_uid);
        }
    }
    uids.sort_unstable();
    uids
}

/// Refuse script directories that someone else could have tampered with
pub fn check_script_permissions(dirs: &ScriptDirs, good_uids: &[u32]) -> Result<()> {
    let categories = [
        ("pre-chroot", &dirs.pre),
        ("chroot", &dirs.chroot),
        ("post-chroot", &dirs.post),
    ];

    for (category, dir) in categories {
        let Some(dir) = dir else { continue };

        info!("Checking {} scripts directory permissions...", category);
        let props = fs::symlink_metadata(dir)?;

        if props.file_type().is_symlink() {
            return Err(BootstrapError::permission(format!(
                "Directory \"{}\" is a symlink. Only true directories are supported.",
                dir.display()
            )));
        }
        if !props.is_dir() {
            return Err(BootstrapError::permission(format!(
                "Directory \"{}\" is not a directory",
                dir.display()
            )));
        }
        if props.mode() & (libc::S_IWGRP | libc::S_IWOTH) as u32 != 0 {
            return Err(BootstrapError::permission(format!(
                "Directory \"{}\" is writable to users other than its owner",
                dir.display()
            )));
        }
        if !good_uids.contains(&props.uid()) {
            let owners: Vec<String> = good_uids.iter().map(|u| format!("user {}", u)).collect();
            return Err(BootstrapError::permission(format!(
                "Directory \"{}\" is not owned by {}",
                dir.display(),
                owners.join(" or ")
            )));
        }

        info!("Checking {} scripts for executability...", category);
        for name in eligible_scripts(dir)? {
            let script = dir.join(&name);
            if name.to_str().is_none() {
                return Err(BootstrapError::validation(format!(
                    "File name of script \"{}\" is not valid UTF-8",
                    script.display()
                )));
            }
            if !is_executable(&script) {
                return Err(BootstrapError::permission(format!(
                    "Permission denied, file \"{}\" not executable",
                    script.display()
                )));
            }
        }
    }

    Ok(())
}

fn is_executable(path: &Path) -> bool {
    match CString::new(path.as_os_str().as_bytes()) {
        // SAFETY: the string is NUL-terminated and outlives the call
        Ok(c_path) => unsafe { libc::access(c_path.as_ptr(), libc::X_OK) == 0 },
        Err(_) => false,
    }
}

/// Run the eligible scripts of `dir` on the host, one after another
pub fn run_scripts_from(
    executor: &dyn CommandExecutor,
    dir: &Path,
    env: &Environment,
) -> Result<()> {
    for name in eligible_scripts(dir)? {
        let script = dir.join(&name);
        executor
            .run(&Invocation::new([path_arg(&script)]).with_env(env))
            .map_err(|e| e.in_script(&script))?;
    }
    Ok(())
}

/// Copies chroot scripts into the image, runs them there and removes them
pub struct ChrootScripts<'a> {
    source_dir: &'a Path,
    root: &'a Path,
}

impl<'a> ChrootScripts<'a> {
    pub fn new(source_dir: &'a Path, root: &'a Path) -> Self {
        Self { source_dir, root }
    }

    /// Absolute staging directory on the host
    pub fn staging_dir(&self) -> PathBuf {
        self.root.join(CHROOT_SCRIPT_TARGET_DIR)
    }

    /// Create the staging directory inside the chroot
    pub fn create_staging_dir(&self) -> Result<()> {
        fs::create_dir(self.staging_dir())?;
        Ok(())
    }

    /// Copy every eligible script in and make it executable for everyone
    pub fn copy_in(&self) -> Result<()> {
        info!("Copying chroot scripts into chroot...");
        let staging_dir = self.staging_dir();

        for name in eligible_scripts(self.source_dir)? {
            let target = staging_dir.join(&name);
            fs::copy(self.source_dir.join(&name), &target)?;

            let mut permissions = fs::metadata(&target)?.permissions();
            permissions.set_mode(permissions.mode() | 0o111);
            fs::set_permissions(&target, permissions)?;
        }
        Ok(())
    }

    /// Run the staged scripts through chroot
    pub fn run(&self, executor: &dyn CommandExecutor, env: &Environment) -> Result<()> {
        info!("Running chroot scripts...");

        for name in eligible_scripts(self.source_dir)? {
            let inside = Path::new("/").join(CHROOT_SCRIPT_TARGET_DIR).join(&name);
            executor
                .run(
                    &Invocation::new([
                        COMMAND_CHROOT.to_string(),
                        path_arg(self.root),
                        path_arg(&inside),
                    ])
                    .with_env(env),
                )
                .map_err(|e| e.in_script(self.source_dir.join(&name)))?;
        }
        Ok(())
    }

    /// Delete the staged copies and the staging directory.
    ///
    /// Scripts that were never copied in are skipped.
    pub fn remove(&self) -> Result<()> {
        info!("Removing chroot scripts...");
        let staging_dir = self.staging_dir();

        for name in eligible_scripts(self.source_dir)? {
            let target = staging_dir.join(&name);
            if let Err(e) = fs::remove_file(&target) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    return Err(e.into());
                }
            }
        }

        fs::remove_dir(&staging_dir)?;
        Ok(())
    }
}

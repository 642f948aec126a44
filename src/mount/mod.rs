// file: src/mount/mod.rs
// version: 1.1.0
// guid: 4b411d46-bcda-4a7d-99c5-41c14848117e

//! Mounting and unmounting below the staging directory

pub mod mountinfo;

pub use mountinfo::{normalize_path, MountFinder};

use crate::executor::{path_arg, CommandExecutor, Invocation};
use crate::host::Host;
use crate::retry::keep_trying_command;
use crate::Result;
use std::path::{Path, PathBuf};
use tracing::info;

pub const COMMAND_MOUNT: &str = "mount";
pub const COMMAND_UMOUNT: &str = "umount";

/// One virtual filesystem mounted into the chroot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MountTask {
    pub source: &'static str,
    pub options: &'static [&'static str],
    /// Relative to the root of the chroot
    pub target: &'static str,
}

/// Virtual filesystems needed inside the chroot, in mount order
pub const VIRTUAL_MOUNTS: [MountTask; 5] = [
    MountTask {
        source: "/dev",
        options: &["-o", "bind"],
        target: "dev",
    },
    MountTask {
        source: "/dev/pts",
        options: &["-o", "bind"],
        target: "dev/pts",
    },
    MountTask {
        source: "tmpfs",
        options: &["-t", "tmpfs", "-o", "mode=1777"],
        target: "dev/shm",
    },
    MountTask {
        source: "proc",
        options: &["-t", "proc"],
        target: "proc",
    },
    MountTask {
        source: "/sys",
        options: &["-o", "bind"],
        target: "sys",
    },
];

/// Issues mount and umount commands for the engine
pub struct MountManager<'a> {
    executor: &'a dyn CommandExecutor,
    host: &'a dyn Host,
}

impl<'a> MountManager<'a> {
    pub fn new(executor: &'a dyn CommandExecutor, host: &'a dyn Host) -> Self {
        Self { executor, host }
    }

    /// Mount the root partition onto the staging directory
    pub fn mount_root(&self, partition_device: &Path, mountpoint: &Path) -> Result<()> {
        info!("Mounting partitions...");
        self.executor.run(&Invocation::new([
            COMMAND_MOUNT.to_string(),
            path_arg(partition_device),
            path_arg(mountpoint),
        ]))
    }

    /// Mount a single virtual filesystem, returning the absolute mount point
    pub fn mount_virtual(&self, root: &Path, task: &MountTask) -> Result<PathBuf> {
        let target = root.join(task.target);

        let mut argv = vec![COMMAND_MOUNT.to_string(), task.source.to_string()];
        argv.extend(task.options.iter().map(|o| o.to_string()));
        argv.push(path_arg(&target));

        self.executor.run(&Invocation::new(argv))?;
        Ok(target)
    }

    /// Mount every virtual filesystem in order.
    ///
    /// On failure, the ones already mounted are unmounted again before the
    /// error is returned.
    pub fn mount_virtual_filesystems(&self, root: &Path) -> Result<Vec<PathBuf>> {
        info!("Mounting non-disk file systems...");
        let mut mounted = Vec::with_capacity(VIRTUAL_MOUNTS.len());

        for task in &VIRTUAL_MOUNTS {
            match self.mount_virtual(root, task) {
                Ok(target) => mounted.push(target),
                Err(err) => {
                    self.executor.suspend_interrupts();
                    let rollback = self.unmount_all(&mounted);
                    self.executor.resume_interrupts();
                    if let Err(release_err) = rollback {
                        tracing::error!("Unmounting after failed mount failed: {}", release_err);
                    }
                    return Err(err);
                }
            }
        }

        Ok(mounted)
    }

    /// Unmount the given mount points in reverse order
    pub fn unmount_all(&self, mounted: &[PathBuf]) -> Result<()> {
        for path in mounted.iter().rev() {
            self.unmount(path)?;
        }
        Ok(())
    }

    /// Unmount a single path, retrying while the target is busy
    pub fn unmount(&self, path: &Path) -> Result<()> {
        let invocation = Invocation::new([COMMAND_UMOUNT.to_string(), path_arg(path)]);
        keep_trying_command(self.host, || self.executor.run(&invocation))
    }

    /// Unmount everything still mounted strictly below `root`, innermost
    /// (most recently mounted) first
    pub fn sweep_below(&self, root: &Path) -> Result<()> {
        let finder = MountFinder::from_host(self.host)?;
        let leftovers = finder.below(root, false);

        if !leftovers.is_empty() {
            info!(
                "Unmounting {} leftover mount(s) below \"{}\"...",
                leftovers.len(),
                root.display()
            );
        }

        for path in leftovers.iter().rev() {
            self.unmount(path)?;
        }
        Ok(())
    }
}

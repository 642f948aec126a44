// file: src/disk/mod.rs
// version: 1.0.0
// guid: 8b0e2c6a-1ef3-4cfa-9bd0-54ba1a02cb25

//! Block device preparation: partition table, mapper devices, file system

pub mod filesystem;
pub mod mapper;
pub mod partition;

pub use filesystem::{apply_or_discover_uuid, format_partition};

use crate::executor::CommandExecutor;
use crate::host::Host;
use std::path::{Path, PathBuf};

pub const COMMAND_BLKID: &str = "blkid";
pub const COMMAND_BLOCKDEV: &str = "blockdev";
pub const COMMAND_KPARTX: &str = "kpartx";
pub const COMMAND_MKFS_EXT4: &str = "mkfs.ext4";
pub const COMMAND_PARTED: &str = "parted";
pub const COMMAND_PARTPROBE: &str = "partprobe";
pub const COMMAND_TUNE2FS: &str = "tune2fs";

/// Default directory holding device mapper nodes
pub const DEFAULT_MAPPER_DIR: &str = "/dev/mapper";

/// Operations on the target block device
pub struct DiskManager<'a> {
    executor: &'a dyn CommandExecutor,
    host: &'a dyn Host,
    target: PathBuf,
}

impl<'a> DiskManager<'a> {
    pub fn new(executor: &'a dyn CommandExecutor, host: &'a dyn Host, target: &Path) -> Self {
        Self {
            executor,
            host,
            target: target.to_path_buf(),
        }
    }

    pub fn target(&self) -> &Path {
        &self.target
    }
}

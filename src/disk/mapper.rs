// file: src/disk/mapper.rs
// version: 1.0.0
// guid: abd0846e-f10c-4e4c-afe0-a354e0028cf2

//! Partition device nodes through kpartx

use super::{DiskManager, COMMAND_KPARTX};
use crate::error::BootstrapError;
use crate::executor::{path_arg, Invocation};
use crate::retry::keep_trying_command;
use crate::Result;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

const DEVICE_NODE_POLLS: u32 = 3;

impl<'a> DiskManager<'a> {
    /// Activate mapper devices for the partitions of the target and return
    /// the node of the first partition
    pub fn create_partition_devices(&self, mapper_dir: &Path) -> Result<PathBuf> {
        info!("Activating partition devices...");
        let target = path_arg(&self.target);

        let listing = self
            .executor
            .run_capture(&Invocation::new([COMMAND_KPARTX, "-l", target.as_str()]))?;
        let device_name = first_mapping_name(&listing).ok_or_else(|| {
            BootstrapError::validation(format!(
                "{} did not list any partition of \"{}\"",
                COMMAND_KPARTX, target
            ))
        })?;
        let partition_device = mapper_dir.join(device_name);

        // Older kpartx releases lack "-u"
        if let Err(err) = self
            .executor
            .run(&Invocation::new([COMMAND_KPARTX, "-u", target.as_str()]))
        {
            if matches!(err, BootstrapError::Interrupted) {
                return Err(err);
            }
            warn!("{} -u failed ({}), falling back to -a", COMMAND_KPARTX, err);
            self.executor
                .run(&Invocation::new([COMMAND_KPARTX, "-a", target.as_str()]))?;
        }

        for _ in 0..DEVICE_NODE_POLLS {
            if self.host.path_exists(&partition_device) {
                return Ok(partition_device);
            }
            self.host.sleep(Duration::from_secs(1));
        }

        Err(BootstrapError::NoSuchDevice(partition_device))
    }

    /// Deactivate the mapper devices of the target
    pub fn remove_partition_devices(&self) -> Result<()> {
        info!("Deactivating partition devices...");
        let invocation = Invocation::new([COMMAND_KPARTX.to_string(), "-d".to_string(), path_arg(&self.target)]);
        keep_trying_command(self.host, || self.executor.run(&invocation))
    }
}

/// Device name from the first line of `kpartx -l`, e.g.
/// `loop0p1 : 0 4192256 /dev/loop0 2048`
fn first_mapping_name(listing: &str) -> Option<&str> {
    let first_line = listing.lines().next()?;
    let name = first_line.split(" : ").next()?.trim();
    (!name.is_empty()).then_some(name)
}

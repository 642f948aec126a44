// file: src/disk/partition.rs
// version: 1.0.0
// guid: bf4c74d6-d121-4a09-bcde-64b3d5d87720

//! Partition table creation and device size checks

use super::{DiskManager, COMMAND_BLOCKDEV, COMMAND_PARTED, COMMAND_PARTPROBE};
use crate::error::BootstrapError;
use crate::executor::{path_arg, Invocation};
use crate::retry::keep_trying_command;
use crate::types::{format_byte_size, DiskId};
use crate::Result;
use std::time::Duration;
use tracing::info;

impl<'a> DiskManager<'a> {
    /// Size of the target device in bytes
    pub fn device_size(&self) -> Result<u64> {
        let output = self.executor.run_capture(&Invocation::new([
            COMMAND_BLOCKDEV.to_string(),
            "--getsize64".to_string(),
            path_arg(&self.target),
        ]))?;

        output.trim().parse::<u64>().map_err(|_| {
            BootstrapError::validation(format!(
                "Unexpected output from {}: {:?}",
                COMMAND_BLOCKDEV, output
            ))
        })
    }

    /// Fail unless the target holds at least `minimum_bytes`
    pub fn check_size(&self, minimum_bytes: u64) -> Result<()> {
        info!("Checking size of \"{}\"...", self.target.display());
        let found = self.device_size()?;

        if found < minimum_bytes {
            return Err(BootstrapError::InsufficientSpace(format!(
                "Device \"{}\" is {} in size, {} or more needed.",
                self.target.display(),
                format_byte_size(found),
                format_byte_size(minimum_bytes)
            )));
        }
        Ok(())
    }

    /// Write an msdos label with a single bootable primary partition
    pub fn partition_device(&self) -> Result<()> {
        info!("Partitioning \"{}\"...", self.target.display());
        let target = path_arg(&self.target);
        let target = target.as_str();

        self.executor.run(&Invocation::new([
            COMMAND_PARTED,
            "--script",
            target,
            "mklabel",
            "msdos",
        ]))?;

        // Make existing partition devices leave
        let probe = Invocation::new([COMMAND_PARTPROBE, target]);
        keep_trying_command(self.host, || self.executor.run(&probe))?;

        self.executor.run(&Invocation::new([
            COMMAND_PARTED,
            "--script",
            "--align",
            "optimal",
            target,
            "mkpart",
            "primary",
            "ext4",
            "1",
            "100%",
        ]))?;

        // LVM volumes in particular need a moment before the flag sticks
        self.host.sleep(Duration::from_secs(1));

        let boot_flag = Invocation::new([COMMAND_PARTED, "--script", target, "set", "1", "boot", "on"]);
        keep_trying_command(self.host, || self.executor.run(&boot_flag))
    }

    /// Stamp a custom disk identifier into the MBR
    pub fn set_disk_id(&self, disk_id: DiskId) -> Result<()> {
        info!("Setting MBR disk identifier to {} (4 bytes)...", disk_id);
        disk_id.write_to(&self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeHost, RecordingExecutor};
    use std::path::Path;

    #[test]
    fn test_partition_device_command_sequence() {
        // Arrange
        let host = FakeHost::new();
        let executor = RecordingExecutor::new();
        let disk = DiskManager::new(&executor, &host, Path::new("/dev/loop0"));

        // Act
        disk.partition_device().unwrap();

        // Assert
        assert_eq!(
            executor.command_lines(),
            vec![
                "parted --script /dev/loop0 mklabel msdos",
                "partprobe /dev/loop0",
                "parted --script --align optimal /dev/loop0 mkpart primary ext4 1 100%",
                "parted --script /dev/loop0 set 1 boot on",
            ]
        );
        assert_eq!(host.sleeps(), vec![Duration::from_secs(1)]);
    }

    #[test]
    fn test_partprobe_race_is_retried() {
        let host = FakeHost::new();
        let executor = RecordingExecutor::new();
        executor.fail_when("partprobe", 2, 1);
        let disk = DiskManager::new(&executor, &host, Path::new("/dev/loop0"));

        disk.partition_device().unwrap();

        let probes = executor
            .command_lines()
            .into_iter()
            .filter(|c| c.starts_with("partprobe"))
            .count();
        assert_eq!(probes, 3);
    }

    #[test]
    fn test_check_size_rejects_small_device() {
        let host = FakeHost::new();
        let executor = RecordingExecutor::new();
        executor.respond("blockdev --getsize64", "1073741824\n");
        let disk = DiskManager::new(&executor, &host, Path::new("/dev/loop0"));

        let err = disk.check_size(2 * 1024 * 1024 * 1024).unwrap_err();

        assert!(matches!(err, BootstrapError::InsufficientSpace(_)));
        assert_eq!(
            err.to_string(),
            "Device \"/dev/loop0\" is 1 GiB in size, 2 GiB or more needed."
        );
    }

    #[test]
    fn test_check_size_accepts_large_enough_device() {
        let host = FakeHost::new();
        let executor = RecordingExecutor::new();
        executor.respond("blockdev --getsize64", "4294967296\n");
        let disk = DiskManager::new(&executor, &host, Path::new("/dev/loop0"));

        assert!(disk.check_size(2 * 1024 * 1024 * 1024).is_ok());
    }
}

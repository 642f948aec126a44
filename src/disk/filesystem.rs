// file: src/disk/filesystem.rs
// version: 1.0.0
// guid: dbfcfe55-e334-4a63-90d2-c3a017604044

//! ext4 creation and file system UUIDs

use super::{COMMAND_BLKID, COMMAND_MKFS_EXT4, COMMAND_TUNE2FS};
use crate::executor::{path_arg, CommandExecutor, Invocation};
use crate::types::FsUuid;
use crate::Result;
use std::path::Path;
use tracing::{info, warn};

/// Create an ext4 file system on the partition.
///
/// With `disable_64bit` the "64bit" feature is turned off, which extlinux
/// needs to be able to boot from it.
pub fn format_partition(
    executor: &dyn CommandExecutor,
    partition_device: &Path,
    disable_64bit: bool,
    extra_options: &[String],
) -> Result<()> {
    info!(
        "Creating file system on \"{}\"...",
        partition_device.display()
    );

    let mut argv = vec![COMMAND_MKFS_EXT4.to_string(), "-F".to_string()];

    if disable_64bit {
        warn!("Creating ext4 file system with feature \"64bit\" disabled to ensure bootability with extlinux.");
        warn!("Please see https://github.com/hartwork/image-bootstrap/issues/44 for details.");
        argv.extend(["-O".to_string(), "^64bit".to_string()]);
    }

    argv.extend(extra_options.iter().cloned());
    argv.push(path_arg(partition_device));

    executor.run(&Invocation::new(argv))
}

/// Apply the requested UUID to the file system, or read back the one
/// mkfs generated and make sure it is well-formed
pub fn apply_or_discover_uuid(
    executor: &dyn CommandExecutor,
    partition_device: &Path,
    requested: Option<&FsUuid>,
) -> Result<FsUuid> {
    if let Some(uuid) = requested {
        info!("Setting first partition UUID to {}...", uuid);
        executor.run(&Invocation::new([
            COMMAND_TUNE2FS.to_string(),
            "-U".to_string(),
            uuid.to_string(),
            path_arg(partition_device),
        ]))?;
        return Ok(uuid.clone());
    }

    let output = executor.run_capture(&Invocation::new([
        COMMAND_BLKID.to_string(),
        "-o".to_string(),
        "value".to_string(),
        "-s".to_string(),
        "UUID".to_string(),
        path_arg(partition_device),
    ]))?;

    FsUuid::parse(output.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BootstrapError;
    use crate::testing::RecordingExecutor;

    #[test]
    fn test_format_partition_for_grub() {
        let executor = RecordingExecutor::new();

        format_partition(
            &executor,
            Path::new("/dev/mapper/loop0p1"),
            false,
            &["-O".to_string(), "^metadata_csum".to_string()],
        )
        .unwrap();

        assert_eq!(
            executor.command_lines(),
            vec!["mkfs.ext4 -F -O ^metadata_csum /dev/mapper/loop0p1"]
        );
    }

    #[test]
    fn test_format_partition_for_extlinux_disables_64bit() {
        let executor = RecordingExecutor::new();

        format_partition(&executor, Path::new("/dev/mapper/loop0p1"), true, &[]).unwrap();

        assert_eq!(
            executor.command_lines(),
            vec!["mkfs.ext4 -F -O ^64bit /dev/mapper/loop0p1"]
        );
    }

    #[test]
    fn test_requested_uuid_is_applied() {
        let executor = RecordingExecutor::new();
        let uuid = FsUuid::parse("c1b9d5a2-f162-11cf-9ece-0020afc76f16").unwrap();

        let result =
            apply_or_discover_uuid(&executor, Path::new("/dev/mapper/loop0p1"), Some(&uuid)).unwrap();

        assert_eq!(result, uuid);
        assert_eq!(
            executor.command_lines(),
            vec!["tune2fs -U c1b9d5a2-f162-11cf-9ece-0020afc76f16 /dev/mapper/loop0p1"]
        );
    }

    #[test]
    fn test_discovered_uuid_is_validated() {
        let executor = RecordingExecutor::new();
        executor.respond("blkid", "c1b9d5a2-f162-11cf-9ece-0020afc76f16\n");

        let result = apply_or_discover_uuid(&executor, Path::new("/dev/mapper/loop0p1"), None).unwrap();
        assert_eq!(result.as_str(), "c1b9d5a2-f162-11cf-9ece-0020afc76f16");
    }

    #[test]
    fn test_malformed_discovered_uuid_is_rejected() {
        let executor = RecordingExecutor::new();
        executor.respond("blkid", "C1B9D5A2-F162\n");

        let err = apply_or_discover_uuid(&executor, Path::new("/dev/mapper/loop0p1"), None).unwrap_err();
        assert!(matches!(err, BootstrapError::Validation(_)));
    }
}

// file: src/host.rs
// version: 1.1.0
// guid: 4684007a-5ad1-4969-8ea2-585f36584363

//! Access to the build host's kernel and filesystem
//!
//! Everything the engine needs from the running system that is not an
//! external command sits behind the [`Host`] trait so tests can run the
//! whole pipeline without privileges.

use crate::error::BootstrapError;
use crate::Result;
use std::ffi::CString;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Location of the calling thread's mount table.
///
/// `unshare` moves only the calling thread into new namespaces, while
/// `/proc/self` refers to the main thread of the process.
pub const MOUNTINFO_PATH: &str = "/proc/thread-self/mountinfo";

/// Kernel and filesystem facilities of the build host
pub trait Host {
    /// Move the calling thread into new mount and UTS namespaces and set the
    /// hostname there. Commands launched from that thread inherit them.
    fn enter_namespaces(&self, hostname: &str) -> Result<()>;

    /// Raw content of the calling thread's mount table in mountinfo format
    fn read_mount_info(&self) -> Result<String>;

    /// Whether the path exists (following symlinks)
    fn path_exists(&self, path: &Path) -> bool;

    /// Whether the path refers to a block device (following symlinks)
    fn is_block_device(&self, path: &Path) -> Result<bool>;

    /// Look up a command in PATH
    fn find_command(&self, name: &str) -> Option<PathBuf>;

    /// Block the pipeline for the given duration
    fn sleep(&self, duration: Duration);
}

/// The real Linux host
#[derive(Debug, Default, Clone, Copy)]
pub struct LinuxHost;

impl LinuxHost {
    pub fn new() -> Self {
        Self
    }

    fn last_os_error(context: &str) -> BootstrapError {
        let err = std::io::Error::last_os_error();
        BootstrapError::namespace(format!("{}: {}", context, err))
    }
}

impl Host for LinuxHost {
    fn enter_namespaces(&self, hostname: &str) -> Result<()> {
        info!("Unsharing Linux namespaces (mount, UTS/hostname)...");

        // SAFETY: unshare only affects the calling thread
        let ret = unsafe { libc::unshare(libc::CLONE_NEWNS | libc::CLONE_NEWUTS) };
        if ret != 0 {
            return Err(Self::last_os_error("Unsharing Linux namespaces failed"));
        }

        let root = CString::new("/").map_err(|e| BootstrapError::namespace(e.to_string()))?;
        // SAFETY: all pointers are valid NUL-terminated strings or null where allowed
        let ret = unsafe {
            libc::mount(
                std::ptr::null(),
                root.as_ptr(),
                std::ptr::null(),
                libc::MS_REC | libc::MS_PRIVATE,
                std::ptr::null(),
            )
        };
        if ret != 0 {
            return Err(Self::last_os_error("Making mounts private failed"));
        }

        let name = hostname.as_bytes();
        // SAFETY: the buffer outlives the call and its length is passed along
        let ret = unsafe { libc::sethostname(name.as_ptr().cast(), name.len()) };
        if ret != 0 {
            return Err(Self::last_os_error("Setting hostname failed"));
        }

        Ok(())
    }

    fn read_mount_info(&self) -> Result<String> {
        Ok(std::fs::read_to_string(MOUNTINFO_PATH)?)
    }

    fn path_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_block_device(&self, path: &Path) -> Result<bool> {
        Ok(std::fs::metadata(path)?.file_type().is_block_device())
    }

    fn find_command(&self, name: &str) -> Option<PathBuf> {
        which::which(name).ok()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{InterruptState, LocalExecutor};
    use crate::mount::{MountFinder, MountManager};
    use std::os::unix::ffi::OsStrExt;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn mount_tmpfs(path: &Path) {
        let fstype = CString::new("tmpfs").unwrap();
        let target = CString::new(path.as_os_str().as_bytes()).unwrap();
        let ret = unsafe {
            libc::mount(
                fstype.as_ptr(),
                target.as_ptr(),
                fstype.as_ptr(),
                0,
                std::ptr::null(),
            )
        };
        assert_eq!(ret, 0, "{}", std::io::Error::last_os_error());
    }

    #[test]
    fn test_regular_file_is_not_block_device() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("disk.img");
        std::fs::write(&file, b"").unwrap();

        assert!(!LinuxHost::new().is_block_device(&file).unwrap());
    }

    #[test]
    fn test_missing_path_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = LinuxHost::new().is_block_device(&temp_dir.path().join("missing"));
        assert!(matches!(result, Err(BootstrapError::Io(_))));
    }

    #[test]
    fn test_find_command_locates_shell() {
        assert!(LinuxHost::new().find_command("sh").is_some());
        assert!(LinuxHost::new()
            .find_command("definitely-not-a-real-program-xyz")
            .is_none());
    }

    #[test]
    fn test_mount_info_is_readable_from_another_thread() {
        let found = std::thread::spawn(|| {
            let finder = MountFinder::from_host(&LinuxHost::new()).unwrap();
            finder.below(Path::new("/"), true)
        })
        .join()
        .unwrap();

        assert!(found.contains(&PathBuf::from("/")));
    }

    #[test]
    #[ignore] // Requires CAP_SYS_ADMIN (root).
    fn test_sweep_sees_mounts_made_after_entering_namespaces_on_another_thread() {
        // Arrange
        let temp_dir = TempDir::new().unwrap();
        let staging = temp_dir.path().to_path_buf();

        let (found, remaining) = std::thread::spawn(move || {
            let host = LinuxHost::new();
            host.enter_namespaces("ib-test").unwrap();
            mount_tmpfs(&staging);
            let gnupg = staging.join("gnupg");
            std::fs::create_dir(&gnupg).unwrap();
            mount_tmpfs(&gnupg);

            // Act
            let found = MountFinder::from_host(&host).unwrap().below(&staging, false);
            let executor = LocalExecutor::new(Arc::new(InterruptState::new()));
            MountManager::new(&executor, &host)
                .sweep_below(&staging)
                .unwrap();
            let remaining = MountFinder::from_host(&host).unwrap().below(&staging, false);
            (found, remaining)
        })
        .join()
        .unwrap();

        // Assert
        assert_eq!(found, vec![temp_dir.path().join("gnupg")]);
        assert!(remaining.is_empty());
    }
}

// file: src/mount/mountinfo.rs
// version: 1.1.0
// guid: 8da63bea-3a77-47a5-a38c-373df604288a

//! Parsing of /proc/<pid>/mountinfo
//!
//! Line format (see proc(5)):
//! `36 35 98:0 /mnt1 /mnt2 rw,noatime master:1 - ext3 /dev/root rw,errors=continue`
//! Field 5 is the mount point, with blanks and backslashes octal-escaped.

use crate::error::BootstrapError;
use crate::host::Host;
use crate::Result;
use std::path::{Component, Path, PathBuf};

/// Mount points of a mount table, in table order
#[derive(Debug, Clone, Default)]
pub struct MountFinder {
    mount_points: Vec<PathBuf>,
}

impl MountFinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the live mount table of the host
    pub fn from_host(host: &dyn Host) -> Result<Self> {
        let mut finder = Self::new();
        finder.load_text(&host.read_mount_info()?)?;
        Ok(finder)
    }

    /// Add the mount points of a mountinfo document
    pub fn load_text(&mut self, text: &str) -> Result<()> {
        for line in text.lines().filter(|l| !l.is_empty()) {
            self.mount_points.push(parse_line(line)?);
        }
        Ok(())
    }

    /// Mount points at or below `path`, in table order.
    ///
    /// Comparison is by path component, so `/mnt/a` is not below `/mnt/ab`.
    pub fn below(&self, path: &Path, inclusive: bool) -> Vec<PathBuf> {
        let base = normalize_path(path);
        self.mount_points
            .iter()
            .map(|candidate| normalize_path(candidate))
            .filter(|candidate| candidate.starts_with(&base))
            .filter(|candidate| inclusive || *candidate != base)
            .collect()
    }
}

/// Extract the mount point from one mountinfo line
pub fn parse_line(line: &str) -> Result<PathBuf> {
    let unexpected = || BootstrapError::validation(format!("Unexpected line format: {:?}", line));

    let fields: Vec<&str> = line.split(' ').collect();
    if fields.len() < 6 {
        return Err(unexpected());
    }

    let numeric = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    let device_ok = fields[2]
        .split_once(':')
        .map(|(major, minor)| numeric(major) && numeric(minor))
        .unwrap_or(false);

    if !numeric(fields[0]) || !numeric(fields[1]) || !device_ok || fields[3].is_empty() {
        return Err(unexpected());
    }

    let mount_point = fields[4];
    if !mount_point.starts_with('/') {
        return Err(unexpected());
    }

    Ok(PathBuf::from(unescape(mount_point)))
}

/// Decode the `\ooo` octal escapes the kernel uses for special characters
fn unescape(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() && is_octal_escape(&bytes[i + 1..i + 4]) {
            let value = bytes[i + 1..i + 4]
                .iter()
                .fold(0u32, |acc, b| acc * 8 + u32::from(b - b'0'));
            if let Ok(byte) = u8::try_from(value) {
                decoded.push(byte);
                i += 4;
                continue;
            }
        }
        decoded.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&decoded).into_owned()
}

fn is_octal_escape(digits: &[u8]) -> bool {
    digits.len() == 3 && digits.iter().all(|b| (b'0'..=b'7').contains(b))
}

/// Lexical normalization without touching the filesystem
/// Lexically resolve `.` and `..` components and repeated separators
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                normalized.pop();
            }
            Component::CurDir => {}
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

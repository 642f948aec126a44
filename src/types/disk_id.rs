// file: src/types/disk_id.rs
// version: 1.0.0
// guid: 513cf12b-4168-4f09-9d48-e00cf5d542ae

//! MBR disk identifiers

use crate::error::BootstrapError;
use crate::Result;
use std::fmt;
use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;
use std::str::FromStr;

/// Byte offset of the disk signature inside the master boot record
pub const DISK_ID_OFFSET: u64 = 440;

/// A 32-bit MBR disk signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskId(u32);

impl DiskId {
    pub fn new(number: u32) -> Self {
        Self(number)
    }

    /// Parse `0x` followed by one to eight hex digits
    pub fn parse(text: &str) -> Result<Self> {
        let digits = text
            .strip_prefix("0x")
            .filter(|d| (1..=8).contains(&d.len()) && d.chars().all(|c| c.is_ascii_hexdigit()))
            .ok_or_else(|| {
                BootstrapError::validation(format!(
                    "\"{}\" does not match pattern \"^0x[0-9a-fA-F]{{1,8}}$\"",
                    text
                ))
            })?;

        u32::from_str_radix(digits, 16)
            .map(Self)
            .map_err(|e| BootstrapError::validation(e.to_string()))
    }

    /// The on-disk byte sequence (little endian)
    pub fn to_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    /// Stamp the identifier into the MBR of the given device or image
    pub fn write_to(self, device: &Path) -> Result<()> {
        let mut file = OpenOptions::new().write(true).open(device)?;
        file.seek(SeekFrom::Start(DISK_ID_OFFSET))?;
        file.write_all(&self.to_bytes())?;
        file.sync_all()?;
        Ok(())
    }
}

impl FromStr for DiskId {
    type Err = BootstrapError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for DiskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

// file: src/types/uuid.rs
// version: 1.0.0
// guid: 50f7b32f-f1ba-4c6e-9118-83134b6d5382

//! Filesystem UUIDs

use crate::error::BootstrapError;
use crate::Result;
use regex::Regex;
use std::fmt;
use std::str::FromStr;

const UUID_PATTERN: &str = "^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$";

/// A well-formed, lowercase filesystem UUID
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FsUuid(String);

impl FsUuid {
    /// Validate `text` as a UUID, rejecting anything that is not strictly
    /// lowercase 8-4-4-4-12 hex
    pub fn parse(text: &str) -> Result<Self> {
        let re = Regex::new(UUID_PATTERN)
            .map_err(|e| BootstrapError::validation(format!("Invalid regex pattern: {}", e)))?;

        if !re.is_match(text) {
            return Err(BootstrapError::validation(format!(
                "Not a well-formed UUID: \"{}\"",
                text
            )));
        }
        Ok(Self(text.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for FsUuid {
    type Err = BootstrapError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for FsUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_well_formed_uuid() {
        let uuid = FsUuid::parse("c1b9d5a2-f162-11cf-9ece-0020afc76f16").unwrap();
        assert_eq!(uuid.to_string(), "c1b9d5a2-f162-11cf-9ece-0020afc76f16");
    }

    #[test]
    fn test_rejects_malformed_uuids() {
        for text in [
            "",
            "C1B9D5A2-F162-11CF-9ECE-0020AFC76F16",
            "c1b9d5a2f16211cf9ece0020afc76f16",
            "c1b9d5a2-f162-11cf-9ece-0020afc76f16\n",
            "c1b9d5a2-f162-11cf-9ece-0020afc76f1",
            "blkid: unknown device",
        ] {
            assert!(FsUuid::parse(text).is_err(), "accepted {:?}", text);
        }
    }
}

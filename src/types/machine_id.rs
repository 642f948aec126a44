// file: src/types/machine_id.rs
// version: 1.0.0
// guid: 820b9951-c9f7-45a3-8e1d-686a73381724

//! systemd machine identifiers

use crate::error::BootstrapError;
use crate::Result;
use std::fmt;
use std::str::FromStr;

/// 32 lowercase hex digits, as found in /etc/machine-id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineId(String);

impl MachineId {
    pub fn parse(text: &str) -> Result<Self> {
        let valid = text.len() == 32
            && text
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
        if !valid {
            return Err(BootstrapError::validation(format!(
                "\"{}\" does not match pattern \"^[0-9a-f]{{32}}$\"",
                text
            )));
        }
        Ok(Self(text.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for MachineId {
    type Err = BootstrapError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

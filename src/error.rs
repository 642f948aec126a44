// file: src/error.rs
// version: 3.0.0
// guid: 57b83a63-07b6-4534-aa6c-51e8797254e0

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, BootstrapError>;

/// Exit status the shell reports for a command it could not find
pub const EXIT_COMMAND_NOT_FOUND: i32 = 127;

/// Error types for image and directory bootstrapping
#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Validation(String),

    #[error("Command \"{program}\" not found in PATH.")]
    CommandNotFound { program: String },

    #[error("Command \"{command}\" returned non-zero exit status {}", exit_code.map(|c| c.to_string()).unwrap_or_else(|| "(killed by signal)".to_string()))]
    CommandFailed {
        command: String,
        exit_code: Option<i32>,
    },

    #[error("Not a block device: \"{0}\"")]
    NotBlockDevice(PathBuf),

    #[error("{0}")]
    InsufficientSpace(String),

    #[error("{0}")]
    Permission(String),

    #[error("No such block device file: '{0}'")]
    NoSuchDevice(PathBuf),

    #[error("{0}")]
    Namespace(String),

    #[error("{source} (script \"{}\")", script.display())]
    Script {
        script: PathBuf,
        #[source]
        source: Box<BootstrapError>,
    },

    #[error("{0}")]
    Unsupported(String),

    #[error("Interrupted.")]
    Interrupted,
}

impl BootstrapError {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new permission error
    pub fn permission(msg: impl Into<String>) -> Self {
        Self::Permission(msg.into())
    }

    /// Create a new namespace error
    pub fn namespace(msg: impl Into<String>) -> Self {
        Self::Namespace(msg.into())
    }

    /// Create a new unsupported-feature error
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    /// Attach the path of the customization script that caused this error
    pub fn in_script(self, script: impl Into<PathBuf>) -> Self {
        Self::Script {
            script: script.into(),
            source: Box::new(self),
        }
    }

    /// Whether this error means the program itself could not be found.
    ///
    /// Failures of this class are never retried.
    pub fn is_command_not_found(&self) -> bool {
        match self {
            Self::CommandNotFound { .. } => true,
            Self::CommandFailed { exit_code, .. } => *exit_code == Some(EXIT_COMMAND_NOT_FOUND),
            Self::Script { source, .. } => source.is_command_not_found(),
            _ => false,
        }
    }

    /// Whether this error is an I/O error carrying the given errno
    pub fn has_os_error(&self, errno: i32) -> bool {
        matches!(self, Self::Io(e) if e.raw_os_error() == Some(errno))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_failed_message() {
        let err = BootstrapError::CommandFailed {
            command: "parted --script /dev/loop0 mklabel msdos".to_string(),
            exit_code: Some(1),
        };
        assert_eq!(
            err.to_string(),
            "Command \"parted --script /dev/loop0 mklabel msdos\" returned non-zero exit status 1"
        );
    }

    #[test]
    fn test_script_annotation_appends_path() {
        let err = BootstrapError::CommandFailed {
            command: "/srv/scripts/01-setup".to_string(),
            exit_code: Some(2),
        }
        .in_script("/srv/scripts/01-setup");

        assert!(err
            .to_string()
            .ends_with("(script \"/srv/scripts/01-setup\")"));
    }

    #[test]
    fn test_command_not_found_classification() {
        let missing = BootstrapError::CommandNotFound {
            program: "kpartx".to_string(),
        };
        let exit_127 = BootstrapError::CommandFailed {
            command: "umount /mnt/x".to_string(),
            exit_code: Some(EXIT_COMMAND_NOT_FOUND),
        };
        let busy = BootstrapError::CommandFailed {
            command: "umount /mnt/x".to_string(),
            exit_code: Some(32),
        };

        assert!(missing.is_command_not_found());
        assert!(exit_127.is_command_not_found());
        assert!(!busy.is_command_not_found());
        assert!(missing.in_script("/x").is_command_not_found());
    }

    #[test]
    fn test_has_os_error() {
        let err = BootstrapError::Io(std::io::Error::from_raw_os_error(libc::EBUSY));
        assert!(err.has_os_error(libc::EBUSY));
        assert!(!err.has_os_error(libc::ENOENT));
    }
}

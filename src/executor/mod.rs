// file: src/executor/mod.rs
// version: 1.1.0
// guid: 42f8707f-ce09-4db3-8a89-0cf5855c0f19

//! External command execution
//!
//! Every program the bootstrapper launches goes through a [`CommandExecutor`].
//! The production implementation is [`LocalExecutor`]; tests substitute a
//! recording executor so that pipeline ordering can be asserted without root.

pub mod local;

pub use local::{InterruptState, LocalExecutor};

use crate::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Environment handed to a child process (replaces the inherited one)
pub type Environment = BTreeMap<String, String>;

/// Directories that must be reachable through PATH for the tools we call
const STANDARD_PATH_DIRS: [&str; 6] = [
    "/usr/local/sbin",
    "/usr/local/bin",
    "/usr/sbin",
    "/usr/bin",
    "/sbin",
    "/bin",
];

/// A single program launch: argument vector plus optional environment,
/// working directory and standard input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub argv: Vec<String>,
    pub env: Option<Environment>,
    pub cwd: Option<PathBuf>,
    pub stdin: Option<String>,
}

impl Invocation {
    /// Create an invocation from an argument vector
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            env: None,
            cwd: None,
            stdin: None,
        }
    }

    /// Run with exactly this environment instead of the inherited one
    pub fn with_env(mut self, env: &Environment) -> Self {
        self.env = Some(env.clone());
        self
    }

    /// Run inside the given working directory
    pub fn in_dir(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Feed the given text to the child's standard input
    pub fn with_stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Name of the program being launched
    pub fn program(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or("")
    }

    /// Shell-quoted rendition of the argument vector
    pub fn command_line(&self) -> String {
        shell_words::join(&self.argv)
    }
}

/// Trait for launching external programs
pub trait CommandExecutor {
    /// Run the command, failing on any non-zero exit status
    fn run(&self, invocation: &Invocation) -> Result<()>;

    /// Run the command and return its standard output
    fn run_capture(&self, invocation: &Invocation) -> Result<String>;

    /// Enter a section in which launches are never refused because of an
    /// interrupt. Sections nest; each call is paired with
    /// [`resume_interrupts`](Self::resume_interrupts).
    fn suspend_interrupts(&self) {}

    /// Leave a section entered with [`suspend_interrupts`](Self::suspend_interrupts)
    fn resume_interrupts(&self) {}
}

/// Render a path as a command argument
pub fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Clean up a PATH value so that the system administration tools are found.
///
/// Entries that are relative or look like injection attempts are dropped.
/// If any standard directory is missing, the standard directories are put in
/// front (in their canonical order) followed by the remaining entries.
pub fn sanitize_path(path: &str) -> String {
    let mut clean_entries: Vec<&str> = Vec::new();

    for entry in path.split(':').filter(|e| !e.is_empty()) {
        if entry.contains("..") || entry.contains(';') || entry.contains("&&") {
            warn!("Skipping suspicious PATH entry: {}", entry);
            continue;
        }

        if !entry.starts_with('/') {
            warn!("Skipping relative PATH entry: {}", entry);
            continue;
        }

        if !clean_entries.contains(&entry) {
            clean_entries.push(entry);
        }
    }

    if STANDARD_PATH_DIRS
        .iter()
        .all(|dir| clean_entries.contains(dir))
    {
        return clean_entries.join(":");
    }

    let mut result: Vec<&str> = STANDARD_PATH_DIRS.to_vec();
    result.extend(
        clean_entries
            .into_iter()
            .filter(|entry| !STANDARD_PATH_DIRS.contains(entry)),
    );
    result.join(":")
}

/// Apply [`sanitize_path`] to the PATH of the current process
pub fn sanitize_process_path() {
    let current = std::env::var("PATH").unwrap_or_default();
    std::env::set_var("PATH", sanitize_path(&current));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_quotes_arguments() {
        let invocation = Invocation::new(["chroot", "/mnt/tmp x", "chpasswd"]);
        assert_eq!(invocation.command_line(), "chroot '/mnt/tmp x' chpasswd");
        assert_eq!(invocation.program(), "chroot");
    }

    #[test]
    fn test_sanitize_path_completes_minimal_root_path() {
        assert_eq!(
            sanitize_path("/usr/local/sbin:/usr/local/bin:/usr/bin"),
            "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin"
        );
    }

    #[test]
    fn test_sanitize_path_keeps_complete_path_order() {
        assert_eq!(
            sanitize_path("/usr/local/bin:/usr/local/sbin:/usr/bin:/usr/sbin:/bin:/sbin:."),
            "/usr/local/bin:/usr/local/sbin:/usr/bin:/usr/sbin:/bin:/sbin"
        );
    }

    #[test]
    fn test_sanitize_path_keeps_extra_entries_after_standard_ones() {
        assert_eq!(
            sanitize_path("/usr/local/bin:/usr/bin:/bin:/usr/local/games:/usr/games"),
            "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin:/usr/local/games:/usr/games"
        );
        assert_eq!(
            sanitize_path("/one:/two"),
            "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin:/one:/two"
        );
    }

    #[test]
    fn test_sanitize_path_drops_suspicious_entries() {
        let sanitized = sanitize_path("/opt/../tmp:bin;rm:/usr/bin&&x:relative/dir:/one");
        assert_eq!(
            sanitized,
            "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin:/one"
        );
    }
}

// file: src/executor/local.rs
// version: 1.1.0
// guid: 9d015030-6b94-4d4d-8da5-b8e24836eef2

//! Local command execution on the build host

use super::{CommandExecutor, Invocation};
use crate::error::BootstrapError;
use crate::Result;
use std::io::Write;
use std::process::{Child, Command, Output, Stdio};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, error};

/// Interrupt bookkeeping shared between the signal handler and the executor
#[derive(Debug, Default)]
pub struct InterruptState {
    pending: AtomicBool,
    received: AtomicBool,
    suspended: AtomicUsize,
}

impl InterruptState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a SIGINT; the next command launch fails once
    pub fn notify(&self) {
        self.received.store(true, Ordering::SeqCst);
        self.pending.store(true, Ordering::SeqCst);
    }

    /// Whether a SIGINT was seen at any point during the run
    pub fn was_received(&self) -> bool {
        self.received.load(Ordering::SeqCst)
    }

    /// Stop refusing launches; a pending interrupt stays pending
    pub fn suspend(&self) {
        self.suspended.fetch_add(1, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        let _ = self
            .suspended
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }

    fn take_pending(&self) -> bool {
        if self.suspended.load(Ordering::SeqCst) > 0 {
            return false;
        }
        self.pending.swap(false, Ordering::SeqCst)
    }
}

/// Executes commands directly on the local machine
pub struct LocalExecutor {
    interrupts: Arc<InterruptState>,
}

impl LocalExecutor {
    /// Create a new local executor
    pub fn new(interrupts: Arc<InterruptState>) -> Self {
        Self { interrupts }
    }

    fn spawn(&self, invocation: &Invocation, capture: bool) -> Result<Child> {
        if self.interrupts.take_pending() {
            return Err(BootstrapError::Interrupted);
        }

        debug!("# {}", invocation.command_line());

        let (program, args) = invocation
            .argv
            .split_first()
            .ok_or_else(|| BootstrapError::validation("Cannot run an empty command"))?;

        let mut command = Command::new(program);
        command.args(args);

        if let Some(env) = &invocation.env {
            command.env_clear().envs(env);
        }
        if let Some(cwd) = &invocation.cwd {
            command.current_dir(cwd);
        }
        if invocation.stdin.is_some() {
            command.stdin(Stdio::piped());
        }
        if capture {
            command.stdout(Stdio::piped());
        }

        command.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BootstrapError::CommandNotFound {
                    program: program.clone(),
                }
            } else {
                BootstrapError::Io(e)
            }
        })
    }

    fn wait(&self, invocation: &Invocation, mut child: Child) -> Result<Output> {
        if let Some(input) = &invocation.stdin {
            if let Some(mut stdin) = child.stdin.take() {
                stdin.write_all(input.as_bytes())?;
            }
        }

        let output = child.wait_with_output()?;

        if !output.status.success() {
            let exit_code = output.status.code();
            error!("Command failed with exit code {:?}", exit_code);
            return Err(BootstrapError::CommandFailed {
                command: invocation.command_line(),
                exit_code,
            });
        }

        Ok(output)
    }
}

impl CommandExecutor for LocalExecutor {
    fn run(&self, invocation: &Invocation) -> Result<()> {
        let child = self.spawn(invocation, false)?;
        self.wait(invocation, child)?;
        Ok(())
    }

    fn run_capture(&self, invocation: &Invocation) -> Result<String> {
        let child = self.spawn(invocation, true)?;
        let output = self.wait(invocation, child)?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn suspend_interrupts(&self) {
        self.interrupts.suspend();
    }

    fn resume_interrupts(&self) {
        self.interrupts.resume();
    }
}

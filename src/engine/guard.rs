// file: src/engine/guard.rs
// version: 1.1.0
// guid: 0d126fec-95bd-4145-bc9b-ebc18e916253

//! Ordered release of acquired resources
//!
//! Every acquisition in the pipeline is immediately followed by a push of
//! its release. Releases run newest first, either up to a token in the
//! middle of a run or all at once when the run ends. Launches made while
//! releasing are never refused because of a pending interrupt.

use crate::error::BootstrapError;
use crate::executor::CommandExecutor;
use crate::Result;
use tracing::{debug, error};

type Release<'a> = Box<dyn FnOnce() -> Result<()> + 'a>;

struct Entry<'a> {
    label: String,
    release: Release<'a>,
}

/// Position of a pushed release within a [`CleanupStack`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardToken(usize);

/// Stack of labelled release closures
#[derive(Default)]
pub struct CleanupStack<'a> {
    entries: Vec<Entry<'a>>,
    executor: Option<&'a dyn CommandExecutor>,
}

impl<'a> CleanupStack<'a> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            executor: None,
        }
    }

    /// A stack whose releases launch commands through `executor`
    pub fn with_executor(executor: &'a dyn CommandExecutor) -> Self {
        Self {
            entries: Vec::new(),
            executor: Some(executor),
        }
    }

    /// Register the release of a resource that was just acquired
    pub fn push<F>(&mut self, label: impl Into<String>, release: F) -> GuardToken
    where
        F: FnOnce() -> Result<()> + 'a,
    {
        let label = label.into();
        debug!("Registered release: {}", label);
        self.entries.push(Entry {
            label,
            release: Box::new(release),
        });
        GuardToken(self.entries.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Release the entry behind `token` and everything pushed after it,
    /// newest first.
    ///
    /// All of them are released even if one fails; the first failure is
    /// returned and later ones are logged.
    pub fn release(&mut self, token: GuardToken) -> Result<()> {
        if let Some(executor) = self.executor {
            executor.suspend_interrupts();
        }

        let mut first_failure = None;
        while self.entries.len() > token.0 {
            if let Err(err) = self.pop_and_release() {
                if first_failure.is_none() {
                    first_failure = Some(err);
                } else {
                    error!("{}", err);
                }
            }
        }

        if let Some(executor) = self.executor {
            executor.resume_interrupts();
        }
        first_failure.map_or(Ok(()), Err)
    }

    /// Release everything and combine the outcome with that of the
    /// guarded work.
    ///
    /// A failure of the work takes precedence over release failures, which
    /// are then only logged. If the work succeeded, the first release
    /// failure is returned.
    pub fn finish<T>(mut self, outcome: Result<T>) -> Result<T> {
        let released = self.release(GuardToken(0));
        match (outcome, released) {
            (Err(primary), Err(secondary)) => {
                error!("Release failed while handling an earlier error: {}", secondary);
                Err(primary)
            }
            (Err(primary), Ok(())) => Err(primary),
            (Ok(_), Err(secondary)) => Err(secondary),
            (Ok(value), Ok(())) => Ok(value),
        }
    }

    fn pop_and_release(&mut self) -> Result<()> {
        let Some(entry) = self.entries.pop() else {
            return Ok(());
        };
        debug!("Releasing: {}", entry.label);
        (entry.release)().map_err(|err| {
            error!("Release \"{}\" failed: {}", entry.label, err);
            err
        })
    }
}

impl Drop for CleanupStack<'_> {
    fn drop(&mut self) {
        // Only reached with entries left when unwinding from a panic
        if !self.entries.is_empty() {
            let _ = self.release(GuardToken(0));
        }
    }
}

/// Convenience for releases that cannot fail
pub fn infallible<'a, F>(action: F) -> impl FnOnce() -> Result<()> + 'a
where
    F: FnOnce() + 'a,
{
    move || {
        action();
        Ok::<(), BootstrapError>(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{Invocation, InterruptState, LocalExecutor};
    use crate::retry::keep_trying_command;
    use crate::testing::FakeHost;
    use std::cell::RefCell;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn failing(message: &'static str) -> impl FnOnce() -> Result<()> {
        move || Err(BootstrapError::validation(message))
    }

    #[test]
    fn test_releases_run_newest_first() {
        let log = RefCell::new(Vec::new());
        let mut stack = CleanupStack::new();
        stack.push("a", infallible(|| log.borrow_mut().push("a")));
        stack.push("b", infallible(|| log.borrow_mut().push("b")));
        stack.push("c", infallible(|| log.borrow_mut().push("c")));

        stack.finish(Ok(())).unwrap();

        assert_eq!(*log.borrow(), vec!["c", "b", "a"]);
    }

    #[test]
    fn test_release_up_to_token_keeps_older_entries() {
        // Arrange
        let log = RefCell::new(Vec::new());
        let mut stack = CleanupStack::new();
        stack.push("outer", infallible(|| log.borrow_mut().push("outer")));
        let token = stack.push("middle", infallible(|| log.borrow_mut().push("middle")));
        stack.push("inner", infallible(|| log.borrow_mut().push("inner")));

        // Act
        stack.release(token).unwrap();

        // Assert
        assert_eq!(*log.borrow(), vec!["inner", "middle"]);
        assert_eq!(stack.len(), 1);
        stack.finish(Ok(())).unwrap();
        assert_eq!(*log.borrow(), vec!["inner", "middle", "outer"]);
    }

    #[test]
    fn test_primary_error_wins_over_release_failure() {
        let released = RefCell::new(false);
        let mut stack = CleanupStack::new();
        stack.push("outer", infallible(|| *released.borrow_mut() = true));
        stack.push("inner", failing("umount failed"));

        let result: Result<()> = stack.finish(Err(BootstrapError::validation("bootstrap failed")));

        assert_eq!(result.unwrap_err().to_string(), "bootstrap failed");
        assert!(*released.borrow());
    }

    #[test]
    fn test_first_release_failure_is_reported_after_success() {
        let mut stack = CleanupStack::new();
        stack.push("outer", failing("rmdir failed"));
        stack.push("inner", failing("umount failed"));

        let result = stack.finish(Ok(7));

        assert_eq!(result.unwrap_err().to_string(), "umount failed");
    }

    #[test]
    fn test_drop_releases_leftovers() {
        let log = RefCell::new(Vec::new());
        {
            let mut stack = CleanupStack::new();
            stack.push("a", infallible(|| log.borrow_mut().push("a")));
        }
        assert_eq!(*log.borrow(), vec!["a"]);
    }

    #[test]
    fn test_releases_run_after_interrupted_command() {
        // Arrange
        let temp_dir = TempDir::new().unwrap();
        let marker = temp_dir.path().join("released");
        let interrupts = Arc::new(InterruptState::new());
        let executor = LocalExecutor::new(Arc::clone(&interrupts));
        let host = FakeHost::new();
        let release = Invocation::new(["touch".to_string(), marker.display().to_string()]);

        let mut stack = CleanupStack::with_executor(&executor);
        stack.push("touch marker", || {
            keep_trying_command(&host, || executor.run(&release))
        });

        // Act: Ctrl+C kills the running child and leaves the interrupt pending
        let outcome = executor.run(&Invocation::new(["sh", "-c", "exit 130"]));
        interrupts.notify();
        let result = stack.finish(outcome);

        // Assert
        assert!(matches!(
            result,
            Err(BootstrapError::CommandFailed {
                exit_code: Some(130),
                ..
            })
        ));
        assert!(marker.exists());
        assert!(interrupts.was_received());
    }

    #[test]
    fn test_pending_interrupt_survives_partial_release() {
        let interrupts = Arc::new(InterruptState::new());
        let executor = LocalExecutor::new(Arc::clone(&interrupts));
        let mut stack = CleanupStack::with_executor(&executor);
        let token = stack.push("true", || executor.run(&Invocation::new(["true"])));
        interrupts.notify();

        stack.release(token).unwrap();
        let next = executor.run(&Invocation::new(["true"]));

        assert!(matches!(next, Err(BootstrapError::Interrupted)));
        stack.finish(Ok(())).unwrap();
    }
}

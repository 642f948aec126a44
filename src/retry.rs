// file: src/retry.rs
// version: 1.0.0
// guid: 996c2b67-c7bd-422c-88a6-4685291993f5

//! Bounded retry for operations that race with the kernel
//!
//! Partition table re-reads, device mapper (de)activation and unmounting can
//! fail transiently while udev or the kernel are still busy with the device.

use crate::error::BootstrapError;
use crate::host::Host;
use crate::Result;
use std::time::Duration;
use tracing::warn;

/// How often and how patiently to retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

/// Run `operation` until it succeeds or the policy is exhausted.
///
/// Errors for which `is_fatal` returns true are returned immediately.
/// Once all attempts are used up, the last error is returned.
pub fn keep_trying<T, F, P>(
    host: &dyn Host,
    policy: RetryPolicy,
    mut operation: F,
    is_fatal: P,
) -> Result<T>
where
    F: FnMut() -> Result<T>,
    P: Fn(&BootstrapError) -> bool,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation() {
            Ok(value) => return Ok(value),
            Err(err) if is_fatal(&err) || attempt >= attempts => return Err(err),
            Err(err) => {
                warn!(
                    "Attempt {} of {} failed ({}), retrying in {:?}",
                    attempt, attempts, err, policy.delay
                );
                host.sleep(policy.delay);
                attempt += 1;
            }
        }
    }
}

/// [`keep_trying`] with the default policy, aborting on "command not found"
pub fn keep_trying_command<T, F>(host: &dyn Host, operation: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    keep_trying(host, RetryPolicy::default(), operation, |e| {
        matches!(e, BootstrapError::Interrupted) || e.is_command_not_found()
    })
}

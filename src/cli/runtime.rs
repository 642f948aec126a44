// file: src/cli/runtime.rs
// version: 1.1.0
// guid: 70550985-3d7a-44bc-8bde-5fdb5adfedea

//! Process level glue: logging, Ctrl+C, error reporting and exit status
//!
//! The pipeline itself is blocking. It runs on a blocking thread while the
//! async side waits for SIGINT. A SIGINT only raises a flag; the next
//! command launch outside of a release then fails so that the regular
//! unwind path releases everything acquired so far.

use super::args::OutputArgs;
use crate::error::BootstrapError;
use crate::executor::{sanitize_process_path, InterruptState};
use crate::logging::init_logger;
use crate::Result;
use colored::Colorize;
use std::error::Error as _;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};

/// Exit status after SIGINT (128 + 2)
pub const EXIT_INTERRUPTED: u8 = 130;

/// Exit status for any reported error
pub const EXIT_FAILURE: u8 = 1;

const BUG_REPORT_URL: &str = "https://github.com/hartwork/image-bootstrap/issues";

/// Run `work` on a blocking thread and turn its outcome into an exit code
pub async fn run_to_exit_code<F>(output: OutputArgs, work: F) -> ExitCode
where
    F: FnOnce(Arc<InterruptState>) -> Result<()> + Send + 'static,
{
    let color = output.color.is_wanted();
    colored::control::set_override(color);

    if let Err(err) = init_logger(output.verbose, output.quiet, color) {
        report_error(&err, output.debug);
        return ExitCode::from(EXIT_FAILURE);
    }

    // Before any thread of ours exists
    sanitize_process_path();

    let interrupts = Arc::new(InterruptState::new());

    let signal_state = Arc::clone(&interrupts);
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received Ctrl+C, releasing resources...");
            signal_state.notify();
        }
    });

    let worker_state = Arc::clone(&interrupts);
    let outcome = match tokio::task::spawn_blocking(move || work(worker_state)).await {
        Ok(outcome) => outcome,
        Err(e) => Err(BootstrapError::validation(format!(
            "Bootstrap thread failed: {}",
            e
        ))),
    };

    let status = exit_status(&outcome, interrupts.was_received());
    match outcome {
        Ok(()) => {}
        Err(_) if status == EXIT_INTERRUPTED => info!("Interrupted."),
        Err(err) => report_error(&err, output.debug),
    }
    ExitCode::from(status)
}

/// Exit status for the outcome of a run
pub fn exit_status(outcome: &Result<()>, interrupted: bool) -> u8 {
    match outcome {
        Ok(()) => 0,
        Err(BootstrapError::Interrupted) => EXIT_INTERRUPTED,
        Err(_) if interrupted => EXIT_INTERRUPTED,
        Err(_) => EXIT_FAILURE,
    }
}

/// Print the error to stderr, with its cause chain when debugging
fn report_error(err: &BootstrapError, debug: bool) {
    eprintln!("{} {}", "Error:".red().bold(), err);

    if debug {
        let mut source = err.source();
        while let Some(cause) = source {
            eprintln!("  caused by: {}", cause);
            source = cause.source();
        }
    }

    eprintln!(
        "If this looks like a bug to you, please file a report at {}.  Thank you!",
        BUG_REPORT_URL
    );
}

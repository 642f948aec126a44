// file: src/logging/logger.rs
// version: 2.0.0
// guid: 72659936-38dc-4c4d-83da-06a5a064d096

//! Logger initialization and pipeline stage spans

use crate::error::BootstrapError;
use crate::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter directive for the given verbosity flags
fn filter_directive(verbose: bool, quiet: bool) -> &'static str {
    if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "info"
    }
}

/// Initialize the logging system.
///
/// `--quiet` wins over `--verbose`.
pub fn init_logger(verbose: bool, quiet: bool, color: bool) -> Result<()> {
    let filter = EnvFilter::new(filter_directive(verbose, quiet));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(color)
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .without_time()
                .compact(),
        )
        .try_init()
        .map_err(|e| BootstrapError::config(format!("Failed to initialize logger: {}", e)))?;

    Ok(())
}

/// Run one pipeline stage inside its own span
pub fn with_stage_span<F, R>(name: &'static str, f: F) -> R
where
    F: FnOnce() -> R,
{
    let span = tracing::info_span!("stage", name = name);
    let _enter = span.enter();
    f()
}

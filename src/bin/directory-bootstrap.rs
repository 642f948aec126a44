// file: src/bin/directory-bootstrap.rs
// version: 1.0.0
// guid: 8ee60d23-978b-435d-b9de-27d878c81e36

//! directory-bootstrap - main entry point

use clap::Parser;
use image_bootstrap::cli::{directory_bootstrap_command, run_to_exit_code, DirectoryCli};
use std::process::ExitCode;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = DirectoryCli::parse();
    let output = cli.output.clone();

    run_to_exit_code(output, move |interrupts| directory_bootstrap_command(cli, interrupts)).await
}

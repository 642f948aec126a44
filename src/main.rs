// file: src/main.rs
// version: 2.0.0
// guid: 6b7b3877-b23d-440e-9419-ef77c8501185

//! image-bootstrap - main entry point

use clap::Parser;
use image_bootstrap::cli::{image_bootstrap_command, run_to_exit_code, ImageCli};
use std::process::ExitCode;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = ImageCli::parse();
    let output = cli.output.clone();

    run_to_exit_code(output, move |interrupts| image_bootstrap_command(cli, interrupts)).await
}

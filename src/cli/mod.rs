// file: src/cli/mod.rs
// version: 2.0.0
// guid: 0b5b1cda-5325-43a5-bece-1682edf9efed

//! Command line interface for image-bootstrap and directory-bootstrap

pub mod args;
pub mod commands;
pub mod runtime;

pub use args::{DirectoryCli, ImageCli};
pub use commands::{directory_bootstrap_command, image_bootstrap_command};
pub use runtime::run_to_exit_code;

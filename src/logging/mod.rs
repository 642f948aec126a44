// file: src/logging/mod.rs
// version: 2.0.0
// guid: b436ffd4-7229-404a-a1af-1732b5fe253e

//! Logging for the bootstrap tools

pub mod logger;

pub use logger::{init_logger, with_stage_span};

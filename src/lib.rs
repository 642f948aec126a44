// file: src/lib.rs
// version: 3.0.0
// guid: 5380c3d7-42aa-4893-8cba-ca586ffae38b

//! # image-bootstrap
//!
//! Bootstraps bootable Linux disk images onto block devices, and plain root
//! file systems into directories.
//!
//! [`engine::BootstrapEngine`] drives the pipeline: partitioning, device
//! mapper activation, file system creation, mounting, the distribution's own
//! bootstrap, chroot configuration and bootloader installation. Everything it
//! acquires is released again in reverse order, whether the run succeeds or
//! not. Distributions plug in through [`distro::DistroStrategy`].

pub mod boot_loaders;
pub mod cli;
pub mod config;
pub mod disk;
pub mod distro;
pub mod engine;
pub mod error;
pub mod executor;
pub mod host;
pub mod logging;
pub mod mount;
pub mod retry;
pub mod scripts;
pub mod types;

#[cfg(test)]
mod testing;

pub use error::{BootstrapError, Result};

/// Version information for the tools
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

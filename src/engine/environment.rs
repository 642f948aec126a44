// file: src/engine/environment.rs
// version: 1.0.0
// guid: b2ad182d-5fe5-4d17-936f-2cf3041b73bd

//! Environment for commands run inside the chroot and for user scripts

use crate::executor::Environment;
use std::path::Path;

/// Variables of the build host that must not leak into the chroot
const SCRUBBED_VARIABLES: [&str; 3] = ["LANG", "LANGUAGE", "TMPDIR"];

/// Derive the environment for chroot commands and scripts.
///
/// `HOSTNAME` and `MNTPOINT` are set for grml-debootstrap compatibility.
/// Pre and post scripts additionally learn where the root is mounted.
pub fn chroot_environment(
    base: &Environment,
    hostname: &str,
    mountpoint: Option<&Path>,
) -> Environment {
    let mut env = base.clone();
    for key in SCRUBBED_VARIABLES {
        env.remove(key);
    }

    env.insert("HOSTNAME".to_string(), hostname.to_string());
    env.insert("IB_HOSTNAME".to_string(), hostname.to_string());
    env.insert("LC_ALL".to_string(), "C".to_string());

    if let Some(mountpoint) = mountpoint {
        let mountpoint = mountpoint.to_string_lossy().into_owned();
        env.insert("IB_ROOT".to_string(), mountpoint.clone());
        env.insert("MNTPOINT".to_string(), mountpoint);
    }

    env
}

/// Snapshot of the current process environment
pub fn process_environment() -> Environment {
    std::env::vars().collect()
}

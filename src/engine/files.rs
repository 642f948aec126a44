// file: src/engine/files.rs
// version: 1.0.0
// guid: 103f0d16-b614-4ec3-8304-b429a5d1b0a1

//! Files the engine writes into the root file system itself

use crate::types::{FsUuid, MachineId};
use crate::Result;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{info, warn};

/// Copy only the `nameserver` lines of a resolv.conf.
///
/// Search domains and options of the build host have no business in the
/// image.
pub fn filter_copy_resolv_conf(input: &Path, output: &Path) -> Result<()> {
    info!(
        "Writing file \"{}\" (based on file \"{}\")...",
        output.display(),
        input.display()
    );

    let reader = BufReader::new(fs::File::open(input)?);
    let mut content = String::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim_end();
        if line.starts_with("nameserver") {
            content.push_str(line);
            content.push('\n');
        }
    }

    fs::write(output, content)?;
    Ok(())
}

/// Write `etc/fstab` with the root file system as the only entry
pub fn write_etc_fstab(root: &Path, uuid: &FsUuid) -> Result<()> {
    let filename = root.join("etc").join("fstab");
    info!("Writing file \"{}\"...", filename.display());
    fs::write(
        &filename,
        format!("/dev/disk/by-uuid/{} / auto defaults 0 1\n", uuid),
    )?;
    Ok(())
}

/// Write `etc/machine-id`
pub fn write_etc_machine_id(root: &Path, machine_id: &MachineId) -> Result<()> {
    let filename = root.join("etc").join("machine-id");
    info!("Writing file \"{}\"...", filename.display());
    fs::write(&filename, format!("{}\n", machine_id))?;
    Ok(())
}

/// Work out the root password: the first line of the password file if one
/// is given, the password from the command line otherwise
pub fn resolve_root_password(
    password: Option<&str>,
    password_file: Option<&Path>,
) -> Result<Option<String>> {
    if let Some(password_file) = password_file {
        info!(
            "Reading root password from file \"{}\"...",
            password_file.display()
        );
        let content = fs::read_to_string(password_file)?;
        let first_line = content.split('\n').next().unwrap_or_default();
        return Ok(Some(first_line.to_string()));
    }

    if password.is_some() {
        warn!(
            "Using --password PASSWORD is a security risk more often than not; \
             please consider using --password-file FILE, instead."
        );
    }

    Ok(password.map(str::to_string))
}

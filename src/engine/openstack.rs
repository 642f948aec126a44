// file: src/engine/openstack.rs
// version: 1.0.0
// guid: 9327ef60-2796-4088-b99c-9838d573544b

//! Preparing images for OpenStack clouds

use crate::distro::{ChrootContext, DistroStrategy, COMMAND_FIND};
use crate::error::BootstrapError;
use crate::executor::{path_arg, Invocation};
use crate::Result;
use serde_yaml::{Mapping, Value};
use std::fs::{self, DirBuilder};
use std::io::ErrorKind;
use std::os::unix::fs::DirBuilderExt;
use tracing::info;

const CLOUD_CFG: &str = "etc/cloud/cloud.cfg";
const CLOUD_CFG_HEADER: &str = "# Re-written by image-bootstrap\n";
const CLOUD_USER_GECOS: &str = "Cloud-init-user";
const CLOUD_USER_SUDO: &str = "ALL=(ALL) NOPASSWD:ALL";
const DATASOURCE_CFG_CONTENT: &str = "# generated by image-bootstrap\n\
                                      datasource_list: [ConfigDrive, NoCloud, OpenStack, Ec2]\n";

const TTY1_NOCLEAR_CONF: &str = "etc/systemd/system/getty@tty1.service.d/noclear.conf";
const TTY1_NOCLEAR_CONTENT: &str = "[Service]\nTTYVTDisallocate=no\n";

const MODPROBE_D: &str = "etc/modprobe.d";
const PCSPKR_CONF_NAME: &str = "pcspkr_no_autoload.conf";
const PCSPKR_CONTENT: &str =
    "# disable auto-loading of pcspkr module, by image-bootstrap\nblacklist pcspkr\n";

const SYSTEMD_RESOLVED_RESOLV_CONF: &str = "/run/systemd/resolve/resolv.conf";

/// Look up `key` in a YAML mapping, inserting an empty mapping if absent
fn child_mapping<'m>(parent: &'m mut Mapping, key: &str) -> Result<&'m mut Mapping> {
    let entry = parent
        .entry(Value::from(key))
        .or_insert_with(|| Value::Mapping(Mapping::new()));
    if entry.is_null() {
        *entry = Value::Mapping(Mapping::new());
    }
    entry.as_mapping_mut().ok_or_else(|| {
        BootstrapError::validation(format!("Key \"{}\" of cloud.cfg is not a mapping", key))
    })
}

/// Point cloud-init's default user and distro at the bootstrapped system
pub fn adjust_cloud_cfg(document: &mut Value, username: &str, cloud_init_distro: &str) -> Result<()> {
    if document.is_null() {
        *document = Value::Mapping(Mapping::new());
    }
    let top = document
        .as_mapping_mut()
        .ok_or_else(|| BootstrapError::validation("cloud.cfg is not a mapping"))?;

    let system_info = child_mapping(top, "system_info")?;
    {
        let default_user = child_mapping(system_info, "default_user")?;
        default_user.insert(Value::from("name"), Value::from(username));
        default_user.insert(Value::from("gecos"), Value::from(CLOUD_USER_GECOS));
        default_user
            .entry(Value::from("sudo"))
            .or_insert_with(|| Value::Sequence(vec![Value::from(CLOUD_USER_SUDO)]));
    }
    system_info.insert(Value::from("distro"), Value::from(cloud_init_distro));

    Ok(())
}

/// Rewrite cloud.cfg and the datasource list
pub fn configure_cloud_init(ctx: &ChrootContext<'_>, distro: &dyn DistroStrategy) -> Result<()> {
    let cloud_cfg = ctx.path(CLOUD_CFG);
    info!("Adjusting file \"{}\"...", cloud_cfg.display());

    let mut document: Value = serde_yaml::from_str(&fs::read_to_string(&cloud_cfg)?)?;
    adjust_cloud_cfg(&mut document, distro.cloud_username(), distro.cloud_init_distro())?;
    fs::write(
        &cloud_cfg,
        format!("{}{}", CLOUD_CFG_HEADER, serde_yaml::to_string(&document)?),
    )?;

    let datasource_cfg = ctx.path(distro.cloud_init_datasource_cfg_path());
    info!("Writing file \"{}\"...", datasource_cfg.display());
    fs::write(&datasource_cfg, DATASOURCE_CFG_CONTENT)?;

    Ok(())
}

/// Keep boot messages visible on the first console
pub fn disable_clearing_tty1(ctx: &ChrootContext<'_>) -> Result<()> {
    let noclear = ctx.path(TTY1_NOCLEAR_CONF);
    info!("Disabling clearing of tty1 (file \"{}\")...", noclear.display());

    if let Some(parent) = noclear.parent() {
        DirBuilder::new().recursive(true).mode(0o755).create(parent)?;
    }
    fs::write(&noclear, TTY1_NOCLEAR_CONTENT)?;
    Ok(())
}

pub fn disable_pcspkr_autoloading(ctx: &ChrootContext<'_>) -> Result<()> {
    let modprobe_d = ctx.path(MODPROBE_D);
    match DirBuilder::new().mode(0o755).create(&modprobe_d) {
        Err(e) if e.kind() != ErrorKind::AlreadyExists => return Err(e.into()),
        _ => {}
    }

    info!("Disabling auto-loading of pcspkr kernel module...");
    fs::write(modprobe_d.join(PCSPKR_CONF_NAME), PCSPKR_CONTENT)?;
    Ok(())
}

/// Delete SSH host keys so that no two instances share them
pub fn delete_sshd_keys(ctx: &ChrootContext<'_>) -> Result<()> {
    info!("Deleting SSH server keys (if any)...");
    ctx.executor.run(&Invocation::new([
        COMMAND_FIND.to_string(),
        format!("{}/", path_arg(&ctx.path("etc/ssh"))),
        "-type".to_string(),
        "f".to_string(),
        "-name".to_string(),
        "ssh_host_*key*".to_string(),
        "-delete".to_string(),
        "-print".to_string(),
    ]))
}

/// Remove the D-Bus machine id and truncate `etc/machine-id` unless an
/// explicit machine id was requested
pub fn clean_machine_id(ctx: &ChrootContext<'_>, keep_etc_machine_id: bool) -> Result<()> {
    let dbus_machine_id = ctx.path("var/lib/dbus/machine-id");
    match fs::remove_file(&dbus_machine_id) {
        Ok(()) => info!("Removing file \"{}\"...", dbus_machine_id.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    if !keep_etc_machine_id {
        let etc_machine_id = ctx.path("etc/machine-id");
        info!("Truncating file \"{}\"...", etc_machine_id.display());
        fs::write(&etc_machine_id, "")?;
    }

    Ok(())
}

/// Replace `etc/resolv.conf` by a link to the file systemd-resolved manages
pub fn hand_resolv_conf_to_systemd_resolved(ctx: &ChrootContext<'_>) -> Result<()> {
    info!("Handing /etc/resolv.conf over to systemd-resolved...");
    fs::remove_file(ctx.path("etc/resolv.conf"))?;
    ctx.run_in_chroot(["ln", "-s", SYSTEMD_RESOLVED_RESOLV_CONF, "/etc/resolv.conf"])
}

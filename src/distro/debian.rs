// file: src/distro/debian.rs
// version: 1.0.0
// guid: bb9febd6-8c97-4a64-aa6a-bd2850815910

//! Debian and Ubuntu, bootstrapped with debootstrap

use super::{write_etc_hostname, ChrootContext, DistroStrategy, COMMAND_FIND};
use crate::config::BootloaderApproach;
use crate::error::BootstrapError;
use crate::executor::{path_arg, CommandExecutor, Invocation};
use crate::scripts::COMMAND_CHROOT;
use crate::Result;
use std::fs;
use std::io::ErrorKind;
use std::os::unix::fs::PermissionsExt;
use tracing::info;

pub const COMMAND_DEBOOTSTRAP: &str = "debootstrap";
pub const COMMAND_UNAME: &str = "uname";
pub const COMMAND_UNSHARE: &str = "unshare";

const POLICY_RC_D: &str = "usr/sbin/policy-rc.d";
const POLICY_RC_D_CONTENT: &str = "#! /bin/sh\nexit 101\n";

const ETC_NETWORK_INTERFACES_CONTENT: &str = "\
# This file describes the network interfaces available on your system
# and how to activate them. For more information, see interfaces(5).

source /etc/network/interfaces.d/*

# The loopback network interface
auto lo
iface lo inet loopback

# The primary network interface
allow-hotplug eth0
iface eth0 inet dhcp
";

/// Symbolic release names that move over time
const MOVING_RELEASE_NAMES: [&str; 4] = ["oldoldstable", "oldstable", "stable", "testing"];

/// Releases debootstrap can no longer produce bootable images of
const UNSUPPORTED_RELEASES: [&str; 5] = ["wheezy", "jessie", "stretch", "buster", "bullseye"];

/// Which Debian based distribution to bootstrap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebianFlavor {
    Debian,
    Ubuntu,
}

impl DebianFlavor {
    pub fn key(self) -> &'static str {
        match self {
            DebianFlavor::Debian => "debian",
            DebianFlavor::Ubuntu => "ubuntu",
        }
    }

    pub fn name_short(self) -> &'static str {
        match self {
            DebianFlavor::Debian => "Debian",
            DebianFlavor::Ubuntu => "Ubuntu",
        }
    }

    pub fn name_long(self) -> &'static str {
        match self {
            DebianFlavor::Debian => "Debian GNU/Linux",
            DebianFlavor::Ubuntu => "Ubuntu",
        }
    }

    pub fn default_release(self) -> &'static str {
        match self {
            DebianFlavor::Debian => "trixie",
            DebianFlavor::Ubuntu => "noble",
        }
    }

    pub fn default_mirror_url(self) -> &'static str {
        match self {
            DebianFlavor::Debian => "http://httpredir.debian.org/debian",
            DebianFlavor::Ubuntu => "http://archive.ubuntu.com/ubuntu",
        }
    }

    /// Mirror URL of a local apt-cacher-ng instance, for help texts
    pub fn apt_cacher_ng_url(self) -> &'static str {
        match self {
            DebianFlavor::Debian => "http://localhost:3142/debian",
            DebianFlavor::Ubuntu => "http://localhost:3142/ubuntu",
        }
    }

    fn kernel_package_name(self, architecture: &str) -> String {
        match (self, architecture) {
            (DebianFlavor::Ubuntu, _) => "linux-image-generic".to_string(),
            (DebianFlavor::Debian, "i386") => "linux-image-686-pae".to_string(),
            (DebianFlavor::Debian, arch) => format!("linux-image-{}", arch),
        }
    }
}

/// Command line options of the debian and ubuntu sub-commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebootstrapOptions {
    /// Release code name; the flavor's default when absent
    pub release: Option<String>,
    /// Mirror URL; the flavor's default when absent
    pub mirror_url: Option<String>,
    pub command_debootstrap: String,
    /// Passed to debootstrap verbatim
    pub debootstrap_opt: Vec<String>,
}

impl Default for DebootstrapOptions {
    fn default() -> Self {
        Self {
            release: None,
            mirror_url: None,
            command_debootstrap: COMMAND_DEBOOTSTRAP.to_string(),
            debootstrap_opt: Vec::new(),
        }
    }
}

/// Strategy for Debian and Ubuntu
#[derive(Debug, Clone)]
pub struct DebianStrategy {
    flavor: DebianFlavor,
    release: String,
    mirror_url: String,
    command_debootstrap: String,
    debootstrap_opt: Vec<String>,
}

impl DebianStrategy {
    pub fn new(flavor: DebianFlavor, options: DebootstrapOptions) -> Self {
        Self {
            flavor,
            release: options
                .release
                .unwrap_or_else(|| flavor.default_release().to_string()),
            mirror_url: options
                .mirror_url
                .unwrap_or_else(|| flavor.default_mirror_url().to_string()),
            command_debootstrap: options.command_debootstrap,
            debootstrap_opt: options.debootstrap_opt,
        }
    }

    pub fn debian(options: DebootstrapOptions) -> Self {
        Self::new(DebianFlavor::Debian, options)
    }

    pub fn ubuntu(options: DebootstrapOptions) -> Self {
        Self::new(DebianFlavor::Ubuntu, options)
    }

    pub fn flavor(&self) -> DebianFlavor {
        self.flavor
    }

    pub fn release(&self) -> &str {
        &self.release
    }

    pub fn mirror_url(&self) -> &str {
        &self.mirror_url
    }

    fn install_packages(&self, ctx: &ChrootContext<'_>, package_names: &[&str]) -> Result<()> {
        info!("Installing {}...", package_names.join(", "));

        let mut env = ctx.env.clone();
        env.entry("DEBIAN_FRONTEND".to_string())
            .or_insert_with(|| "noninteractive".to_string());

        let mut argv = vec![
            COMMAND_CHROOT.to_string(),
            path_arg(ctx.root),
            "apt-get".to_string(),
            "install".to_string(),
            "-y".to_string(),
            "--no-install-recommends".to_string(),
            "-V".to_string(),
        ];
        argv.extend(package_names.iter().map(|p| p.to_string()));

        ctx.executor.run(&Invocation::new(argv).with_env(&env))
    }
}

impl DistroStrategy for DebianStrategy {
    fn distro_key(&self) -> &str {
        self.flavor.key()
    }

    fn distro_name_long(&self) -> &str {
        self.flavor.name_long()
    }

    fn check_release(&self) -> Result<()> {
        let release = self.release.as_str();

        if MOVING_RELEASE_NAMES.contains(&release) {
            return Err(BootstrapError::validation(format!(
                "For {} releases, please use names like \"{}\" rather than \"{}\".",
                self.flavor.name_short(),
                self.flavor.default_release(),
                release
            )));
        }

        if UNSUPPORTED_RELEASES.contains(&release) {
            return Err(BootstrapError::validation(format!(
                "Release \"{}\" is no longer supported.",
                release
            )));
        }

        Ok(())
    }

    fn commands_to_check_for(&self) -> Vec<String> {
        vec![
            COMMAND_CHROOT.to_string(),
            COMMAND_FIND.to_string(),
            COMMAND_UNAME.to_string(),
            COMMAND_UNSHARE.to_string(),
            self.command_debootstrap.clone(),
        ]
    }

    fn check_architecture(&self, executor: &dyn CommandExecutor, architecture: &str) -> Result<String> {
        let output = executor.run_capture(&Invocation::new([COMMAND_UNAME, "-m"]))?;
        let host_machine = output.trim_end();

        let supported = match architecture {
            "amd64" => host_machine == "x86_64",
            "i386" => matches!(host_machine, "i386" | "i486" | "i586" | "i686" | "x86_64"),
            _ => true,
        };

        if !supported {
            return Err(BootstrapError::unsupported(format!(
                "Bootstrapping architecture {} on {} machines not supported",
                architecture, host_machine
            )));
        }

        Ok(architecture.to_string())
    }

    fn configure_hostname(&self, ctx: &ChrootContext<'_>, hostname: &str) -> Result<()> {
        write_etc_hostname(ctx.root, hostname)
    }

    fn allow_autostart_of_services(&self, ctx: &ChrootContext<'_>, allow: bool) -> Result<()> {
        let policy_rc_d_path = ctx.path(POLICY_RC_D);

        info!(
            "{} auto-starting of services from package installations (by {} file \"{}\")...",
            if allow { "Re-activating" } else { "Deactivating" },
            if allow { "removing" } else { "writing" },
            policy_rc_d_path.display()
        );

        if allow {
            match fs::remove_file(&policy_rc_d_path) {
                Err(e) if e.kind() != ErrorKind::NotFound => return Err(e.into()),
                _ => {}
            }
        } else {
            // invoke-rc.d refuses to start anything while this exits 101
            fs::write(&policy_rc_d_path, POLICY_RC_D_CONTENT)?;
            fs::set_permissions(&policy_rc_d_path, fs::Permissions::from_mode(0o755))?;
        }

        Ok(())
    }

    fn run_directory_bootstrap(
        &self,
        ctx: &ChrootContext<'_>,
        architecture: &str,
        approach: BootloaderApproach,
    ) -> Result<()> {
        info!(
            "Bootstrapping {} \"{}\" into \"{}\"...",
            self.flavor.name_short(),
            self.release,
            ctx.root.display()
        );

        let mut extra_packages = vec![
            "initramfs-tools".to_string(),
            self.flavor.kernel_package_name(architecture),
        ];
        match approach {
            approach if approach.is_grub2() => extra_packages.push("grub-pc".to_string()),
            BootloaderApproach::HostExtlinux | BootloaderApproach::None => {}
            other => {
                return Err(BootstrapError::unsupported(format!(
                    "Unsupported bootloader \"{}\" for {}",
                    other,
                    self.flavor.name_short()
                )))
            }
        }

        let mut argv = vec![
            COMMAND_UNSHARE.to_string(),
            "--mount".to_string(),
            "--".to_string(),
            self.command_debootstrap.clone(),
            "--arch".to_string(),
            architecture.to_string(),
            format!("--include={}", extra_packages.join(",")),
        ];
        argv.extend(self.debootstrap_opt.iter().cloned());
        argv.extend([self.release.clone(), path_arg(ctx.root), self.mirror_url.clone()]);

        ctx.executor.run(&Invocation::new(argv))
    }

    fn create_network_configuration(&self, ctx: &ChrootContext<'_>, _use_mtu: Option<bool>) -> Result<()> {
        let filename = ctx.path("etc/network/interfaces");
        info!("Writing file \"{}\"...", filename.display());
        fs::write(&filename, ETC_NETWORK_INTERFACES_CONTENT)?;
        Ok(())
    }

    fn ensure_chroot_has_grub2_installed(&self, _ctx: &ChrootContext<'_>) -> Result<()> {
        // grub-pc came in with debootstrap --include
        Ok(())
    }

    fn chroot_command_grub2_install(&self) -> &str {
        "grub-install"
    }

    fn generate_grub_cfg_from_inside_chroot(&self, ctx: &ChrootContext<'_>) -> Result<()> {
        ctx.run_in_chroot(["update-grub"])
    }

    fn generate_initramfs_from_inside_chroot(&self, ctx: &ChrootContext<'_>) -> Result<()> {
        ctx.run_in_chroot(["update-initramfs", "-u", "-k", "all"])
    }

    fn perform_in_chroot_shipping_clean_up(&self, _ctx: &ChrootContext<'_>) -> Result<()> {
        Ok(())
    }

    fn perform_post_chroot_clean_up(&self, ctx: &ChrootContext<'_>) -> Result<()> {
        info!("Cleaning chroot apt cache...");
        ctx.executor.run(&Invocation::new([
            COMMAND_FIND.to_string(),
            path_arg(&ctx.path("var/cache/apt/archives")),
            "-type".to_string(),
            "f".to_string(),
            "-name".to_string(),
            "*.deb".to_string(),
            "-delete".to_string(),
        ]))
    }

    fn install_dhcp_client(&self, _ctx: &ChrootContext<'_>) -> Result<()> {
        Ok(())
    }

    fn install_sudo(&self, ctx: &ChrootContext<'_>) -> Result<()> {
        self.install_packages(ctx, &["sudo"])
    }

    fn install_cloud_init_and_friends(&self, ctx: &ChrootContext<'_>) -> Result<()> {
        self.install_packages(ctx, &["cloud-init", "cloud-utils", "cloud-initramfs-growroot"])
    }

    fn cloud_init_datasource_cfg_path(&self) -> &str {
        "/etc/cloud/cloud.cfg.d/90_dpkg.cfg"
    }

    fn install_sshd(&self, ctx: &ChrootContext<'_>) -> Result<()> {
        self.install_packages(ctx, &["openssh-server"])
    }

    fn make_openstack_services_autostart(&self, _ctx: &ChrootContext<'_>) -> Result<()> {
        Ok(())
    }

    fn install_acpid(&self, ctx: &ChrootContext<'_>) -> Result<()> {
        self.install_packages(ctx, &["acpid"])
    }

    fn vmlinuz_path(&self) -> &str {
        "/vmlinuz"
    }

    fn initramfs_path(&self) -> &str {
        "/initrd.img"
    }

    fn install_kernel(&self, _ctx: &ChrootContext<'_>) -> Result<()> {
        Ok(())
    }

    fn uses_systemd(&self) -> bool {
        true
    }

    fn uses_systemd_resolved(&self, _with_openstack: bool) -> bool {
        false
    }

    fn minimum_size_bytes(&self) -> u64 {
        2 * 1024 * 1024 * 1024
    }

    fn extra_mkfs_ext4_options(&self) -> Vec<String> {
        vec!["-O".to_string(), "^metadata_csum".to_string()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::Environment;
    use crate::testing::RecordingExecutor;
    use tempfile::TempDir;

    fn options(release: &str) -> DebootstrapOptions {
        DebootstrapOptions {
            release: Some(release.to_string()),
            ..DebootstrapOptions::default()
        }
    }

    #[test]
    fn test_defaults_follow_flavor() {
        let debian = DebianStrategy::debian(DebootstrapOptions::default());
        let ubuntu = DebianStrategy::ubuntu(DebootstrapOptions::default());

        assert_eq!(debian.release(), "trixie");
        assert_eq!(debian.mirror_url(), "http://httpredir.debian.org/debian");
        assert_eq!(ubuntu.release(), "noble");
        assert_eq!(ubuntu.distro_key(), "ubuntu");
        assert_eq!(ubuntu.cloud_username(), "ubuntu");
    }

    #[test]
    fn test_check_release() {
        assert!(DebianStrategy::debian(options("trixie")).check_release().is_ok());

        let err = DebianStrategy::debian(options("stable")).check_release().unwrap_err();
        assert_eq!(
            err.to_string(),
            "For Debian releases, please use names like \"trixie\" rather than \"stable\"."
        );

        let err = DebianStrategy::debian(options("jessie")).check_release().unwrap_err();
        assert!(err.to_string().contains("Release \"jessie\" is no longer supported."));
    }

    #[test]
    fn test_kernel_package_names() {
        assert_eq!(DebianFlavor::Debian.kernel_package_name("i386"), "linux-image-686-pae");
        assert_eq!(DebianFlavor::Debian.kernel_package_name("amd64"), "linux-image-amd64");
        assert_eq!(DebianFlavor::Ubuntu.kernel_package_name("amd64"), "linux-image-generic");
    }

    #[test]
    fn test_check_architecture_against_host_machine() {
        let strategy = DebianStrategy::debian(DebootstrapOptions::default());
        let executor = RecordingExecutor::new();
        executor.respond("uname -m", "i686\n");

        assert_eq!(strategy.check_architecture(&executor, "i386").unwrap(), "i386");

        let err = strategy.check_architecture(&executor, "amd64").unwrap_err();
        assert!(err
            .to_string()
            .contains("Bootstrapping architecture amd64 on i686 machines not supported"));
    }

    #[test]
    fn test_directory_bootstrap_command() {
        // Arrange
        let strategy = DebianStrategy::debian(DebootstrapOptions {
            release: Some("trixie".to_string()),
            mirror_url: Some("http://localhost:3142/debian".to_string()),
            command_debootstrap: "debootstrap".to_string(),
            debootstrap_opt: vec!["--variant=minbase".to_string()],
        });
        let executor = RecordingExecutor::new();
        let env = Environment::new();
        let ctx = ChrootContext::new(std::path::Path::new("/mnt/tmpx"), &env, &executor);

        // Act
        strategy
            .run_directory_bootstrap(&ctx, "amd64", BootloaderApproach::ChrootGrub2Device)
            .unwrap();

        // Assert
        assert_eq!(
            executor.command_lines(),
            vec![
                "unshare --mount -- debootstrap --arch amd64 \
                 --include=initramfs-tools,linux-image-amd64,grub-pc --variant=minbase \
                 trixie /mnt/tmpx http://localhost:3142/debian"
            ]
        );
    }

    #[test]
    fn test_extlinux_bootstrap_skips_grub_package() {
        let strategy = DebianStrategy::ubuntu(DebootstrapOptions::default());
        let executor = RecordingExecutor::new();
        let env = Environment::new();
        let ctx = ChrootContext::new(std::path::Path::new("/mnt/tmpx"), &env, &executor);

        strategy
            .run_directory_bootstrap(&ctx, "amd64", BootloaderApproach::HostExtlinux)
            .unwrap();

        assert!(executor.command_lines()[0]
            .contains("--include=initramfs-tools,linux-image-generic noble"));
    }

    #[test]
    fn test_policy_rc_d_toggles() {
        // Arrange
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("usr/sbin")).unwrap();
        let strategy = DebianStrategy::debian(DebootstrapOptions::default());
        let executor = RecordingExecutor::new();
        let env = Environment::new();
        let ctx = ChrootContext::new(temp_dir.path(), &env, &executor);
        let policy = temp_dir.path().join(POLICY_RC_D);

        // Act
        strategy.allow_autostart_of_services(&ctx, false).unwrap();

        // Assert
        assert_eq!(fs::read_to_string(&policy).unwrap(), "#! /bin/sh\nexit 101\n");
        assert_eq!(fs::metadata(&policy).unwrap().permissions().mode() & 0o777, 0o755);

        strategy.allow_autostart_of_services(&ctx, true).unwrap();
        assert!(!policy.exists());
        // Removing twice is fine
        strategy.allow_autostart_of_services(&ctx, true).unwrap();
    }

    #[test]
    fn test_package_installation_is_noninteractive() {
        let strategy = DebianStrategy::debian(DebootstrapOptions::default());
        let executor = RecordingExecutor::new();
        let mut env = Environment::new();
        env.insert("LC_ALL".to_string(), "C".to_string());
        let ctx = ChrootContext::new(std::path::Path::new("/mnt/tmpx"), &env, &executor);

        strategy.install_sshd(&ctx).unwrap();

        let calls = executor.invocations();
        assert_eq!(
            calls[0].command_line(),
            "chroot /mnt/tmpx apt-get install -y --no-install-recommends -V openssh-server"
        );
        let used_env = calls[0].env.clone().unwrap();
        assert_eq!(used_env.get("DEBIAN_FRONTEND").map(String::as_str), Some("noninteractive"));
        assert_eq!(used_env.get("LC_ALL").map(String::as_str), Some("C"));
    }

    #[test]
    fn test_network_configuration_is_written() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("etc/network")).unwrap();
        let strategy = DebianStrategy::debian(DebootstrapOptions::default());
        let executor = RecordingExecutor::new();
        let env = Environment::new();
        let ctx = ChrootContext::new(temp_dir.path(), &env, &executor);

        strategy.create_network_configuration(&ctx, Some(true)).unwrap();

        let content = fs::read_to_string(temp_dir.path().join("etc/network/interfaces")).unwrap();
        assert!(content.contains("allow-hotplug eth0\niface eth0 inet dhcp\n"));
    }

    #[test]
    fn test_post_chroot_clean_up_deletes_cached_packages() {
        let strategy = DebianStrategy::debian(DebootstrapOptions::default());
        let executor = RecordingExecutor::new();
        let env = Environment::new();
        let ctx = ChrootContext::new(std::path::Path::new("/mnt/tmpx"), &env, &executor);

        strategy.perform_post_chroot_clean_up(&ctx).unwrap();

        assert_eq!(
            executor.command_lines(),
            vec!["find /mnt/tmpx/var/cache/apt/archives -type f -name '*.deb' -delete"]
        );
    }
}

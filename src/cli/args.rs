// file: src/cli/args.rs
// version: 2.0.0
// guid: 049e00f4-e96b-46ea-8677-dbc030719112

//! Command line argument definitions

use crate::config::BootloaderApproach;
use crate::types::{DiskId, FsUuid, MachineId};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::io::IsTerminal;
use std::path::PathBuf;

const IMAGE_ABOUT: &str = "Bootstrap a bootable Linux disk image onto a block device";
const DIRECTORY_ABOUT: &str = "Bootstrap a Linux root file system into a directory";

/// When to colorize output
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorChoice {
    Never,
    Always,
    #[default]
    Auto,
}

impl ColorChoice {
    /// Resolve "auto" against whether stdout is a terminal
    pub fn is_wanted(self) -> bool {
        match self {
            Self::Never => false,
            Self::Always => true,
            Self::Auto => std::io::stdout().is_terminal(),
        }
    }
}

/// Text output configuration shared by both tools
#[derive(Args, Clone, Debug, Default)]
pub struct OutputArgs {
    /// Toggle output color
    #[arg(long, value_enum, default_value_t = ColorChoice::Auto, global = true)]
    pub color: ColorChoice,

    /// Print the full error chain on failure
    #[arg(long, global = true)]
    pub debug: bool,

    /// Limit output to error messages
    #[arg(long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Increase verbosity
    #[arg(long, global = true)]
    pub verbose: bool,
}

/// Machine configuration for image bootstrapping
#[derive(Args, Clone, Debug, Default)]
pub struct MachineArgs {
    /// Architecture (e.g. amd64)
    #[arg(long = "arch", value_name = "ARCH")]
    pub architecture: Option<String>,

    /// Approach to take during bootloader installation [default: auto]
    #[arg(long, value_enum, value_name = "APPROACH")]
    pub bootloader: Option<BootloaderApproach>,

    /// Apply more force when installing bootloader
    #[arg(long)]
    pub bootloader_force: bool,

    /// Hostname to set [default: machine]
    #[arg(long, value_name = "NAME")]
    pub hostname: Option<String>,

    /// Prepare for use with OpenStack
    #[arg(long)]
    pub openstack: bool,

    /// Root password to set (default: password log-in disabled)
    #[arg(long, value_name = "PASSWORD", conflicts_with = "password_file")]
    pub password: Option<String>,

    /// File to read root password from (default: password log-in disabled)
    #[arg(long, value_name = "FILE")]
    pub password_file: Option<PathBuf>,

    /// File to copy nameserver entries from [default: /etc/resolv.conf]
    #[arg(long, value_name = "FILE")]
    pub resolv_conf: Option<PathBuf>,

    /// Specific disk identifier to apply, e.g. 0x12345678
    #[arg(long, value_name = "ID")]
    pub disk_id: Option<DiskId>,

    /// Specific UUID to apply to first partition, e.g. c1b9d5a2-f162-11cf-9ece-0020afc76f16
    #[arg(long, value_name = "UUID")]
    pub first_partition_uuid: Option<FsUuid>,

    /// Specific machine identifier to apply, e.g. c1b9d5a2f16211cf9ece0020afc76f16
    #[arg(long, value_name = "ID")]
    pub machine_id: Option<MachineId>,
}

/// Customization script directories
#[derive(Args, Clone, Debug, Default)]
pub struct ScriptArgs {
    /// Scripts to run prior to chrooting phase, in alphabetical order
    #[arg(long, value_name = "DIRECTORY")]
    pub scripts_pre: Option<PathBuf>,

    /// Scripts to run during chrooting phase, in alphabetical order
    #[arg(long, value_name = "DIRECTORY")]
    pub scripts_chroot: Option<PathBuf>,

    /// Scripts to run after chrooting phase, in alphabetical order
    #[arg(long, value_name = "DIRECTORY")]
    pub scripts_post: Option<PathBuf>,
}

/// Options of the debootstrap based distributions
#[derive(Args, Clone, Debug)]
pub struct DebootstrapArgs {
    /// Override debootstrap command
    #[arg(long = "debootstrap", value_name = "COMMAND", default_value = "debootstrap")]
    pub command_debootstrap: String,

    /// Release to bootstrap (default: latest stable release)
    #[arg(long, value_name = "RELEASE")]
    pub release: Option<String>,

    /// Mirror to use, e.g. a local apt-cacher-ng instance
    #[arg(long = "mirror", value_name = "URL")]
    pub mirror_url: Option<String>,

    /// Option to pass to debootstrap, in addition; can be passed several
    /// times; use with --debootstrap-opt=... syntax
    #[arg(long, value_name = "OPTION", allow_hyphen_values = true)]
    pub debootstrap_opt: Vec<String>,

    /// Block device or directory to bootstrap into
    #[arg(value_name = "TARGET")]
    pub target: PathBuf,
}

/// Choice of distribution
#[derive(Subcommand, Clone, Debug)]
pub enum DistroCommand {
    /// Debian GNU/Linux
    Debian(DebootstrapArgs),
    /// Ubuntu
    Ubuntu(DebootstrapArgs),
}

impl DistroCommand {
    pub fn args(&self) -> &DebootstrapArgs {
        match self {
            Self::Debian(args) | Self::Ubuntu(args) => args,
        }
    }

    pub fn target(&self) -> &PathBuf {
        &self.args().target
    }
}

#[derive(Parser, Clone, Debug)]
#[command(name = "image-bootstrap")]
#[command(about = IMAGE_ABOUT)]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct ImageCli {
    #[command(flatten)]
    pub output: OutputArgs,

    /// YAML file with machine configuration; command line options win
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub machine: MachineArgs,

    #[command(flatten)]
    pub scripts: ScriptArgs,

    /// Override grub2-install command
    #[arg(long, value_name = "COMMAND")]
    pub grub2_install: Option<String>,

    #[command(subcommand)]
    pub distro: DistroCommand,
}

#[derive(Parser, Clone, Debug)]
#[command(name = "directory-bootstrap")]
#[command(about = DIRECTORY_ABOUT)]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct DirectoryCli {
    #[command(flatten)]
    pub output: OutputArgs,

    /// YAML file with machine configuration; command line options win
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Architecture (e.g. amd64)
    #[arg(long = "arch", value_name = "ARCH")]
    pub architecture: Option<String>,

    /// Hostname to set [default: machine]
    #[arg(long, value_name = "NAME")]
    pub hostname: Option<String>,

    /// File to copy nameserver entries from [default: /etc/resolv.conf]
    #[arg(long, value_name = "FILE")]
    pub resolv_conf: Option<PathBuf>,

    /// Specific machine identifier to apply, e.g. c1b9d5a2f16211cf9ece0020afc76f16
    #[arg(long, value_name = "ID")]
    pub machine_id: Option<MachineId>,

    #[command(subcommand)]
    pub distro: DistroCommand,
}

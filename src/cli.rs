use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use crate::privilege::PrivilegeMethod;

#[derive(Parser, Debug)]
#[command(
    name = env!("CARGO_PKG_NAME"),
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
    about = env!("CARGO_PKG_DESCRIPTION"),
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Install EndOS onto the disk named in the given config
    Install(InstallArgs),

    /// Validate the given YAML install config
    Validate(ValidateArgs),

    /// List disks available as installation targets
    Disks(ProbeArgs),

    /// List available timezones
    Timezones(ProbeArgs),

    /// Print the default package list
    Packages(PackagesArgs),

    /// Show boot mode and network reachability
    Probe(ProbeArgs),

    /// Generate shell completion scripts
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
pub struct InstallArgs {
    /// Path to the YAML file holding the install config
    #[arg(short, long, default_value = "install.yml")]
    pub file: Utf8PathBuf,

    /// Simulate every command instead of touching the system
    #[arg(long)]
    pub dry_run: bool,

    /// Where to mount the target system (default: /mnt, or a scratch path with --dry-run)
    #[arg(long)]
    pub mount_point: Option<Utf8PathBuf>,

    /// Write target configuration files through this privilege command
    #[arg(long, value_enum)]
    pub elevate: Option<PrivilegeMethod>,

    /// Set the log level
    #[arg(short, long, default_value = "info")]
    pub log_level: LogLevel,
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Path to the YAML file to validate
    #[arg(short, long, default_value = "install.yml")]
    pub file: Utf8PathBuf,

    /// Set the log level
    #[arg(short, long, default_value = "info")]
    pub log_level: LogLevel,
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// Report canned results instead of probing the system
    #[arg(long)]
    pub dry_run: bool,

    /// Set the log level
    #[arg(short, long, default_value = "warn")]
    pub log_level: LogLevel,
}

#[derive(Args, Debug)]
pub struct PackagesArgs {
    /// Package list file to read
    #[arg(long, default_value = crate::config::DEFAULT_PACKAGE_LIST)]
    pub list: Utf8PathBuf,

    /// Set the log level
    #[arg(short, long, default_value = "warn")]
    pub log_level: LogLevel,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Represents log levels for controlling the verbosity of logging output.
///
/// This enum maps directly to the log levels used by the `tracing` crate.
/// For example, specifying `--log-level warn` hides the per-command and
/// per-stage lines that are logged at info level.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl Commands {
    /// Log level requested by the subcommand, if it takes one.
    pub fn log_level(&self) -> Option<LogLevel> {
        match self {
            Commands::Install(opts) => Some(opts.log_level),
            Commands::Validate(opts) => Some(opts.log_level),
            Commands::Disks(opts) | Commands::Timezones(opts) | Commands::Probe(opts) => {
                Some(opts.log_level)
            }
            Commands::Packages(opts) => Some(opts.log_level),
            Commands::Completions(_) => None,
        }
    }
}

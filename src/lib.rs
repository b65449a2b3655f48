pub mod cli;
pub mod config;
pub mod disk;
pub mod error;
pub mod executor;
pub mod install;
pub mod network;
pub mod packages;
pub mod privilege;
pub mod timezones;

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use camino::Utf8Path;
use clap::CommandFactory;
use tracing::{info, warn};
use tracing_subscriber::{FmtSubscriber, filter::LevelFilter};

pub use error::InstallerError;

use crate::config::InstallerOptions;
use crate::executor::{CommandExecutor, RealCommandExecutor, SimulatedExecutor};
use crate::install::Installer;

pub fn init_logging(log_level: cli::LogLevel) -> Result<()> {
    let filter = match log_level {
        cli::LogLevel::Trace => LevelFilter::TRACE,
        cli::LogLevel::Debug => LevelFilter::DEBUG,
        cli::LogLevel::Info => LevelFilter::INFO,
        cli::LogLevel::Warn => LevelFilter::WARN,
        cli::LogLevel::Error => LevelFilter::ERROR,
    };

    tracing::subscriber::set_global_default(
        FmtSubscriber::builder()
            .with_max_level(filter)
            .with_writer(io::stderr)
            .finish(),
    )
    .context("failed to set global default tracing subscriber")
}

/// Chooses the executor once for the whole process.
pub fn select_executor(
    dry_run: bool,
    elevate: Option<privilege::PrivilegeMethod>,
) -> Arc<dyn CommandExecutor> {
    if dry_run {
        Arc::new(SimulatedExecutor::new())
    } else {
        Arc::new(RealCommandExecutor::new(elevate.unwrap_or_default()))
    }
}

/// Runs one installation and prints its progress to `out`.
///
/// Returns `Ok` once the run has finished, whether it succeeded or not;
/// the outcome is reported through the printed completion message.
pub fn run_install(
    opts: &cli::InstallArgs,
    executor: Arc<dyn CommandExecutor>,
    out: &mut dyn Write,
) -> Result<install::InstallOutcome> {
    let config = config::load_config(&opts.file)
        .with_context(|| format!("failed to load install config from {}", opts.file))?;
    config.validate().context("install config validation failed")?;

    if !executor.is_simulated() && !rustix::process::geteuid().is_root() {
        warn!("not running as root; partitioning and pacstrap will most likely fail");
    }

    let mount_point = match &opts.mount_point {
        Some(path) => path.clone(),
        None if opts.dry_run => config::SIMULATED_MOUNT_POINT.into(),
        None => config::DEFAULT_MOUNT_POINT.into(),
    };
    let options = InstallerOptions::default()
        .with_mount_point(mount_point)
        .with_elevated_writes(opts.elevate.is_some());

    let installer = Installer::new(executor, options);
    info!("target disk: {}", config.target_disk);

    let Some(handle) = installer.start(config) else {
        anyhow::bail!("an installation is already running");
    };

    let mut write_error = None;
    let outcome = handle.wait(|stage| {
        if write_error.is_none()
            && let Err(e) = writeln!(out, "[{:>3}%] {}", stage.percent, stage.message)
        {
            write_error = Some(e);
        }
    });
    if let Some(e) = write_error {
        warn!("failed to print progress: {}", e);
    }

    writeln!(out, "{}", outcome.message).context("failed to print completion message")?;
    Ok(outcome)
}

pub fn run_validate(opts: &cli::ValidateArgs) -> Result<()> {
    let config = config::load_config(&opts.file)
        .with_context(|| format!("failed to load install config from {}", opts.file))?;
    config.validate().context("install config validation failed")?;
    info!("validation successful:\n{:#?}", config);
    Ok(())
}

pub fn run_disks(opts: &cli::ProbeArgs, out: &mut dyn Write) -> Result<()> {
    let installer =
        Installer::new(select_executor(opts.dry_run, None), InstallerOptions::default());
    let disks = installer.scan_disks();
    if disks.is_empty() {
        writeln!(out, "no disks found")?;
    }
    for disk in disks {
        writeln!(
            out,
            "{}\t{}\t{}\t{}",
            disk.device,
            disk.size,
            disk.model,
            if disk.rotational { "HDD" } else { "SSD" }
        )?;
    }
    Ok(())
}

pub fn run_timezones(opts: &cli::ProbeArgs, out: &mut dyn Write) -> Result<()> {
    let zones: Vec<String> = if opts.dry_run {
        timezones::SIMULATED_TIMEZONES.iter().map(|z| z.to_string()).collect()
    } else {
        timezones::list_timezones(Utf8Path::new(timezones::ZONEINFO_DIR))
    };
    for zone in zones {
        writeln!(out, "{}", zone)?;
    }
    Ok(())
}

pub fn run_packages(opts: &cli::PackagesArgs, out: &mut dyn Write) -> Result<()> {
    let text = packages::default_package_text(&opts.list);
    writeln!(out, "{}", text.trim_end())?;
    Ok(())
}

pub fn run_probe(opts: &cli::ProbeArgs, out: &mut dyn Write) -> Result<()> {
    let installer =
        Installer::new(select_executor(opts.dry_run, None), InstallerOptions::default());
    writeln!(out, "boot mode: {}", installer.disk_manager().boot_mode())?;
    writeln!(out, "online: {}", if installer.is_online() { "yes" } else { "no" })?;
    Ok(())
}

pub fn run_completions(opts: &cli::CompletionsArgs, out: &mut dyn Write) {
    let mut cmd = cli::Cli::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(opts.shell, &mut cmd, name, out);
}

use std::io;
use std::process;

use anyhow::Result;
use clap::Parser;
use tracing::error;

use endos_installer::cli::{Cli, Commands};

fn main() -> Result<()> {
    let args = Cli::parse();

    if let Some(log_level) = args.command.log_level()
        && let Err(e) = endos_installer::init_logging(log_level)
    {
        eprintln!("{:#}", e);
        process::exit(1);
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();

    let result = match &args.command {
        Commands::Install(opts) => {
            let executor = endos_installer::select_executor(opts.dry_run, opts.elevate);
            endos_installer::run_install(opts, executor, &mut out).map(|outcome| {
                if !outcome.success {
                    error!("installation failed: {}", outcome.message);
                }
            })
        }
        Commands::Validate(opts) => endos_installer::run_validate(opts),
        Commands::Disks(opts) => endos_installer::run_disks(opts, &mut out),
        Commands::Timezones(opts) => endos_installer::run_timezones(opts, &mut out),
        Commands::Packages(opts) => endos_installer::run_packages(opts, &mut out),
        Commands::Probe(opts) => endos_installer::run_probe(opts, &mut out),
        Commands::Completions(opts) => {
            endos_installer::run_completions(opts, &mut out);
            Ok(())
        }
    };

    if let Err(e) = result {
        error!("{:#}", e);
        process::exit(1);
    }

    Ok(())
}

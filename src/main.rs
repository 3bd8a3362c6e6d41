use std::process::ExitCode;

use anyhow::{Context, Error};
use clap::Parser;
use log::{debug, error};

use diskctl::{cli::Cli, config::DiskctlConfig, ExitKind, DISKCTL_VERSION};
use diskutils::{dependencies::SystemExecutor, host::HostFacts};

fn setup_logging(args: &Cli) -> Result<(), Error> {
    env_logger::builder()
        .format_timestamp(None)
        .filter_level(args.verbosity)
        .try_init()
        .context("Logger already registered")
}

fn run_diskctl(args: &Cli) -> Result<ExitKind, Error> {
    debug!("diskctl version: {DISKCTL_VERSION}");

    let config =
        DiskctlConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    let executor = SystemExecutor;
    let host = config.apply(HostFacts::detect(&executor).context("Failed to inspect host")?);

    let outcome = diskctl::run(&args.command, &host, &executor)
        .with_context(|| format!("Failed to execute '{}' command", args.command))?;
    print!("{}", outcome.report);

    Ok(outcome.exit)
}

fn main() -> ExitCode {
    // Parse args
    let args = Cli::parse();

    if let Err(e) = setup_logging(&args) {
        eprintln!("Failed to initialize logging: {e:?}");
        return ExitCode::from(1);
    }

    match run_diskctl(&args) {
        Ok(ExitKind::Done) => ExitCode::SUCCESS,
        Ok(ExitKind::ToolFailed) => ExitCode::from(3),
        Err(e) => {
            error!("diskctl failed: {e:?}");
            ExitCode::from(2)
        }
    }
}

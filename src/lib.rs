use anyhow::{Context, Error};
use serde::Serialize;

use diskutils::{
    blkid::{self, BlkidFilter},
    blockdev::{self, TuneOption, TuneParameters},
    dependencies::{CommandResult, Executor},
    df::{self, DfArgs},
    filesystems,
    host::HostFacts,
    mkfs::{self, FormatOptions},
    resize2fs, wipefs,
};

pub mod cli;
pub mod config;

use cli::Commands;

pub const DISKCTL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// How a command finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    Done,
    /// A mutating tool ran but exited non-zero
    ToolFailed,
}

/// Rendered result of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub report: String,
    pub exit: ExitKind,
}

impl Outcome {
    fn done(value: &impl Serialize) -> Result<Self, Error> {
        Ok(Self {
            report: render(value)?,
            exit: ExitKind::Done,
        })
    }

    fn from_result(result: &CommandResult) -> Result<Self, Error> {
        Ok(Self {
            report: render(result)?,
            exit: if result.success() {
                ExitKind::Done
            } else {
                ExitKind::ToolFailed
            },
        })
    }
}

fn render(value: &impl Serialize) -> Result<String, Error> {
    serde_yaml::to_string(value).context("Failed to serialize result")
}

/// Executes `command` against the host described by `host`.
pub fn run(
    command: &Commands,
    host: &HostFacts,
    executor: &impl Executor,
) -> Result<Outcome, Error> {
    match command {
        Commands::Usage { path, flags } => {
            let args = df_args(path.as_deref(), flags)?;
            Outcome::done(&df::usage(host, executor, &args)?)
        }

        Commands::Inodeusage { path, flags } => {
            let args = df_args(path.as_deref(), flags)?;
            Outcome::done(&df::inodeusage(host, executor, &args)?)
        }

        Commands::Percent { mount } => {
            Outcome::done(&df::percent(host, executor, mount.as_deref())?)
        }

        Commands::Blkid { device, token } => {
            let filter = match (device, token) {
                (Some(device), _) => BlkidFilter::Device(device.clone()),
                (None, Some(token)) => BlkidFilter::Token(token.clone()),
                (None, None) => BlkidFilter::All,
            };
            Outcome::done(&blkid::blkid(executor, &filter)?)
        }

        Commands::Dump { device } => Outcome::done(&blockdev::dump(executor, device)?),

        Commands::Wipe { device } => Outcome::from_result(&wipefs::wipe(executor, device)?),

        Commands::Tune {
            device,
            read_ahead,
            filesystem_read_ahead,
            read_only,
            read_write,
        } => {
            let params: TuneParameters = [
                (TuneOption::ReadAhead, *read_ahead),
                (TuneOption::FilesystemReadAhead, *filesystem_read_ahead),
                (TuneOption::ReadOnly, read_only.then_some(1)),
                (TuneOption::ReadWrite, read_write.then_some(1)),
            ]
            .into_iter()
            .filter_map(|(option, value)| value.map(|value| (option, value)))
            .collect();

            let outcome = blockdev::tune(executor, device, &params)?;
            let exit = match &outcome.result {
                Some(result) if !result.success() => ExitKind::ToolFailed,
                _ => ExitKind::Done,
            };
            Ok(Outcome {
                report: render(&outcome)?,
                exit,
            })
        }

        Commands::Format {
            device,
            fs_type,
            inode_size,
            lazy_itable_init,
            fat,
            force,
        } => {
            let options = FormatOptions {
                fs_type: fs_type.clone(),
                inode_size: *inode_size,
                lazy_itable_init: *lazy_itable_init,
                fat: *fat,
                force: *force,
            };
            let success = mkfs::format(host, executor, device, &options)?;
            Ok(Outcome {
                report: render(&success)?,
                exit: if success {
                    ExitKind::Done
                } else {
                    ExitKind::ToolFailed
                },
            })
        }

        Commands::Fstype { device } => Outcome::done(
            &filesystems::fstype(host, executor, device)?.unwrap_or_default(),
        ),

        Commands::Resize2fs { device } => {
            Outcome::from_result(&resize2fs::run(executor, device)?)
        }
    }
}

fn df_args(path: Option<&std::path::Path>, flags: &str) -> Result<DfArgs, Error> {
    let args = DfArgs::new().with_flags(flags)?;
    Ok(match path {
        Some(path) => args.with_path(path),
        None => args,
    })
}

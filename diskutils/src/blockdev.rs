use std::{collections::BTreeMap, path::Path, str::FromStr};

use log::{debug, warn};
use serde::Serialize;
use strum_macros::EnumString;

use crate::{
    dependencies::{Command, CommandResult, Dependency, Executor},
    errors::DiskError,
};

/// Getter switches passed to `blockdev`, in the order their values are
/// printed.
pub const GEOMETRY_FLAGS: [&str; 12] = [
    "--getro",
    "--getsz",
    "--getss",
    "--getpbsz",
    "--getiomin",
    "--getioopt",
    "--getalignoff",
    "--getmaxsect",
    "--getsize",
    "--getsize64",
    "--getra",
    "--getfra",
];

/// Geometry and tuning of a block device as reported by `blockdev`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct BlockDeviceGeometry {
    pub read_only: bool,
    /// Size in 512-byte sectors
    pub size_in_sectors: u64,
    pub sector_size: u64,
    pub physical_block_size: u64,
    pub minimum_io_size: u64,
    pub optimal_io_size: u64,
    /// -1 when the device is misaligned
    pub alignment_offset: i64,
    pub max_sectors: u64,
    /// Size in 512-byte blocks, `--getsize`
    pub size_in_blocks: u64,
    pub size_in_bytes: u64,
    pub read_ahead: u64,
    pub filesystem_read_ahead: u64,
}

/// Block device settings that can be changed with [`tune`]. Declaration
/// order is the order switches appear on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum TuneOption {
    ReadAhead,
    FilesystemReadAhead,
    ReadOnly,
    ReadWrite,
}

impl TuneOption {
    fn switch(self) -> &'static str {
        match self {
            Self::ReadAhead => "--setra",
            Self::FilesystemReadAhead => "--setfra",
            Self::ReadOnly => "--setro",
            Self::ReadWrite => "--setrw",
        }
    }

    /// Read-only and read-write are plain switches, the others take a value.
    fn takes_value(self) -> bool {
        matches!(self, Self::ReadAhead | Self::FilesystemReadAhead)
    }
}

/// Settings to apply with [`tune`]. For the plain switches (read-only and
/// read-write) any non-zero value turns the switch on.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TuneParameters(BTreeMap<TuneOption, u64>);

impl TuneParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, option: TuneOption, value: u64) -> Self {
        self.0.insert(option, value);
        self
    }

    /// Builds parameters from option names such as "read-ahead".
    /// Unrecognized names are ignored.
    pub fn from_named<I, K>(options: I) -> Self
    where
        I: IntoIterator<Item = (K, u64)>,
        K: AsRef<str>,
    {
        let mut params = Self::new();
        for (name, value) in options {
            match TuneOption::from_str(name.as_ref()) {
                Ok(option) => {
                    params.0.insert(option, value);
                }
                Err(_) => warn!("Ignoring unrecognized tune option '{}'", name.as_ref()),
            }
        }
        params
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(TuneOption, u64)> for TuneParameters {
    fn from_iter<I: IntoIterator<Item = (TuneOption, u64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Outcome of [`tune`]: the settings read before tuning and the result of
/// the setter invocation, if one was needed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TuneOutcome {
    pub previous: Option<BlockDeviceGeometry>,
    pub result: Option<CommandResult>,
}

fn dump_command(device: &Path) -> Command {
    let mut cmd = Dependency::Blockdev.cmd();
    cmd.args(GEOMETRY_FLAGS).arg(device);
    cmd
}

fn tune_command(device: &Path, params: &TuneParameters) -> Option<Command> {
    let mut switches: Vec<String> = Vec::new();
    for (option, value) in &params.0 {
        if option.takes_value() {
            switches.push(option.switch().into());
            switches.push(value.to_string());
        } else if *value != 0 {
            switches.push(option.switch().into());
        }
    }

    if switches.is_empty() {
        return None;
    }

    let mut cmd = Dependency::Blockdev.cmd();
    cmd.args(switches).arg(device);
    Some(cmd)
}

/// Reads the geometry of `device`. Returns `None` when `blockdev` fails,
/// e.g. because the device does not exist.
pub fn dump(
    executor: &impl Executor,
    device: impl AsRef<Path>,
) -> Result<Option<BlockDeviceGeometry>, DiskError> {
    let result = executor.execute(&dump_command(device.as_ref()))?;
    if !result.success() {
        warn!(
            "blockdev on '{}' {}",
            device.as_ref().display(),
            result.explain_exit()
        );
        return Ok(None);
    }

    parse_geometry(&result.stdout).map(Some)
}

/// Applies `params` to `device` with a single `blockdev` invocation. The
/// current settings are read first and handed back with the raw result of
/// the setter; a failing setter is not turned into an error. Settings that
/// cannot be parsed are reported as `None` and do not block the setter.
pub fn tune(
    executor: &impl Executor,
    device: impl AsRef<Path>,
    params: &TuneParameters,
) -> Result<TuneOutcome, DiskError> {
    let device = device.as_ref();
    let previous = match dump(executor, device) {
        Ok(previous) => previous,
        Err(e @ DiskError::Unparseable { .. }) => {
            warn!("Could not read settings of '{}': {e}", device.display());
            None
        }
        Err(e) => return Err(e),
    };
    debug!("Settings of '{}' before tuning: {previous:?}", device.display());

    let result = match tune_command(device, params) {
        Some(cmd) => Some(executor.execute(&cmd)?),
        None => {
            debug!("Nothing to tune on '{}'", device.display());
            None
        }
    };

    Ok(TuneOutcome { previous, result })
}

fn parse_geometry(output: &str) -> Result<BlockDeviceGeometry, DiskError> {
    let values: Vec<&str> = output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    let values: [&str; 12] = values.try_into().map_err(|values: Vec<&str>| {
        DiskError::unparseable(
            Dependency::Blockdev,
            format!(
                "expected {} values, found {}",
                GEOMETRY_FLAGS.len(),
                values.len()
            ),
        )
    })?;

    Ok(BlockDeviceGeometry {
        read_only: value::<u8>(&values, 0)? != 0,
        size_in_sectors: value(&values, 1)?,
        sector_size: value(&values, 2)?,
        physical_block_size: value(&values, 3)?,
        minimum_io_size: value(&values, 4)?,
        optimal_io_size: value(&values, 5)?,
        alignment_offset: value(&values, 6)?,
        max_sectors: value(&values, 7)?,
        size_in_blocks: value(&values, 8)?,
        size_in_bytes: value(&values, 9)?,
        read_ahead: value(&values, 10)?,
        filesystem_read_ahead: value(&values, 11)?,
    })
}

fn value<T>(values: &[&str; 12], index: usize) -> Result<T, DiskError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    values[index].parse::<T>().map_err(|e| {
        DiskError::unparseable(
            Dependency::Blockdev,
            format!(
                "value '{}' for {} is invalid: {e}",
                values[index], GEOMETRY_FLAGS[index]
            ),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::testutils::MockExecutor;

    const DUMP: &str = "0\n712971264\n512\n4096\n4096\n0\n0\n2560\n712971264\n365041287168\n256\n256\n";

    #[test]
    fn test_dump() {
        let executor = MockExecutor::new().with_stdout(Dependency::Blockdev, DUMP);
        let geometry = dump(&executor, "/dev/sda").unwrap().unwrap();
        assert_eq!(
            executor.rendered_calls(),
            vec![
                "blockdev --getro --getsz --getss --getpbsz --getiomin \
                 --getioopt --getalignoff --getmaxsect --getsize \
                 --getsize64 --getra --getfra /dev/sda"
            ]
        );
        assert_eq!(
            geometry,
            BlockDeviceGeometry {
                read_only: false,
                size_in_sectors: 712971264,
                sector_size: 512,
                physical_block_size: 4096,
                minimum_io_size: 4096,
                optimal_io_size: 0,
                alignment_offset: 0,
                max_sectors: 2560,
                size_in_blocks: 712971264,
                size_in_bytes: 365041287168,
                read_ahead: 256,
                filesystem_read_ahead: 256,
            }
        );
    }

    #[test]
    fn test_dump_failure() {
        let executor = MockExecutor::new().with_response(
            Dependency::Blockdev,
            CommandResult::new(1, "", "blockdev: cannot open /dev/sdz: No such file or directory"),
        );
        assert_eq!(dump(&executor, "/dev/sdz").unwrap(), None);
    }

    #[test]
    fn test_parse_geometry() {
        // Eleven values are not enough
        assert_eq!(
            parse_geometry("712971264\n512\n512\n512\n0\n0\n88\n712971264\n365041287168\n512\n512")
                .unwrap_err()
                .to_string(),
            "Unparseable output from 'blockdev': expected 12 values, found 11"
        );

        // Misaligned devices report -1
        let geometry =
            parse_geometry("1\n8\n512\n512\n512\n0\n-1\n128\n8\n4096\n128\n128\n\n").unwrap();
        assert!(geometry.read_only);
        assert_eq!(geometry.alignment_offset, -1);

        assert!(parse_geometry("x\n8\n512\n512\n512\n0\n0\n128\n8\n4096\n128\n128\n")
            .unwrap_err()
            .to_string()
            .contains("for --getro is invalid"));
    }

    #[test]
    fn test_tune() {
        let executor = MockExecutor::new().with_stdout(Dependency::Blockdev, DUMP);
        let params = TuneParameters::from_named([("filesystem-read-ahead", 1024), ("read-ahead", 512)]);
        let outcome = tune(&executor, "/dev/sda", &params).unwrap();

        let calls = executor.rendered_calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].starts_with("blockdev --getro"));
        assert_eq!(calls[1], "blockdev --setra 512 --setfra 1024 /dev/sda");
        assert_eq!(outcome.previous.unwrap().read_ahead, 256);
        assert_eq!(outcome.result, Some(CommandResult::default()));
    }

    #[test]
    fn test_tune_switches() {
        let executor = MockExecutor::new().with_stdout(Dependency::Blockdev, DUMP);
        let params: TuneParameters = [
            (TuneOption::ReadWrite, 0),
            (TuneOption::ReadOnly, 1),
            (TuneOption::ReadAhead, 128),
        ]
        .into_iter()
        .collect();
        tune(&executor, "/dev/sdb", &params).unwrap();
        assert_eq!(
            executor.rendered_calls()[1],
            "blockdev --setra 128 --setro /dev/sdb"
        );
    }

    #[test]
    fn test_tune_ignores_unrecognized() {
        let params = TuneParameters::from_named([("read-ahead", 512), ("write-behind", 8)]);
        assert_eq!(params, TuneParameters::new().with(TuneOption::ReadAhead, 512));

        // Nothing recognized, only the dump is run
        let executor = MockExecutor::new().with_stdout(Dependency::Blockdev, DUMP);
        let outcome = tune(
            &executor,
            "/dev/sda",
            &TuneParameters::from_named([("bogus", 1)]),
        )
        .unwrap();
        assert_eq!(outcome.result, None);
        assert_eq!(executor.calls().len(), 1);
    }

    #[test]
    fn test_tune_unparseable_settings() {
        let executor = MockExecutor::new().with_stdout(Dependency::Blockdev, "0\n8\n");
        let outcome = tune(
            &executor,
            "/dev/sda",
            &TuneParameters::new().with(TuneOption::ReadAhead, 512),
        )
        .unwrap();
        assert_eq!(outcome.previous, None);
        assert_eq!(outcome.result, Some(CommandResult::default()));
        assert_eq!(executor.rendered_calls()[1], "blockdev --setra 512 /dev/sda");
    }

    #[test]
    fn test_tune_failure_is_returned() {
        let executor = MockExecutor::new()
            .with_stdout(Dependency::Blockdev, DUMP)
            .with_response(
                Dependency::Blockdev,
                CommandResult::new(1, "", "BLKRASET: Permission denied"),
            );
        let outcome = tune(
            &executor,
            "/dev/sda",
            &TuneParameters::new().with(TuneOption::ReadAhead, 512),
        )
        .unwrap();
        let result = outcome.result.unwrap();
        assert_eq!(result.retcode, 1);
        assert_eq!(result.stderr, "BLKRASET: Permission denied");
    }
}

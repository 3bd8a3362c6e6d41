use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::{
    dependencies::{Command, Dependency, Executor},
    errors::DiskError,
};

static ATTRIBUTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([A-Za-z0-9_]+)="((?:[^"\\]|\\.)*)""#).unwrap());

/// Which block devices `blkid` should report on.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub enum BlkidFilter {
    /// Every block device known to the system
    #[default]
    All,
    /// A single device
    Device(PathBuf),
    /// Devices matching a `KEY=VALUE` token, e.g. `TYPE=ext4`
    Token(String),
}

/// Attributes reported by `blkid` for one device.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BlkidEntry(BTreeMap<String, String>);

impl BlkidEntry {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Filesystem type, the `TYPE` attribute.
    pub fn fs_type(&self) -> Option<&str> {
        self.get("TYPE")
    }

    pub fn uuid(&self) -> Option<&str> {
        self.get("UUID")
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.0
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for BlkidEntry {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

fn blkid_command(filter: &BlkidFilter) -> Result<Command, DiskError> {
    let mut cmd = Dependency::Blkid.cmd();
    match filter {
        BlkidFilter::All => (),
        BlkidFilter::Device(device) => {
            cmd.arg(device);
        }
        BlkidFilter::Token(token) => {
            match token.split_once('=') {
                Some((key, _)) if !key.is_empty() => (),
                _ => return Err(DiskError::InvalidToken(token.clone())),
            }
            cmd.arg("-t").arg(token);
        }
    }
    Ok(cmd)
}

/// Block device attributes keyed by device path. A non-zero exit from
/// `blkid`, which is also how it reports "nothing matched", yields an empty
/// mapping.
pub fn blkid(
    executor: &impl Executor,
    filter: &BlkidFilter,
) -> Result<BTreeMap<String, BlkidEntry>, DiskError> {
    let result = executor.execute(&blkid_command(filter)?)?;
    if !result.success() {
        warn!("blkid {}, reporting no devices", result.explain_exit());
        return Ok(BTreeMap::new());
    }

    parse_blkid_output(&result.stdout)
}

/// Attributes of a single device, if `blkid` knows about it.
pub fn device(
    executor: &impl Executor,
    device: impl AsRef<Path>,
) -> Result<Option<BlkidEntry>, DiskError> {
    let mut devices = blkid(executor, &BlkidFilter::Device(device.as_ref().into()))?;
    Ok(devices.remove(&device.as_ref().to_string_lossy().into_owned()))
}

fn parse_blkid_output(output: &str) -> Result<BTreeMap<String, BlkidEntry>, DiskError> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let Some((device, attributes)) = line.split_once(':') else {
                return Err(DiskError::unparseable(
                    Dependency::Blkid,
                    format!("missing device in line '{line}'"),
                ));
            };

            let entry: BlkidEntry = ATTRIBUTE
                .captures_iter(attributes)
                .map(|captures| (captures[1].to_owned(), captures[2].to_owned()))
                .collect();

            Ok((device.trim().to_owned(), entry))
        })
        .collect()
}

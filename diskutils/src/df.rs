use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use log::{debug, warn};
use serde::{Serialize, Serializer};

use crate::{
    dependencies::{Command, Dependency, Executor},
    errors::DiskError,
    host::{HostFacts, KernelDialect},
};

/// Single letter flags that may be passed through to `df` without changing
/// the layout of its output.
const ALLOWED_FLAGS: &[char] = &['a', 'k', 'l', 'P'];

/// Extra arguments for the `df` based queries.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DfArgs {
    flags: String,
    path: Option<PathBuf>,
}

impl DfArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the query to the filesystem holding `path`.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Adds pass-through flags, e.g. "al". Rejects any letter outside the
    /// allowed set.
    pub fn with_flags(mut self, flags: &str) -> Result<Self, DiskError> {
        if let Some(flag) = flags.chars().find(|c| !ALLOWED_FLAGS.contains(c)) {
            return Err(DiskError::InvalidFlag(flag));
        }
        self.flags.push_str(flags);
        Ok(self)
    }

    fn apply(&self, cmd: &mut Command) {
        if !self.flags.is_empty() {
            cmd.arg(format!("-{}", self.flags));
        }
        if let Some(path) = &self.path {
            cmd.arg(path);
        }
    }
}

/// Usage of one mounted filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiskUsageEntry {
    pub filesystem: Option<String>,
    #[serde(rename = "1K-blocks")]
    pub total_1k_blocks: u64,
    pub used: u64,
    pub available: u64,
    pub capacity: u32,
}

/// Result of [`usage`].
///
/// `Empty` is returned when `df` printed nothing or failed, and serializes as
/// an empty string rather than an empty mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsageReport {
    Empty,
    Mounts(BTreeMap<String, DiskUsageEntry>),
}

impl UsageReport {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Mounts(mounts) => mounts.is_empty(),
        }
    }

    pub fn mounts(&self) -> Option<&BTreeMap<String, DiskUsageEntry>> {
        match self {
            Self::Empty => None,
            Self::Mounts(mounts) => Some(mounts),
        }
    }
}

impl Serialize for UsageReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Empty => serializer.serialize_str(""),
            Self::Mounts(mounts) => mounts.serialize(serializer),
        }
    }
}

/// Inode usage of one mounted filesystem. AIX does not report the inode
/// total or the free count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InodeUsageEntry {
    pub inodes: Option<u64>,
    pub used: u64,
    pub free: Option<u64>,
    #[serde(rename = "use")]
    pub use_percent: u32,
    pub filesystem: Option<String>,
}

/// Result of [`percent`]: a scalar when asked about one mount point, a
/// mapping of every mount point otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PercentReport {
    Single(u32),
    All(BTreeMap<String, u32>),
}

struct UsageColumns {
    blocks: usize,
    used: usize,
    available: usize,
    capacity: usize,
    mount: usize,
}

const POSIX_USAGE: UsageColumns = UsageColumns {
    blocks: 1,
    used: 2,
    available: 3,
    capacity: 4,
    mount: 5,
};

// Plain `df` on Darwin appends iused, ifree and %iused before the mount
// point. Those belong to `inodeusage` and are skipped here.
const DARWIN_USAGE: UsageColumns = UsageColumns {
    mount: 8,
    ..POSIX_USAGE
};

enum InodeTotal {
    Column(usize),
    UsedPlusFree,
    Unreported,
}

struct InodeColumns {
    total: InodeTotal,
    used: usize,
    free: Option<usize>,
    use_percent: usize,
    mount: usize,
}

const POSIX_INODES: InodeColumns = InodeColumns {
    total: InodeTotal::Column(1),
    used: 2,
    free: Some(3),
    use_percent: 4,
    mount: 5,
};

// Filesystem 512-blocks Used Avail Capacity iused ifree %iused Mounted on
const OPENBSD_INODES: InodeColumns = InodeColumns {
    total: InodeTotal::UsedPlusFree,
    used: 5,
    free: Some(6),
    use_percent: 7,
    mount: 8,
};

// Filesystem 512-blocks Used Available Capacity iused ifree %iused Mounted on
const DARWIN_INODES: InodeColumns = InodeColumns {
    total: InodeTotal::UsedPlusFree,
    used: 5,
    free: Some(6),
    use_percent: 7,
    mount: 8,
};

// Filesystem 512-blocks Free %Used Iused %Iused Mounted on
const AIX_INODES: InodeColumns = InodeColumns {
    total: InodeTotal::Unreported,
    used: 4,
    free: None,
    use_percent: 5,
    mount: 6,
};

fn usage_columns(kernel: KernelDialect) -> &'static UsageColumns {
    match kernel {
        KernelDialect::Darwin => &DARWIN_USAGE,
        _ => &POSIX_USAGE,
    }
}

fn inode_columns(kernel: KernelDialect) -> &'static InodeColumns {
    match kernel {
        KernelDialect::OpenBsd => &OPENBSD_INODES,
        KernelDialect::Darwin => &DARWIN_INODES,
        KernelDialect::Aix => &AIX_INODES,
        _ => &POSIX_INODES,
    }
}

fn usage_command(kernel: KernelDialect, args: &DfArgs) -> Command {
    let mut cmd = Dependency::Df.cmd();
    match kernel {
        KernelDialect::Linux => {
            cmd.arg("-P");
        }
        KernelDialect::OpenBsd | KernelDialect::Aix => {
            cmd.arg("-kP");
        }
        _ => (),
    }
    args.apply(&mut cmd);
    cmd
}

fn inode_command(kernel: KernelDialect, args: &DfArgs) -> Command {
    let mut cmd = Dependency::Df.cmd();
    cmd.arg(match kernel {
        KernelDialect::Aix => "-i",
        _ => "-iP",
    });
    args.apply(&mut cmd);
    cmd
}

/// Disk usage of every mounted filesystem, keyed by mount point.
pub fn usage(
    host: &HostFacts,
    executor: &impl Executor,
    args: &DfArgs,
) -> Result<UsageReport, DiskError> {
    let result = executor.execute(&usage_command(host.kernel(), args))?;
    if !result.success() {
        warn!("df {}, reporting no usage data", result.explain_exit());
        return Ok(UsageReport::Empty);
    }

    parse_usage(host.kernel(), &result.stdout)
}

/// Inode usage of every mounted filesystem, keyed by mount point.
pub fn inodeusage(
    host: &HostFacts,
    executor: &impl Executor,
    args: &DfArgs,
) -> Result<BTreeMap<String, InodeUsageEntry>, DiskError> {
    let result = executor.execute(&inode_command(host.kernel(), args))?;
    if !result.success() {
        warn!("df {}, reporting no inode data", result.explain_exit());
        return Ok(BTreeMap::new());
    }

    parse_inodeusage(host.kernel(), &result.stdout)
}

/// Percentage of space used, either for the single mount point `mount` or
/// for every mounted filesystem.
///
/// A failing `df` yields an empty mapping even when `mount` is given;
/// [`DiskError::MountNotFound`] is only returned when `df` succeeded without
/// reporting `mount`.
pub fn percent(
    host: &HostFacts,
    executor: &impl Executor,
    mount: Option<&str>,
) -> Result<PercentReport, DiskError> {
    let result = executor.execute(&usage_command(host.kernel(), &DfArgs::default()))?;
    if !result.success() {
        warn!("df {}, reporting no usage data", result.explain_exit());
        return Ok(PercentReport::All(BTreeMap::new()));
    }

    let all = parse_percent(host.kernel(), &result.stdout)?;

    match mount {
        Some(mount) => all
            .get(mount)
            .map(|percent| PercentReport::Single(*percent))
            .ok_or_else(|| DiskError::MountNotFound(mount.into())),
        None => Ok(PercentReport::All(all)),
    }
}

/// Filesystem type of `device` according to `df -T`, if it reports one.
pub fn filesystem_type(
    executor: &impl Executor,
    device: impl AsRef<Path>,
) -> Result<Option<String>, DiskError> {
    let result = executor.execute(
        &Dependency::Df
            .cmd()
            .with_arg("-T")
            .with_arg(device.as_ref()),
    )?;
    if !result.success() {
        debug!(
            "df -T {} {}",
            device.as_ref().display(),
            result.explain_exit()
        );
        return Ok(None);
    }

    Ok(result
        .stdout
        .lines()
        .nth(1)
        .and_then(|line| line.split_whitespace().nth(1))
        .map(str::to_owned))
}

fn parse_usage(kernel: KernelDialect, output: &str) -> Result<UsageReport, DiskError> {
    if output.trim().is_empty() {
        return Ok(UsageReport::Empty);
    }

    let columns = usage_columns(kernel);
    let mut mounts = BTreeMap::new();
    for row in rows(output)? {
        let mount = mount_point(&row, columns.mount)?;
        let entry = DiskUsageEntry {
            filesystem: Some(row[0].clone()),
            total_1k_blocks: number(&row, columns.blocks)?,
            used: number(&row, columns.used)?,
            available: number(&row, columns.available)?,
            capacity: percentage(&row, columns.capacity)?,
        };
        mounts.insert(mount, entry);
    }

    Ok(UsageReport::Mounts(mounts))
}

fn parse_inodeusage(
    kernel: KernelDialect,
    output: &str,
) -> Result<BTreeMap<String, InodeUsageEntry>, DiskError> {
    let columns = inode_columns(kernel);
    let mut mounts = BTreeMap::new();
    for row in rows(output)? {
        let mount = mount_point(&row, columns.mount)?;
        let used = number(&row, columns.used)?;
        let free = columns
            .free
            .map(|index| number(&row, index))
            .transpose()?;
        let inodes = match columns.total {
            InodeTotal::Column(index) => Some(number(&row, index)?),
            InodeTotal::UsedPlusFree => free.map(|free| used + free),
            InodeTotal::Unreported => None,
        };
        let entry = InodeUsageEntry {
            inodes,
            used,
            free,
            use_percent: percentage(&row, columns.use_percent)?,
            filesystem: Some(row[0].clone()),
        };
        mounts.insert(mount, entry);
    }

    Ok(mounts)
}

fn parse_percent(kernel: KernelDialect, output: &str) -> Result<BTreeMap<String, u32>, DiskError> {
    let columns = usage_columns(kernel);
    rows(output)?
        .iter()
        .map(|row| -> Result<(String, u32), DiskError> {
            Ok((
                mount_point(row, columns.mount)?,
                percentage(row, columns.capacity)?,
            ))
        })
        .collect()
}

/// Splits `df` output into rows of columns.
///
/// Header and blank lines are skipped. A filesystem name printed on a line
/// of its own is joined with the following line, and a filesystem name
/// containing spaces is merged back into the first column.
fn rows(output: &str) -> Result<Vec<Vec<String>>, DiskError> {
    let mut rows = Vec::new();
    let mut wrapped: Option<String> = None;

    for line in output.lines() {
        if line.trim().is_empty() || line.starts_with("Filesystem") {
            continue;
        }

        let line = match wrapped.take() {
            Some(previous) => format!("{previous} {line}"),
            None => line.to_owned(),
        };

        let mut columns: Vec<String> = line.split_whitespace().map(str::to_owned).collect();
        if columns.len() == 1 {
            wrapped = Some(line);
            continue;
        }

        while columns.len() >= 2 && !is_number(&columns[1]) {
            let next = columns.remove(1);
            columns[0] = format!("{} {next}", columns[0]);
        }

        if columns.len() < 2 {
            return Err(DiskError::unparseable(
                Dependency::Df,
                format!("no numeric columns in line '{line}'"),
            ));
        }

        rows.push(columns);
    }

    if let Some(line) = wrapped {
        return Err(DiskError::unparseable(
            Dependency::Df,
            format!("dangling line '{line}'"),
        ));
    }

    Ok(rows)
}

// "-" stands in for a value the filesystem does not report
fn is_number(column: &str) -> bool {
    column == "-" || (!column.is_empty() && column.chars().all(|c| c.is_ascii_digit()))
}

fn mount_point(row: &[String], index: usize) -> Result<String, DiskError> {
    if row.len() <= index {
        return Err(DiskError::unparseable(
            Dependency::Df,
            format!(
                "expected at least {} columns, found {} in '{}'",
                index + 1,
                row.len(),
                row.join(" ")
            ),
        ));
    }

    // Mount points may contain spaces
    Ok(row[index..].join(" "))
}

fn number(row: &[String], index: usize) -> Result<u64, DiskError> {
    let column = column(row, index)?;
    if column == "-" {
        return Ok(0);
    }

    column.parse().map_err(|e| {
        DiskError::unparseable(
            Dependency::Df,
            format!("column {index} '{column}' is not a number: {e}"),
        )
    })
}

/// Parses a percentage column such as "42%". `df` prints "-" when the
/// percentage is undefined, which is read as zero.
fn percentage(row: &[String], index: usize) -> Result<u32, DiskError> {
    let column = column(row, index)?;
    if column == "-" {
        return Ok(0);
    }

    column.trim_end_matches('%').parse().map_err(|e| {
        DiskError::unparseable(
            Dependency::Df,
            format!("column {index} '{column}' is not a percentage: {e}"),
        )
    })
}

fn column(row: &[String], index: usize) -> Result<&str, DiskError> {
    row.get(index).map(String::as_str).ok_or_else(|| {
        DiskError::unparseable(
            Dependency::Df,
            format!("missing column {index} in '{}'", row.join(" ")),
        )
    })
}

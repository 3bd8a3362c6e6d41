use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::PathBuf,
};

use clap::{Parser, Subcommand};
use log::LevelFilter;

#[derive(Parser, Debug)]
#[clap(version)]
pub struct Cli {
    /// Logging verbosity [OFF, ERROR, WARN, INFO, DEBUG, TRACE]
    #[arg(global = true, short, long, default_value_t = LevelFilter::Warn)]
    pub verbosity: LevelFilter,

    /// Path to the configuration file
    #[arg(global = true, short, long)]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Report disk usage of every mounted filesystem
    Usage {
        /// Only report the filesystem holding this path
        path: Option<PathBuf>,

        /// Extra single letter df flags, any of "aklP"
        #[clap(long, default_value = "")]
        flags: String,
    },

    /// Report inode usage of every mounted filesystem
    Inodeusage {
        /// Only report the filesystem holding this path
        path: Option<PathBuf>,

        /// Extra single letter df flags, any of "aklP"
        #[clap(long, default_value = "")]
        flags: String,
    },

    /// Report the percentage of space used, for one mount point or all of them
    Percent {
        /// Mount point to report on
        mount: Option<String>,
    },

    /// Report block device attributes
    Blkid {
        /// Only report this device
        #[clap(short, long, conflicts_with = "token")]
        device: Option<PathBuf>,

        /// Only report devices matching KEY=VALUE, e.g. TYPE=ext4
        #[clap(short, long)]
        token: Option<String>,
    },

    /// Report the geometry of a block device
    Dump { device: PathBuf },

    /// Erase all signatures from a device
    Wipe { device: PathBuf },

    /// Change read-ahead and read-only settings of a block device
    Tune {
        device: PathBuf,

        /// Read-ahead in 512-byte sectors
        #[clap(long)]
        read_ahead: Option<u64>,

        /// Filesystem read-ahead in 512-byte sectors
        #[clap(long)]
        filesystem_read_ahead: Option<u64>,

        /// Set the device read-only
        #[clap(long, conflicts_with = "read_write")]
        read_only: bool,

        /// Set the device read-write
        #[clap(long)]
        read_write: bool,
    },

    /// Create a filesystem on a device
    Format {
        device: PathBuf,

        /// Filesystem type
        #[clap(short = 't', long, default_value = "ext4")]
        fs_type: String,

        /// Bytes-per-inode for ext*, inode size for xfs
        #[clap(long)]
        inode_size: Option<u64>,

        /// Lazily initialize the inode tables (ext* only)
        #[clap(long)]
        lazy_itable_init: Option<bool>,

        /// FAT size, one of 12, 16 or 32
        #[clap(long)]
        fat: Option<u8>,

        /// Force creation even if the device looks in use
        #[clap(short, long)]
        force: bool,
    },

    /// Report the filesystem type of a device
    Fstype { device: PathBuf },

    /// Grow an ext* filesystem to fill its device
    #[clap(name = "resize2fs")]
    Resize2fs { device: PathBuf },
}

impl Display for Commands {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            Commands::Usage { .. } => "usage",
            Commands::Inodeusage { .. } => "inodeusage",
            Commands::Percent { .. } => "percent",
            Commands::Blkid { .. } => "blkid",
            Commands::Dump { .. } => "dump",
            Commands::Wipe { .. } => "wipe",
            Commands::Tune { .. } => "tune",
            Commands::Format { .. } => "format",
            Commands::Fstype { .. } => "fstype",
            Commands::Resize2fs { .. } => "resize2fs",
        };
        write!(f, "{name}")
    }
}

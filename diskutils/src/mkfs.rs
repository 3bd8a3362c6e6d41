use std::path::Path;

use log::{info, warn};

use crate::{
    dependencies::{Command, Dependency, Executor},
    errors::DiskError,
    host::HostFacts,
};

/// Options for [`format`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatOptions {
    pub fs_type: String,
    /// Bytes-per-inode ratio for ext*, inode size for xfs
    pub inode_size: Option<u64>,
    /// ext* only
    pub lazy_itable_init: Option<bool>,
    /// FAT size (12, 16 or 32) for fat and vfat
    pub fat: Option<u8>,
    pub force: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            fs_type: "ext4".into(),
            inode_size: None,
            lazy_itable_init: None,
            fat: None,
            force: false,
        }
    }
}

impl FormatOptions {
    pub fn new(fs_type: impl Into<String>) -> Self {
        Self {
            fs_type: fs_type.into(),
            ..Default::default()
        }
    }

    fn is_ext(&self) -> bool {
        self.fs_type.starts_with("ext")
    }

    fn is_xfs(&self) -> bool {
        self.fs_type == "xfs"
    }

    fn is_fat(&self) -> bool {
        self.fs_type.ends_with("fat")
    }
}

fn format_command(device: &Path, options: &FormatOptions) -> Result<Command, DiskError> {
    let mut cmd = Dependency::Mkfs.cmd();
    cmd.arg("-t").arg(&options.fs_type);

    if let Some(inode_size) = options.inode_size {
        if options.is_ext() {
            cmd.arg("-i").arg(inode_size.to_string());
        } else if options.is_xfs() {
            cmd.arg("-i").arg(format!("size={inode_size}"));
        }
    }

    if let Some(lazy_itable_init) = options.lazy_itable_init {
        if options.is_ext() {
            cmd.arg("-E")
                .arg(format!("lazy_itable_init={}", u8::from(lazy_itable_init)));
        }
    }

    if let Some(fat) = options.fat {
        if !matches!(fat, 12 | 16 | 32) {
            return Err(DiskError::InvalidFatSize(fat));
        }
        if options.is_fat() {
            cmd.arg("-F").arg(fat.to_string());
        }
    }

    if options.force {
        if options.is_ext() {
            cmd.arg("-F");
        } else if options.is_xfs() {
            cmd.arg("-f");
        }
    }

    cmd.arg(device);
    Ok(cmd)
}

/// Creates a filesystem on `device` and flushes it to disk with `sync`.
///
/// `mkfs` must be available on the host, otherwise this fails with
/// [`DiskError::MissingTool`]. Returns whether both `mkfs` and `sync`
/// succeeded; a `sync` that cannot be run counts as a failure.
pub fn format(
    host: &HostFacts,
    executor: &impl Executor,
    device: impl AsRef<Path>,
    options: &FormatOptions,
) -> Result<bool, DiskError> {
    host.require(Dependency::Mkfs)?;

    let device = device.as_ref();
    let mkfs = executor.execute(&format_command(device, options)?)?;
    if mkfs.success() {
        info!("Created {} filesystem on '{}'", options.fs_type, device.display());
    } else {
        warn!(
            "Failed to create {} filesystem on '{}', mkfs {}:\n{}",
            options.fs_type,
            device.display(),
            mkfs.explain_exit(),
            mkfs.output_report()
        );
    }

    let synced = match executor.execute(&Dependency::Sync.cmd()) {
        Ok(sync) if sync.success() => true,
        Ok(sync) => {
            warn!("sync {}", sync.explain_exit());
            false
        }
        Err(e) => {
            warn!("Failed to flush '{}': {e}", device.display());
            false
        }
    };

    Ok(mkfs.success() && synced)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{
        dependencies::CommandResult,
        host::KernelDialect,
        testutils::MockExecutor,
    };

    fn host() -> HostFacts {
        HostFacts::new(KernelDialect::Linux).with_tools([Dependency::Mkfs, Dependency::Sync])
    }

    fn argv(options: &FormatOptions) -> Vec<String> {
        format_command(Path::new("/dev/sdX1"), options).unwrap().argv()
    }

    #[test]
    fn test_format() {
        let executor = MockExecutor::new();
        assert!(format(&host(), &executor, "/dev/sdX1", &FormatOptions::default()).unwrap());

        let calls = executor.calls();
        assert_eq!(calls[0].argv(), vec!["mkfs", "-t", "ext4", "/dev/sdX1"]);
        assert_eq!(calls[1].render_command(), "sync");
    }

    #[test]
    fn test_format_fat() {
        let executor = MockExecutor::new();
        let options = FormatOptions {
            fat: Some(12),
            ..FormatOptions::new("fat")
        };
        assert!(format(&host(), &executor, "/dev/sdX1", &options).unwrap());
        assert_eq!(
            executor.calls()[0].argv(),
            vec!["mkfs", "-t", "fat", "-F", "12", "/dev/sdX1"]
        );
    }

    #[test]
    fn test_format_missing_mkfs() {
        let executor = MockExecutor::new();
        let host = host().without_tools([Dependency::Mkfs]);
        assert!(matches!(
            format(&host, &executor, "/dev/sdX1", &FormatOptions::default()),
            Err(DiskError::MissingTool(Dependency::Mkfs))
        ));
        assert!(executor.calls().is_empty());
    }

    #[test]
    fn test_format_failure() {
        let executor = MockExecutor::new().with_response(
            Dependency::Mkfs,
            CommandResult::new(1, "", "mkfs.ext4: Device size reported to be zero."),
        );
        assert!(!format(&host(), &executor, "/dev/sdX1", &FormatOptions::default()).unwrap());

        let executor =
            MockExecutor::new().with_response(Dependency::Sync, CommandResult::new(1, "", ""));
        assert!(!format(&host(), &executor, "/dev/sdX1", &FormatOptions::default()).unwrap());
    }

    #[test]
    fn test_format_sync_missing() {
        let executor = MockExecutor::new().with_missing(Dependency::Sync);
        assert!(!format(&host(), &executor, "/dev/sdX1", &FormatOptions::default()).unwrap());
        assert_eq!(
            executor.rendered_calls(),
            vec!["mkfs -t ext4 /dev/sdX1", "sync"]
        );
    }

    #[test]
    fn test_format_command_options() {
        assert_eq!(
            argv(&FormatOptions {
                inode_size: Some(4096),
                lazy_itable_init: Some(false),
                force: true,
                ..FormatOptions::new("ext3")
            }),
            vec![
                "mkfs",
                "-t",
                "ext3",
                "-i",
                "4096",
                "-E",
                "lazy_itable_init=0",
                "-F",
                "/dev/sdX1"
            ]
        );

        assert_eq!(
            argv(&FormatOptions {
                inode_size: Some(512),
                lazy_itable_init: Some(true),
                force: true,
                ..FormatOptions::new("xfs")
            }),
            vec!["mkfs", "-t", "xfs", "-i", "size=512", "-f", "/dev/sdX1"]
        );

        // FAT size only applies to fat filesystems, force does not apply at all
        assert_eq!(
            argv(&FormatOptions {
                fat: Some(32),
                force: true,
                ..FormatOptions::new("vfat")
            }),
            vec!["mkfs", "-t", "vfat", "-F", "32", "/dev/sdX1"]
        );
        assert_eq!(
            argv(&FormatOptions {
                fat: Some(16),
                ..FormatOptions::default()
            }),
            vec!["mkfs", "-t", "ext4", "/dev/sdX1"]
        );

        assert!(matches!(
            format_command(
                Path::new("/dev/sdX1"),
                &FormatOptions {
                    fat: Some(8),
                    ..FormatOptions::new("fat")
                }
            ),
            Err(DiskError::InvalidFatSize(8))
        ));
    }
}

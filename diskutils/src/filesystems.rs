use std::path::Path;

use log::debug;

use crate::{
    df,
    dependencies::{Dependency, Executor},
    errors::DiskError,
    host::HostFacts,
    lsblk,
};

/// Filesystem type of `device`.
///
/// Asks `lsblk` first and falls back to `df -T` when `lsblk` is missing or
/// reports nothing. Returns `None` when neither can tell.
pub fn fstype(
    host: &HostFacts,
    executor: &impl Executor,
    device: impl AsRef<Path>,
) -> Result<Option<String>, DiskError> {
    let device = device.as_ref();

    if host.has(Dependency::Lsblk) {
        if let Some(fs_type) = lsblk::filesystem_type(executor, device)? {
            return Ok(Some(fs_type));
        }
        debug!("lsblk reported no filesystem on '{}'", device.display());
    }

    if host.has(Dependency::Df) {
        return df::filesystem_type(executor, device);
    }

    Ok(None)
}

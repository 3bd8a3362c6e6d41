use std::path::Path;

use log::debug;

use crate::{
    dependencies::{Dependency, Executor},
    errors::DiskError,
};

/// Filesystem type recorded for `device`, if `lsblk` reports one.
pub fn filesystem_type(
    executor: &impl Executor,
    device: impl AsRef<Path>,
) -> Result<Option<String>, DiskError> {
    let result = executor.execute(
        &Dependency::Lsblk
            .cmd()
            .with_arg("-o")
            .with_arg("fstype")
            .with_arg(device.as_ref()),
    )?;
    if !result.success() {
        debug!(
            "lsblk on '{}' {}",
            device.as_ref().display(),
            result.explain_exit()
        );
        return Ok(None);
    }

    Ok(parse_fstype_output(&result.stdout))
}

/// The first line is the FSTYPE header; an empty second line means the
/// device carries no filesystem signature.
fn parse_fstype_output(output: &str) -> Option<String> {
    output
        .lines()
        .nth(1)
        .map(str::trim)
        .filter(|fs_type| !fs_type.is_empty())
        .map(str::to_owned)
}

use std::path::Path;

use log::warn;

use crate::{
    dependencies::{CommandResult, Dependency, Executor},
    errors::DiskError,
};

/// Erases every filesystem, raid and partition-table signature on `device`.
/// The result is handed back untouched; a non-zero exit is not an error here.
pub fn wipe(
    executor: &impl Executor,
    device: impl AsRef<Path>,
) -> Result<CommandResult, DiskError> {
    let result = executor.execute(
        &Dependency::Wipefs
            .cmd()
            .with_arg("-a")
            .with_arg(device.as_ref()),
    )?;
    if !result.success() {
        warn!(
            "Failed to wipe device '{}': {}",
            device.as_ref().display(),
            result.stderr.trim()
        );
    }

    Ok(result)
}

use std::path::Path;

use crate::{
    dependencies::{CommandResult, Dependency, Executor},
    errors::DiskError,
};

/// Resize the ext* filesystem on `block_device_path` to fill the entire
/// device. The result is returned for the caller to interpret.
pub fn run(
    executor: &impl Executor,
    block_device_path: impl AsRef<Path>,
) -> Result<CommandResult, DiskError> {
    Ok(executor.execute(
        &Dependency::Resize2fs
            .cmd()
            .with_arg(block_device_path.as_ref()),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::testutils::MockExecutor;

    #[test]
    fn test_run() {
        let executor = MockExecutor::new();
        run(&executor, "/dev/sdX1").unwrap();
        assert_eq!(executor.rendered_calls(), vec!["resize2fs /dev/sdX1"]);
    }

    #[test]
    fn test_run_failure_is_returned() {
        let stdout = "Couldn't find valid filesystem superblock.\n";
        let stderr = "resize2fs 1.46.5 (30-Dec-2021)\n\
                      resize2fs: Bad magic number in super-block while trying to open /dev/loop0\n";
        let executor = MockExecutor::new()
            .with_response(Dependency::Resize2fs, CommandResult::new(1, stdout, stderr));
        assert_eq!(
            run(&executor, "/dev/loop0").unwrap(),
            CommandResult::new(1, stdout, stderr)
        );
    }
}

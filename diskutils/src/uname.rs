use anyhow::{bail, Context, Error};

use crate::dependencies::{Dependency, Executor};

/// Grab the kernel name (e.g. "Linux") using the `uname` command.
pub fn kernel_name(executor: &impl Executor) -> Result<String, Error> {
    let result = executor
        .execute(&Dependency::Uname.cmd().with_arg("-s"))
        .context("Failed to run uname -s")?;
    if !result.success() {
        bail!("uname -s {}:\n{}", result.explain_exit(), result.output_report());
    }

    Ok(result.stdout.trim().to_owned())
}

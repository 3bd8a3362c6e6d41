use std::{
    ffi::{OsStr, OsString},
    io,
    os::unix::process::ExitStatusExt,
    path::PathBuf,
    process::{Command as StdCommand, Output},
};

use log::trace;
use serde::{Deserialize, Serialize};
use strum_macros::{EnumIter, EnumString, IntoStaticStr};

#[derive(Debug, thiserror::Error)]
pub enum DependencyError {
    #[error("Failed to find dependency '{dependency}': {source}")]
    NotFound {
        dependency: Dependency,
        #[source]
        source: which::Error,
    },

    #[error("Failed to execute dependency '{dependency}': {inner}")]
    CouldNotExecute {
        dependency: Dependency,
        #[source]
        inner: io::Error,
    },
}

/// Enum of the external tools driven by this crate.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    IntoStaticStr,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Dependency {
    Blkid,
    Blockdev,
    Df,
    Lsblk,
    Mkfs,
    Resize2fs,
    Sync,
    Uname,
    Wipefs,
    // Test dependencies
    #[cfg(test)]
    DoesNotExist,
    #[cfg(test)]
    Echo,
    #[cfg(test)]
    False,
}

impl std::fmt::Display for Dependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.into())
    }
}

impl Dependency {
    /// Gets the name of the dependency
    ///
    /// For example, Dependency::Blockdev => "blockdev"
    pub fn name(&self) -> &'static str {
        self.into()
    }

    /// Checks if the dependency is present in the system
    pub fn exists(&self) -> bool {
        self.path().is_ok()
    }

    /// Gets the path of the dependency
    pub fn path(&self) -> Result<PathBuf, Box<DependencyError>> {
        which::which(self.name()).map_err(|source| {
            Box::new(DependencyError::NotFound {
                dependency: *self,
                source,
            })
        })
    }

    /// Starts a new Command for this dependency
    /// (Note this does not create a std::process::Command instance)
    pub fn cmd(&self) -> Command {
        Command {
            dependency: *self,
            args: vec![],
        }
    }
}

/// A fully assembled invocation of a dependency. Arguments are handed to the
/// process as-is, no shell is involved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    dependency: Dependency,
    args: Vec<OsString>,
}

impl Command {
    pub fn arg<S: AsRef<OsStr>>(&mut self, arg: S) -> &mut Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn with_arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        self.arg(arg);
        self
    }

    pub fn args<I, S>(&mut self, args: I) -> &mut Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self.arg(arg.as_ref());
        }
        self
    }

    pub fn dependency(&self) -> Dependency {
        self.dependency
    }

    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    /// Program name followed by every argument, lossily converted to UTF-8.
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.dependency.name().to_string())
            .chain(self.args.iter().map(|arg| arg.to_string_lossy().into()))
            .collect()
    }

    pub fn render_command(&self) -> String {
        if self.args.is_empty() {
            self.dependency.to_string()
        } else {
            format!(
                "{} {}",
                self.dependency,
                self.args
                    .iter()
                    .map(|arg| arg.to_string_lossy())
                    .map(|arg| if arg.contains(' ') {
                        format!("'{arg}'")
                    } else {
                        arg.into()
                    })
                    .collect::<Vec<_>>()
                    .join(" "),
            )
        }
    }
}

/// Runs commands on behalf of the disk operations.
pub trait Executor {
    fn execute(&self, command: &Command) -> Result<CommandResult, Box<DependencyError>>;
}

/// Executor that spawns the real binaries found in $PATH.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemExecutor;

impl Executor for SystemExecutor {
    fn execute(&self, command: &Command) -> Result<CommandResult, Box<DependencyError>> {
        let mut cmd = StdCommand::new(command.dependency.path()?);
        cmd.args(&command.args);
        let rendered_command = command.render_command();
        trace!("Executing '{rendered_command}'");
        let output = cmd.output().map_err(|inner| DependencyError::CouldNotExecute {
            dependency: command.dependency,
            inner,
        })?;
        let result = CommandResult::from(output);
        trace!(
            "Executed '{rendered_command}': {}. Report:\n{}",
            result.explain_exit(),
            result.output_report(),
        );
        Ok(result)
    }
}

/// Exit code, stdout and stderr of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandResult {
    pub retcode: i32,
    pub stdout: String,
    pub stderr: String,
}

impl From<Output> for CommandResult {
    fn from(output: Output) -> Self {
        // Follow the shell convention for processes killed by a signal
        let retcode = output
            .status
            .code()
            .or_else(|| output.status.signal().map(|signal| 128 + signal))
            .unwrap_or(-1);

        Self {
            retcode,
            stdout: String::from_utf8_lossy(&output.stdout).into(),
            stderr: String::from_utf8_lossy(&output.stderr).into(),
        }
    }
}

impl CommandResult {
    pub fn new(retcode: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            retcode,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Checks if the process exited successfully
    pub fn success(&self) -> bool {
        self.retcode == 0
    }

    /// Gets all available output, useful for reporting or debugging
    pub fn output_report(&self) -> String {
        let mut res = String::with_capacity(self.stdout.len() + self.stderr.len() + 20);

        if !self.stdout.is_empty() {
            res += &format!("stdout:\n{}\n", self.stdout);
        }

        if !self.stderr.is_empty() {
            if !res.is_empty() {
                res += "\n";
            }
            res += &format!("stderr:\n{}\n", self.stderr);
        }

        res
    }

    /// Produces a string explaining the exit status of the process
    pub fn explain_exit(&self) -> String {
        match self.retcode {
            code if code > 128 => format!("terminated by signal: {}", code - 128),
            code if code < 0 => "exited with unknown status".into(),
            code => format!("exited with status: {code}"),
        }
    }
}

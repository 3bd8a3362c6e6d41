use std::collections::BTreeSet;

use anyhow::{Context, Error};
use log::debug;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::{
    dependencies::{Dependency, Executor},
    errors::DiskError,
    uname,
};

/// Kernel family of the host. Selects how `df` is invoked and which column
/// layout its output follows.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KernelDialect {
    #[default]
    Linux,
    Darwin,
    FreeBsd,
    OpenBsd,
    Aix,
    Other,
}

impl KernelDialect {
    /// Maps the output of `uname -s` to a dialect.
    pub fn from_kernel_name(name: &str) -> Self {
        match name.trim() {
            "Linux" => Self::Linux,
            "Darwin" => Self::Darwin,
            "FreeBSD" => Self::FreeBsd,
            "OpenBSD" => Self::OpenBsd,
            "AIX" => Self::Aix,
            other => {
                debug!("Unknown kernel '{other}', using generic dialect");
                Self::Other
            }
        }
    }
}

/// Facts about the host the disk operations run against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostFacts {
    kernel: KernelDialect,
    tools: BTreeSet<Dependency>,
}

impl HostFacts {
    /// Facts for a host of the given kernel family with no tools available.
    pub fn new(kernel: KernelDialect) -> Self {
        Self {
            kernel,
            tools: BTreeSet::new(),
        }
    }

    /// Discovers the kernel family with `uname` and the available tools
    /// from $PATH.
    pub fn detect(executor: &impl Executor) -> Result<Self, Error> {
        let kernel = KernelDialect::from_kernel_name(
            &uname::kernel_name(executor).context("Failed to detect kernel family")?,
        );
        let tools = Dependency::iter().filter(Dependency::exists).collect();
        let facts = Self { kernel, tools };
        debug!("Detected host facts: {facts:?}");
        Ok(facts)
    }

    pub fn with_kernel(mut self, kernel: KernelDialect) -> Self {
        self.kernel = kernel;
        self
    }

    pub fn with_tools(mut self, tools: impl IntoIterator<Item = Dependency>) -> Self {
        self.tools.extend(tools);
        self
    }

    pub fn without_tools(mut self, tools: impl IntoIterator<Item = Dependency>) -> Self {
        for tool in tools {
            self.tools.remove(&tool);
        }
        self
    }

    pub fn kernel(&self) -> KernelDialect {
        self.kernel
    }

    /// Whether `tool` is available on the host.
    pub fn has(&self, tool: Dependency) -> bool {
        self.tools.contains(&tool)
    }

    /// Fails with [`DiskError::MissingTool`] unless `tool` is available.
    pub fn require(&self, tool: Dependency) -> Result<(), DiskError> {
        if self.has(tool) {
            Ok(())
        } else {
            Err(DiskError::MissingTool(tool))
        }
    }
}

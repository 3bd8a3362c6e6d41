use std::path::Path;

use anyhow::{Context, Error};
use log::info;
use serde::Deserialize;

use diskutils::{
    dependencies::Dependency,
    host::{HostFacts, KernelDialect},
};

/// Default location of the configuration file.
pub const DISKCTL_CONFIG_PATH: &str = "/etc/diskctl/config.yaml";

/// Local configuration, used to override what is detected on the host.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct DiskctlConfig {
    /// Kernel family to assume instead of asking `uname`
    #[serde(default)]
    pub kernel: Option<KernelDialect>,

    /// Tools to treat as absent even if they are in $PATH
    #[serde(default)]
    pub disabled_tools: Vec<Dependency>,
}

impl DiskctlConfig {
    /// Loads the configuration from `path`, or from the default location
    /// when no path is given. Only an explicitly requested file has to
    /// exist.
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        let (path, explicit) = match path {
            Some(path) => (path, true),
            None => (Path::new(DISKCTL_CONFIG_PATH), false),
        };

        if !explicit && !path.exists() {
            info!(
                "Configuration file not found at {}, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration '{}'", path.display()))?;
        Self::parse(&contents)
            .with_context(|| format!("Failed to parse configuration '{}'", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self, Error> {
        // An empty document deserializes to null
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Applies the overrides on top of the detected host facts.
    pub fn apply(&self, detected: HostFacts) -> HostFacts {
        let facts = match self.kernel {
            Some(kernel) => detected.with_kernel(kernel),
            None => detected,
        };
        facts.without_tools(self.disabled_tools.iter().copied())
    }
}

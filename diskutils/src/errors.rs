use crate::dependencies::{Dependency, DependencyError};

/// Errors produced by the disk operations.
#[derive(Debug, thiserror::Error)]
pub enum DiskError {
    #[error("Required tool '{0}' is not available on this host")]
    MissingTool(Dependency),

    #[error(transparent)]
    Dependency(#[from] Box<DependencyError>),

    #[error("Unparseable output from '{tool}': {reason}")]
    Unparseable { tool: Dependency, reason: String },

    #[error("Invalid flag '{0}' passed to df")]
    InvalidFlag(char),

    #[error("Invalid blkid token '{0}', expected KEY=VALUE")]
    InvalidToken(String),

    #[error("Unsupported FAT size {0}, expected one of 12, 16 or 32")]
    InvalidFatSize(u8),

    #[error("Mount point '{0}' does not exist")]
    MountNotFound(String),
}

impl DiskError {
    pub(crate) fn unparseable(tool: Dependency, reason: impl Into<String>) -> Self {
        Self::Unparseable {
            tool,
            reason: reason.into(),
        }
    }
}

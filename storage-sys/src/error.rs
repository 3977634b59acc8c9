// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;

use storage_types::ConfigError;
use thiserror::Error;

/// Error types for system-level operations
#[derive(Error, Debug)]
pub enum SysError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("command failed: {command}; stderr: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("failed to partition {device}: {reason}")]
    Partition { device: String, reason: String },

    #[error("failed to create physical volume on {device}: {reason}")]
    PvCreate { device: String, reason: String },

    #[error("failed to create volume group {volume_group}: {reason}")]
    VgCreate {
        volume_group: String,
        reason: String,
    },

    #[error("failed to create logical volume {volume_group}/{name}: {reason}")]
    LvCreate {
        volume_group: String,
        name: String,
        reason: String,
    },

    #[error("failed to create {filesystem} filesystem on {device}: {reason}")]
    FormatFilesystem {
        device: String,
        filesystem: String,
        reason: String,
    },

    #[error("failed to create mount point {path:?}: {reason}")]
    MountPoint { path: PathBuf, reason: String },

    #[error("failed to mount {device} at {target:?}: {reason}")]
    Mount {
        device: String,
        target: PathBuf,
        reason: String,
    },

    #[error("{0} is not part of this installation's storage namespace")]
    OutsideNamespace(String),

    #[error("required host tools not found: {}", .0.join(", "))]
    MissingTools(Vec<String>),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SysError {
    /// Human-readable reason carried by a failed command, used when a stage
    /// wraps it with its own context.
    pub(crate) fn reason(&self) -> String {
        match self {
            SysError::CommandFailed { command, stderr } => {
                let stderr = stderr.trim();
                if stderr.is_empty() {
                    format!("{command} exited unsuccessfully")
                } else {
                    format!("{command}: {stderr}")
                }
            }
            other => other.to_string(),
        }
    }
}

/// Result type alias for system operations
pub type Result<T> = std::result::Result<T, SysError>;

// SPDX-License-Identifier: GPL-3.0-only

//! Low-level system operations for installer storage provisioning
//!
//! This crate runs the external tools that turn a planned
//! [`storage_types::StorageLayout`] into a mounted target tree:
//! - GPT partitioning with `sgdisk`
//! - LVM teardown and creation
//! - `mkfs.<type>` formatting
//! - mounting under the installation root
//!
//! These operations destroy data on the configured devices and require
//! root privileges.

pub mod cmd;
pub mod error;
pub mod filesystem;
pub mod lvm;
pub mod mount;
pub mod namespace;
pub mod partition;
pub mod pipeline;
pub mod preflight;

pub use cmd::{CommandOutcome, CommandRunner, RecordedStep, RecordingRunner, SystemRunner, render};
pub use error::{Result, SysError};
pub use lvm::{LogicalVolumeStatus, TeardownOutcome, TeardownReport, list_logical_volumes};
pub use namespace::StorageNamespace;
pub use pipeline::{ProvisionReport, Provisioner};
pub use preflight::{ensure_tools, missing_tools, required_tools};

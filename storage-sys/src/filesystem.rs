// SPDX-License-Identifier: GPL-3.0-only

//! Filesystem creation with `mkfs.<type>`

use storage_types::{FormatTarget, StorageLayout};
use tracing::info;

use crate::cmd::CommandRunner;
use crate::error::{Result, SysError};
use crate::namespace::StorageNamespace;

/// Extra `mkfs` flags per filesystem type. Add new filesystem kinds here.
pub fn format_options(filesystem: &str) -> &'static [&'static str] {
    match filesystem {
        "vfat" => &["-F32"],
        _ => &[],
    }
}

pub fn mkfs_command(filesystem: &str) -> String {
    format!("mkfs.{filesystem}")
}

pub fn mkfs_args(filesystem: &str, device: &str) -> Vec<String> {
    format_options(filesystem)
        .iter()
        .map(|option| option.to_string())
        .chain(std::iter::once(device.to_string()))
        .collect()
}

pub fn format_device(
    runner: &dyn CommandRunner,
    namespace: &StorageNamespace,
    target: &FormatTarget,
) -> Result<()> {
    namespace.ensure_device(&target.device)?;
    info!("Creating {} filesystem on {}", target.filesystem, target.device);
    runner
        .run(
            &mkfs_command(&target.filesystem),
            &mkfs_args(&target.filesystem, &target.device),
        )
        .map_err(|error| SysError::FormatFilesystem {
            device: target.device.clone(),
            filesystem: target.filesystem.clone(),
            reason: error.reason(),
        })?;
    Ok(())
}

/// Format every planned partition and logical volume, stopping at the first
/// failure. Devices formatted before it stay formatted.
pub fn create_filesystems(
    runner: &dyn CommandRunner,
    namespace: &StorageNamespace,
    layout: &StorageLayout,
) -> Result<()> {
    info!("Creating filesystems");
    for target in layout.format_targets() {
        format_device(runner, namespace, &target)?;
    }
    Ok(())
}

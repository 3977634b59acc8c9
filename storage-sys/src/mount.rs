// SPDX-License-Identifier: GPL-3.0-only

//! Mounting the target tree
//!
//! Entries are mounted in [`StorageLayout::mount_order`]: shortest mount-point
//! path first, so `/` is in place before anything is mounted beneath it.

use std::path::{Path, PathBuf};

use storage_types::{MountEntry, StorageLayout};
use tracing::{info, warn};

use crate::cmd::{CommandRunner, args};
use crate::error::{Result, SysError};
use crate::namespace::StorageNamespace;

pub fn mount_entry(
    runner: &dyn CommandRunner,
    namespace: &StorageNamespace,
    root: &Path,
    entry: &MountEntry,
) -> Result<PathBuf> {
    namespace.ensure_device(&entry.device)?;
    let target = entry.target(root);

    runner
        .create_dir_all(&target)
        .map_err(|error| SysError::MountPoint {
            path: target.clone(),
            reason: error.reason(),
        })?;

    info!("Mounting {} at {}", entry.device, target.display());
    let target_arg = target.display().to_string();
    runner
        .run("mount", &args([entry.device.as_str(), target_arg.as_str()]))
        .map_err(|error| SysError::Mount {
            device: entry.device.clone(),
            target: target.clone(),
            reason: error.reason(),
        })?;

    Ok(target)
}

/// Mount every planned entry under `root`, returning the mounted targets.
///
/// Stops at the first failure; whatever is already mounted stays mounted.
pub fn mount_filesystems(
    runner: &dyn CommandRunner,
    namespace: &StorageNamespace,
    layout: &StorageLayout,
    root: &Path,
) -> Result<Vec<PathBuf>> {
    info!("Mounting filesystems under {}", root.display());
    layout
        .mount_order()
        .iter()
        .map(|entry| mount_entry(runner, namespace, root, entry))
        .collect()
}

/// Unmount every planned entry under `root`, children before parents.
///
/// Best effort: every entry is attempted and the failures are returned.
pub fn unmount_filesystems(
    runner: &dyn CommandRunner,
    layout: &StorageLayout,
    root: &Path,
) -> Vec<SysError> {
    let mut failures = Vec::new();
    for entry in layout.mount_order().iter().rev() {
        let target = entry.target(root);
        let target_arg = target.display().to_string();
        if let Err(error) = runner.run("umount", &args([target_arg.as_str()])) {
            warn!("Failed to unmount {}: {}", target.display(), error.reason());
            failures.push(SysError::Mount {
                device: entry.device.clone(),
                target,
                reason: error.reason(),
            });
        }
    }
    failures
}

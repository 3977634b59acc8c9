// SPDX-License-Identifier: GPL-3.0-only

//! Devices and volume groups a run is allowed to touch
//!
//! Built from the configuration and passed to every stage. A stage asked to
//! operate on anything outside it fails instead of writing to a device the
//! operator never named.

use std::collections::BTreeSet;

use storage_types::StorageLayout;

use crate::error::{Result, SysError};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageNamespace {
    devices: BTreeSet<String>,
    volume_groups: BTreeSet<String>,
}

impl StorageNamespace {
    pub fn new<D, V>(devices: D, volume_groups: V) -> Self
    where
        D: IntoIterator<Item = String>,
        V: IntoIterator<Item = String>,
    {
        Self {
            devices: devices.into_iter().collect(),
            volume_groups: volume_groups.into_iter().collect(),
        }
    }

    pub fn from_layout(layout: &StorageLayout) -> Self {
        Self::new(
            layout.devices.iter().cloned(),
            layout.volume_group.iter().map(|group| group.name.clone()),
        )
    }

    pub fn devices(&self) -> impl Iterator<Item = &str> {
        self.devices.iter().map(String::as_str)
    }

    pub fn volume_groups(&self) -> impl Iterator<Item = &str> {
        self.volume_groups.iter().map(String::as_str)
    }

    /// Accept a whole disk or one of its numbered partitions.
    pub fn ensure_block_device(&self, path: &str) -> Result<()> {
        let owned = self.devices.iter().any(|device| {
            path.strip_prefix(device.as_str())
                .is_some_and(|rest| rest.chars().all(|c| c.is_ascii_digit()))
        });
        if owned {
            Ok(())
        } else {
            Err(SysError::OutsideNamespace(path.to_string()))
        }
    }

    pub fn ensure_volume_group(&self, name: &str) -> Result<()> {
        if self.volume_groups.contains(name) {
            Ok(())
        } else {
            Err(SysError::OutsideNamespace(format!("volume group {name}")))
        }
    }

    /// Accept a partition device or a `/dev/<vg>/<lv>` path in an owned group.
    pub fn ensure_device(&self, path: &str) -> Result<()> {
        if self.ensure_block_device(path).is_ok() {
            return Ok(());
        }
        if let Some(rest) = path.strip_prefix("/dev/")
            && let Some((group, name)) = rest.split_once('/')
            && !name.is_empty()
            && !name.contains('/')
        {
            return self
                .ensure_volume_group(group)
                .map_err(|_| SysError::OutsideNamespace(path.to_string()));
        }
        Err(SysError::OutsideNamespace(path.to_string()))
    }
}

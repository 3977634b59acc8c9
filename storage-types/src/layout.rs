// SPDX-License-Identifier: GPL-3.0-only

//! Planned storage layout
//!
//! A `StorageLayout` is computed once from a validated `StorageConfig`. It
//! fixes partition numbers, device paths and the mount order so the
//! side-effecting stages never derive identity from list positions.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::{BootloaderMode, ConfigError, PartitionRole, StorageConfig, validate_storage};
use crate::partition_types::GptType;
use crate::size::parse_size;

/// 1-based partition number on a disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PartitionNumber(u32);

impl PartitionNumber {
    /// Number for the partition at zero-based `index` in declaration order.
    pub fn from_index(index: usize) -> Self {
        Self(index as u32 + 1)
    }
}

impl fmt::Display for PartitionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `/dev/sda` + 2 -> `/dev/sda2`. The number is appended verbatim.
pub fn partition_device_path(device: &str, number: PartitionNumber) -> String {
    format!("{device}{number}")
}

pub fn logical_volume_path(volume_group: &str, name: &str) -> String {
    format!("/dev/{volume_group}/{name}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedPartition {
    pub number: PartitionNumber,
    pub role: PartitionRole,
    /// Size as written in the configuration, passed through to `sgdisk`.
    pub size: String,
    pub size_bytes: u64,
    pub gpt_type: GptType,
    pub filesystem: Option<String>,
    pub mount_point: Option<String>,
    /// Device path on the primary disk.
    pub device_path: String,
}

impl PlannedPartition {
    /// Whether the filesystem stage formats this partition.
    pub fn is_formattable(&self) -> bool {
        self.filesystem.is_some()
            && !matches!(self.role, PartitionRole::LvmPv | PartitionRole::BiosBoot)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedLogicalVolume {
    pub name: String,
    pub size: String,
    pub size_bytes: u64,
    pub filesystem: String,
    pub mount_point: Option<String>,
    pub device_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedVolumeGroup {
    pub name: String,
    pub partition: PartitionNumber,
    /// Physical volume device, always on the primary disk.
    pub pv_device: String,
    pub logical_volumes: Vec<PlannedLogicalVolume>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormatTarget {
    pub device: String,
    pub filesystem: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MountEntry {
    pub device: String,
    pub mount_point: String,
}

impl MountEntry {
    /// Directory under `root` where this entry is mounted.
    pub fn target(&self, root: &Path) -> PathBuf {
        let relative = self.mount_point.trim_start_matches('/');
        if relative.is_empty() {
            root.to_path_buf()
        } else {
            root.join(relative)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    pub devices: Vec<String>,
    pub bootloader: BootloaderMode,
    pub partitions: Vec<PlannedPartition>,
    pub volume_group: Option<PlannedVolumeGroup>,
}

impl StorageLayout {
    pub fn plan(storage: &StorageConfig) -> Result<Self, ConfigError> {
        validate_storage(storage)?;

        let primary = storage.devices[0].as_str();
        let mut partitions = Vec::with_capacity(storage.partitions.len());
        let mut volume_group = None;

        for (index, spec) in storage.partitions.iter().enumerate() {
            let number = PartitionNumber::from_index(index);
            let device_path = partition_device_path(primary, number);

            if spec.role == PartitionRole::LvmPv
                && let Some(name) = spec.volume_group()
            {
                let logical_volumes = spec
                    .logical_volumes
                    .iter()
                    .map(|volume| PlannedLogicalVolume {
                        name: volume.name.clone(),
                        size: volume.size.clone(),
                        size_bytes: parse_size(&volume.size).unwrap_or_default(),
                        filesystem: volume.filesystem.clone(),
                        mount_point: volume.mount_point().map(str::to_string),
                        device_path: logical_volume_path(name, &volume.name),
                    })
                    .collect();

                volume_group = Some(PlannedVolumeGroup {
                    name: name.to_string(),
                    partition: number,
                    pv_device: device_path.clone(),
                    logical_volumes,
                });
            }

            partitions.push(PlannedPartition {
                number,
                role: spec.role,
                size: spec.size.clone(),
                size_bytes: parse_size(&spec.size).unwrap_or_default(),
                gpt_type: spec.role.gpt_type(),
                filesystem: spec.filesystem().map(str::to_string),
                mount_point: spec.mount_point().map(str::to_string),
                device_path,
            });
        }

        Ok(Self {
            devices: storage.devices.clone(),
            bootloader: storage.bootloader.mode,
            partitions,
            volume_group,
        })
    }

    pub fn primary_device(&self) -> &str {
        &self.devices[0]
    }

    /// Whether an `lvm_pv` partition was declared.
    pub fn needs_lvm(&self) -> bool {
        self.volume_group.is_some()
    }

    pub fn has_bios_boot(&self) -> bool {
        self.partitions
            .iter()
            .any(|partition| partition.role == PartitionRole::BiosBoot)
    }

    /// Every block device that receives a filesystem: plain partitions first,
    /// then logical volumes, each in declaration order.
    pub fn format_targets(&self) -> Vec<FormatTarget> {
        let partitions = self
            .partitions
            .iter()
            .filter(|partition| partition.is_formattable())
            .filter_map(|partition| {
                partition.filesystem.as_ref().map(|filesystem| FormatTarget {
                    device: partition.device_path.clone(),
                    filesystem: filesystem.clone(),
                })
            });

        let volumes = self
            .volume_group
            .iter()
            .flat_map(|group| group.logical_volumes.iter())
            .map(|volume| FormatTarget {
                device: volume.device_path.clone(),
                filesystem: volume.filesystem.clone(),
            });

        partitions.chain(volumes).collect()
    }

    /// Mountable entities in declaration order. Logical volumes take the
    /// position of their physical volume partition, which is never mounted.
    pub fn mount_entries(&self) -> Vec<MountEntry> {
        let mut entries = Vec::new();
        for partition in &self.partitions {
            if partition.role == PartitionRole::LvmPv {
                if let Some(group) = &self.volume_group
                    && group.partition == partition.number
                {
                    entries.extend(group.logical_volumes.iter().filter_map(|volume| {
                        volume.mount_point.as_ref().map(|mount_point| MountEntry {
                            device: volume.device_path.clone(),
                            mount_point: mount_point.clone(),
                        })
                    }));
                }
                continue;
            }

            if let Some(mount_point) = &partition.mount_point {
                entries.push(MountEntry {
                    device: partition.device_path.clone(),
                    mount_point: mount_point.clone(),
                });
            }
        }
        entries
    }

    pub fn mount_order(&self) -> Vec<MountEntry> {
        sort_by_mount_depth(self.mount_entries())
    }
}

/// Order entries so that shorter mount-point paths mount first.
///
/// Path length stands in for hierarchy depth: a child path is always longer
/// than its parent, so parents still mount first. Unrelated paths are ordered
/// by length alone (`/a/b` before `/data`) and ties keep their input order.
pub fn sort_by_mount_depth(mut entries: Vec<MountEntry>) -> Vec<MountEntry> {
    entries.sort_by_key(|entry| entry.mount_point.len());
    entries
}

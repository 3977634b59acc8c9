// SPDX-License-Identifier: GPL-3.0-only

//! Declarative install configuration
//!
//! Loaded once from a TOML file and treated as immutable for the rest of the
//! run. Only the storage half is interpreted by this workspace; the
//! installation root is where the finished mount tree ends up.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::size::{SizeError, parse_size};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {reason}")]
    Invalid { reason: String },
    #[error("invalid size for {context}: {source}")]
    Size {
        context: String,
        #[source]
        source: SizeError,
    },
}

fn invalid(reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        reason: reason.into(),
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LoggingLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LoggingLevel {
    pub fn as_directive(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
    #[serde(default)]
    pub log_level: LoggingLevel,
    pub installation: InstallationConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallationConfig {
    /// Root of the target mount tree, e.g. `/mnt/target`.
    pub mount_point: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Target disks; the first entry is the primary device.
    pub devices: Vec<String>,
    #[serde(default)]
    pub bootloader: BootloaderConfig,
    pub partitions: Vec<PartitionSpec>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BootloaderConfig {
    #[serde(rename = "type", default)]
    pub mode: BootloaderMode,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BootloaderMode {
    #[default]
    Uefi,
    Bios,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PartitionRole {
    BiosBoot,
    EfiSystem,
    Boot,
    LvmPv,
    Data,
}

impl PartitionRole {
    pub fn as_str(self) -> &'static str {
        match self {
            PartitionRole::BiosBoot => "bios_boot",
            PartitionRole::EfiSystem => "efi_system",
            PartitionRole::Boot => "boot",
            PartitionRole::LvmPv => "lvm_pv",
            PartitionRole::Data => "data",
        }
    }
}

/// One partition in declaration order. Its partition number is its 1-based
/// position in `StorageConfig::partitions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionSpec {
    #[serde(rename = "type")]
    pub role: PartitionRole,
    pub size: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filesystem: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_point: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_group: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logical_volumes: Vec<LogicalVolumeSpec>,
}

impl PartitionSpec {
    pub fn filesystem(&self) -> Option<&str> {
        non_empty(self.filesystem.as_deref())
    }

    pub fn mount_point(&self) -> Option<&str> {
        non_empty(self.mount_point.as_deref())
    }

    pub fn volume_group(&self) -> Option<&str> {
        non_empty(self.volume_group.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicalVolumeSpec {
    pub name: String,
    pub size: String,
    pub filesystem: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_point: Option<String>,
}

impl LogicalVolumeSpec {
    pub fn mount_point(&self) -> Option<&str> {
        non_empty(self.mount_point.as_deref())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.is_empty())
}

/// Read, parse and validate a configuration file.
pub fn load(path: &Path) -> Result<InstallConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    from_toml_str(&raw)
}

pub fn from_toml_str(raw: &str) -> Result<InstallConfig, ConfigError> {
    let config: InstallConfig = toml::from_str(raw)?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &InstallConfig) -> Result<(), ConfigError> {
    if !config.installation.mount_point.is_absolute() {
        return Err(invalid(format!(
            "installation mount_point must be absolute: {}",
            config.installation.mount_point.display()
        )));
    }
    validate_storage(&config.storage)
}

pub fn validate_storage(storage: &StorageConfig) -> Result<(), ConfigError> {
    if storage.devices.is_empty() {
        return Err(invalid("storage.devices must not be empty"));
    }
    if storage.devices.iter().any(|device| device.is_empty()) {
        return Err(invalid("device paths must not be empty"));
    }
    if storage.partitions.is_empty() {
        return Err(invalid("storage.partitions must not be empty"));
    }

    let pv_count = storage
        .partitions
        .iter()
        .filter(|partition| partition.role == PartitionRole::LvmPv)
        .count();
    if pv_count > 1 {
        return Err(invalid(format!(
            "at most one lvm_pv partition is supported, found {pv_count}"
        )));
    }

    for (index, partition) in storage.partitions.iter().enumerate() {
        let position = index + 1;
        let partition_size = size_of(&partition.size, || format!("partition {position}"))?;

        if let Some(mount_point) = partition.mount_point() {
            check_mount_point(mount_point)?;
        }

        if partition.role != PartitionRole::LvmPv {
            if partition.volume_group().is_some() || !partition.logical_volumes.is_empty() {
                return Err(invalid(format!(
                    "partition {position} ({}) cannot declare a volume group or logical volumes",
                    partition.role.as_str()
                )));
            }
            continue;
        }

        if partition.volume_group().is_none() {
            return Err(invalid(format!(
                "lvm_pv partition {position} must name a volume_group"
            )));
        }

        let mut total: u64 = 0;
        for volume in &partition.logical_volumes {
            if volume.name.is_empty() {
                return Err(invalid(format!(
                    "logical volume on partition {position} must have a name"
                )));
            }
            if volume.filesystem.is_empty() {
                return Err(invalid(format!(
                    "logical volume {} must declare a filesystem",
                    volume.name
                )));
            }
            if let Some(mount_point) = volume.mount_point() {
                check_mount_point(mount_point)?;
            }
            let size = size_of(&volume.size, || format!("logical volume {}", volume.name))?;
            total = total.saturating_add(size);
        }

        if total > partition_size {
            return Err(invalid(format!(
                "logical volumes need {} MiB but lvm_pv partition {position} is {} MiB",
                total / 1024 / 1024,
                partition_size / 1024 / 1024
            )));
        }
    }

    Ok(())
}

fn size_of(text: &str, context: impl FnOnce() -> String) -> Result<u64, ConfigError> {
    parse_size(text).map_err(|source| ConfigError::Size {
        context: context(),
        source,
    })
}

fn check_mount_point(mount_point: &str) -> Result<(), ConfigError> {
    if mount_point.starts_with('/') {
        Ok(())
    } else {
        Err(invalid(format!(
            "mount point must be absolute: {mount_point:?}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LVM_UEFI: &str = include_str!("../../resources/install-specs/lvm-uefi.toml");
    const BIOS_PLAIN: &str = include_str!("../../resources/install-specs/bios-plain.toml");

    #[test]
    fn loads_lvm_sample() {
        let config = from_toml_str(LVM_UEFI).unwrap();
        assert_eq!(config.storage.devices, vec!["/dev/sdx"]);
        assert_eq!(config.storage.bootloader.mode, BootloaderMode::Uefi);
        assert_eq!(config.storage.partitions.len(), 2);

        let pv = &config.storage.partitions[1];
        assert_eq!(pv.role, PartitionRole::LvmPv);
        assert_eq!(pv.volume_group(), Some("vg0"));
        assert_eq!(pv.logical_volumes.len(), 2);
        assert_eq!(pv.logical_volumes[1].mount_point(), Some("/home"));
        assert_eq!(config.installation.mount_point, PathBuf::from("/mnt/target"));
    }

    #[test]
    fn loads_bios_sample_without_lvm() {
        let config = from_toml_str(BIOS_PLAIN).unwrap();
        assert_eq!(config.storage.bootloader.mode, BootloaderMode::Bios);
        assert!(
            config
                .storage
                .partitions
                .iter()
                .all(|partition| partition.volume_group().is_none())
        );
        assert_eq!(config.storage.partitions[0].role, PartitionRole::BiosBoot);
        assert_eq!(config.log_level, LoggingLevel::Debug);
    }

    #[test]
    fn load_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, LVM_UEFI).unwrap();
        assert!(load(&path).is_ok());

        let missing = dir.path().join("missing.toml");
        assert!(matches!(load(&missing), Err(ConfigError::Io { .. })));
    }

    fn minimal() -> InstallConfig {
        from_toml_str(
            r#"
            [installation]
            mount_point = "/mnt"

            [storage]
            devices = ["/dev/vda"]

            [[storage.partitions]]
            type = "data"
            size = "1G"
            filesystem = "ext4"
            mount_point = "/"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn rejects_empty_device_list() {
        let mut config = minimal();
        config.storage.devices.clear();
        assert!(matches!(validate(&config), Err(ConfigError::Invalid { .. })));
    }

    fn invalid_reason(config: &InstallConfig) -> String {
        match validate(config) {
            Err(ConfigError::Invalid { reason }) => reason,
            other => panic!("expected an invalid configuration, got {other:?}"),
        }
    }

    #[test]
    fn rejects_empty_partition_list() {
        let mut config = minimal();
        config.storage.partitions.clear();
        assert_eq!(invalid_reason(&config), "storage.partitions must not be empty");
    }

    #[test]
    fn lvm_partition_needs_a_volume_group() {
        let mut config = from_toml_str(LVM_UEFI).unwrap();
        config.storage.partitions[1].volume_group = None;
        assert_eq!(
            invalid_reason(&config),
            "lvm_pv partition 2 must name a volume_group"
        );

        config.storage.partitions[1].volume_group = Some(String::new());
        assert_eq!(
            invalid_reason(&config),
            "lvm_pv partition 2 must name a volume_group"
        );
    }

    #[test]
    fn logical_volume_needs_a_name() {
        let mut config = from_toml_str(LVM_UEFI).unwrap();
        config.storage.partitions[1].logical_volumes[0].name = String::new();
        assert_eq!(
            invalid_reason(&config),
            "logical volume on partition 2 must have a name"
        );
    }

    #[test]
    fn logical_volume_needs_a_filesystem() {
        let mut config = from_toml_str(LVM_UEFI).unwrap();
        config.storage.partitions[1].logical_volumes[1].filesystem = String::new();
        assert_eq!(
            invalid_reason(&config),
            "logical volume home must declare a filesystem"
        );
    }

    #[test]
    fn rejects_bad_size_strings() {
        let mut config = minimal();
        config.storage.partitions[0].size = "1.5G".to_string();
        let error = validate(&config).unwrap_err();
        assert!(matches!(
            error,
            ConfigError::Size {
                source: SizeError::InvalidFormat(_),
                ..
            }
        ));
    }

    #[test]
    fn rejects_second_lvm_partition() {
        let mut config = from_toml_str(LVM_UEFI).unwrap();
        let pv = config.storage.partitions[1].clone();
        config.storage.partitions.push(pv);
        let error = validate(&config).unwrap_err().to_string();
        assert!(error.contains("at most one lvm_pv"), "{error}");
    }

    #[test]
    fn rejects_volumes_larger_than_pv() {
        let mut config = from_toml_str(LVM_UEFI).unwrap();
        config.storage.partitions[1].logical_volumes[0].size = "19G".to_string();
        let error = validate(&config).unwrap_err().to_string();
        assert!(error.contains("logical volumes need"), "{error}");
    }

    #[test]
    fn rejects_relative_mount_points() {
        let mut config = minimal();
        config.storage.partitions[0].mount_point = Some("boot".to_string());
        assert!(validate(&config).is_err());

        let mut config = minimal();
        config.installation.mount_point = PathBuf::from("mnt");
        assert!(validate(&config).is_err());
    }

    #[test]
    fn rejects_volume_group_on_plain_partition() {
        let mut config = minimal();
        config.storage.partitions[0].volume_group = Some("vg0".to_string());
        assert!(validate(&config).is_err());
    }

    #[test]
    fn empty_strings_count_as_absent() {
        let mut config = minimal();
        config.storage.partitions[0].mount_point = Some(String::new());
        config.storage.partitions[0].filesystem = Some(String::new());
        assert!(validate(&config).is_ok());
        assert_eq!(config.storage.partitions[0].mount_point(), None);
        assert_eq!(config.storage.partitions[0].filesystem(), None);
    }
}

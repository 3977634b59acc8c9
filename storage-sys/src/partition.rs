// SPDX-License-Identifier: GPL-3.0-only

//! Partition table creation with `sgdisk`

use std::time::Duration;

use storage_types::PlannedPartition;
use tracing::{debug, info};

use crate::cmd::{CommandRunner, args};
use crate::error::{Result, SysError};
use crate::namespace::StorageNamespace;

/// Wait after a table write so the kernel re-reads it before the partitions
/// are referenced. Not a poll: slow or virtual disks can still lag behind.
pub const SETTLE_DELAY: Duration = Duration::from_secs(1);

pub fn clear_table_args(device: &str) -> Vec<String> {
    args(["-Z", "-o", device])
}

/// One `sgdisk` invocation creating every partition and setting its type.
pub fn create_partitions_args(device: &str, partitions: &[PlannedPartition]) -> Vec<String> {
    let mut args = vec![device.to_string()];
    for partition in partitions {
        args.push("-n".to_string());
        args.push(format!("{}::+{}", partition.number, partition.size));
        args.push("-t".to_string());
        args.push(format!("{}:{}", partition.number, partition.gpt_type.code));
    }
    args
}

/// Wipe `device` and write `partitions` to it.
///
/// Destroys any existing GPT and MBR data on the device without asking.
pub fn partition_device(
    runner: &dyn CommandRunner,
    namespace: &StorageNamespace,
    device: &str,
    partitions: &[PlannedPartition],
) -> Result<()> {
    namespace.ensure_block_device(device)?;
    info!("Partitioning device: {device}");
    for partition in partitions {
        debug!(
            "  {device}{}: {} {} ({})",
            partition.number,
            partition.role.as_str(),
            partition.size,
            partition.gpt_type.name
        );
    }

    let wrap = |error: SysError| SysError::Partition {
        device: device.to_string(),
        reason: error.reason(),
    };

    runner
        .run("sgdisk", &clear_table_args(device))
        .map_err(wrap)?;
    runner
        .run("sgdisk", &create_partitions_args(device, partitions))
        .map_err(wrap)?;

    runner.settle(SETTLE_DELAY);
    Ok(())
}

#[cfg(test)]
mod tests {
    use storage_types::{StorageLayout, from_toml_str};

    use super::*;
    use crate::cmd::{RecordedStep, RecordingRunner};

    const LVM_UEFI: &str = include_str!("../../resources/install-specs/lvm-uefi.toml");

    fn layout() -> StorageLayout {
        StorageLayout::plan(&from_toml_str(LVM_UEFI).unwrap().storage).unwrap()
    }

    #[test]
    fn builds_single_sgdisk_invocation() {
        let layout = layout();
        assert_eq!(
            create_partitions_args("/dev/sdx", &layout.partitions),
            args([
                "/dev/sdx", "-n", "1::+512M", "-t", "1:ef00", "-n", "2::+20G", "-t", "2:8e00",
            ])
        );
    }

    #[test]
    fn clears_writes_then_settles() {
        let layout = layout();
        let runner = RecordingRunner::new();
        let namespace = StorageNamespace::from_layout(&layout);

        partition_device(&runner, &namespace, "/dev/sdx", &layout.partitions).unwrap();

        let steps = runner.steps();
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].rendered(), "sgdisk -Z -o /dev/sdx");
        assert!(steps[1].rendered().starts_with("sgdisk /dev/sdx -n 1::+512M"));
        assert_eq!(steps[2], RecordedStep::Settle { millis: 1000 });
    }

    #[test]
    fn rejected_write_aborts_without_settling() {
        let layout = layout();
        let runner = RecordingRunner::new();
        runner.fail_on("sgdisk /dev/sdx -n", "Could not create partition 2");
        let namespace = StorageNamespace::from_layout(&layout);

        let error = partition_device(&runner, &namespace, "/dev/sdx", &layout.partitions)
            .unwrap_err();

        match error {
            SysError::Partition { device, reason } => {
                assert_eq!(device, "/dev/sdx");
                assert!(reason.contains("Could not create partition 2"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(
            !runner
                .steps()
                .iter()
                .any(|step| matches!(step, RecordedStep::Settle { .. }))
        );
    }

    #[test]
    fn refuses_devices_outside_namespace() {
        let layout = layout();
        let runner = RecordingRunner::new();
        let namespace = StorageNamespace::from_layout(&layout);

        let error = partition_device(&runner, &namespace, "/dev/sda", &layout.partitions)
            .unwrap_err();
        assert!(matches!(error, SysError::OutsideNamespace(_)));
        assert!(runner.steps().is_empty());
    }
}

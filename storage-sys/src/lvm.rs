// SPDX-License-Identifier: GPL-3.0-only

//! LVM physical volume, volume group and logical volume lifecycle
//!
//! Setup always starts by tearing down whatever a previous aborted run left
//! behind under the same names. Teardown never fails the stage; creation
//! failures always do, and nothing already created is rolled back.

use serde::Serialize;
use storage_types::{PlannedLogicalVolume, PlannedVolumeGroup, StorageLayout};
use tracing::{debug, info, warn};

use crate::cmd::{CommandOutcome, CommandRunner, args};
use crate::error::{Result, SysError};
use crate::namespace::StorageNamespace;

/// Result of a best-effort removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeardownOutcome {
    Removed,
    /// Nothing to remove; the expected case on a clean disk.
    NotFound,
    /// The tool refused for some other reason. Logged, never propagated.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownReport {
    pub volume_group: TeardownOutcome,
    pub physical_volume: TeardownOutcome,
}

const NOT_FOUND_MARKERS: [&str; 4] = ["not found", "no pv", "failed to find", "does not exist"];

/// Only non-`WARNING` lines decide: LVM prints "not found or rejected by a
/// filter" warnings for unrelated devices alongside real failures.
fn is_not_found(stderr: &str) -> bool {
    stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("WARNING"))
        .any(|line| {
            let line = line.to_ascii_lowercase();
            NOT_FOUND_MARKERS.iter().any(|marker| line.contains(marker))
        })
}

fn classify(result: Result<CommandOutcome>) -> TeardownOutcome {
    match result {
        Ok(_) => TeardownOutcome::Removed,
        Err(SysError::CommandFailed { stderr, .. }) if is_not_found(&stderr) => {
            TeardownOutcome::NotFound
        }
        Err(error) => TeardownOutcome::Failed(error.reason()),
    }
}

pub fn remove_volume_group(
    runner: &dyn CommandRunner,
    namespace: &StorageNamespace,
    name: &str,
) -> Result<TeardownOutcome> {
    namespace.ensure_volume_group(name)?;
    let outcome = classify(runner.run("vgremove", &args(["-f", name])));
    match &outcome {
        TeardownOutcome::Removed => info!("Removed stale volume group {name}"),
        TeardownOutcome::NotFound => info!("No existing volume group {name} to remove"),
        TeardownOutcome::Failed(reason) => {
            warn!("Could not remove volume group {name}, continuing: {reason}")
        }
    }
    Ok(outcome)
}

pub fn remove_physical_volume(
    runner: &dyn CommandRunner,
    namespace: &StorageNamespace,
    device: &str,
) -> Result<TeardownOutcome> {
    namespace.ensure_block_device(device)?;
    let outcome = classify(runner.run("pvremove", &args(["-ff", "-y", device])));
    match &outcome {
        TeardownOutcome::Removed => info!("Removed stale physical volume on {device}"),
        TeardownOutcome::NotFound => info!("No existing physical volume to remove on {device}"),
        TeardownOutcome::Failed(reason) => {
            warn!("Could not remove physical volume on {device}, continuing: {reason}")
        }
    }
    Ok(outcome)
}

pub fn create_physical_volume(
    runner: &dyn CommandRunner,
    namespace: &StorageNamespace,
    device: &str,
) -> Result<()> {
    namespace.ensure_block_device(device)?;
    runner
        .run("pvcreate", &args(["-ff", "-y", device]))
        .map_err(|error| SysError::PvCreate {
            device: device.to_string(),
            reason: error.reason(),
        })?;
    Ok(())
}

pub fn create_volume_group(
    runner: &dyn CommandRunner,
    namespace: &StorageNamespace,
    group: &PlannedVolumeGroup,
) -> Result<()> {
    namespace.ensure_volume_group(&group.name)?;
    namespace.ensure_block_device(&group.pv_device)?;
    runner
        .run("vgcreate", &args([group.name.as_str(), group.pv_device.as_str()]))
        .map_err(|error| SysError::VgCreate {
            volume_group: group.name.clone(),
            reason: error.reason(),
        })?;
    Ok(())
}

pub fn create_logical_volume(
    runner: &dyn CommandRunner,
    namespace: &StorageNamespace,
    volume_group: &str,
    volume: &PlannedLogicalVolume,
) -> Result<()> {
    namespace.ensure_volume_group(volume_group)?;
    runner
        .run(
            "lvcreate",
            &args([
                "-y",
                "-L",
                volume.size.as_str(),
                "-n",
                volume.name.as_str(),
                volume_group,
            ]),
        )
        .map_err(|error| SysError::LvCreate {
            volume_group: volume_group.to_string(),
            name: volume.name.clone(),
            reason: error.reason(),
        })?;
    Ok(())
}

/// Rebuild the planned volume group from scratch.
///
/// Returns `None` without running anything when the layout has no
/// `lvm_pv` partition.
pub fn setup_lvm(
    runner: &dyn CommandRunner,
    namespace: &StorageNamespace,
    layout: &StorageLayout,
) -> Result<Option<TeardownReport>> {
    let Some(group) = &layout.volume_group else {
        debug!("No lvm_pv partition planned, skipping LVM setup");
        return Ok(None);
    };

    info!(
        "Setting up LVM: volume group {} on {}",
        group.name, group.pv_device
    );

    let report = TeardownReport {
        volume_group: remove_volume_group(runner, namespace, &group.name)?,
        physical_volume: remove_physical_volume(runner, namespace, &group.pv_device)?,
    };

    create_physical_volume(runner, namespace, &group.pv_device)?;
    create_volume_group(runner, namespace, group)?;

    for volume in &group.logical_volumes {
        info!(
            "Creating logical volume {}/{} ({})",
            group.name, volume.name, volume.size
        );
        create_logical_volume(runner, namespace, &group.name, volume)?;
    }

    Ok(Some(report))
}

/// A row of `lvs` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogicalVolumeStatus {
    pub vg_name: String,
    pub lv_name: String,
    pub lv_path: String,
    pub size: u64,
    pub active: bool,
}

fn parse_tabbed_line(line: &str) -> Vec<String> {
    line.split('\t')
        .map(|part| part.trim().to_string())
        .collect()
}

pub fn parse_lvs(output: &str) -> Vec<LogicalVolumeStatus> {
    output
        .lines()
        .filter_map(|line| {
            // An inactive volume ends in an empty column, so keep trailing tabs.
            let line = line.trim_start();
            if line.trim().is_empty() {
                return None;
            }
            let cols = parse_tabbed_line(line);
            if cols.len() < 5 {
                return None;
            }

            Some(LogicalVolumeStatus {
                vg_name: cols[0].clone(),
                lv_name: cols[1].clone(),
                lv_path: cols[2].clone(),
                size: cols[3].parse().ok()?,
                active: cols[4].eq_ignore_ascii_case("active") || cols[4] == "y",
            })
        })
        .collect()
}

/// List the logical volumes currently present in `volume_group`.
pub fn list_logical_volumes(
    runner: &dyn CommandRunner,
    volume_group: &str,
) -> Result<Vec<LogicalVolumeStatus>> {
    let outcome = runner.run(
        "lvs",
        &args([
            "--noheadings",
            "--units",
            "b",
            "--nosuffix",
            "-o",
            "vg_name,lv_name,lv_path,lv_size,lv_active",
            "--separator",
            "\t",
            volume_group,
        ]),
    )?;
    Ok(parse_lvs(&outcome.stdout))
}

#[cfg(test)]
mod tests {
    use storage_types::from_toml_str;

    use super::*;
    use crate::cmd::RecordingRunner;

    const LVM_UEFI: &str = include_str!("../../resources/install-specs/lvm-uefi.toml");
    const BIOS_PLAIN: &str = include_str!("../../resources/install-specs/bios-plain.toml");

    fn plan(raw: &str) -> (StorageLayout, StorageNamespace) {
        let layout = StorageLayout::plan(&from_toml_str(raw).unwrap().storage).unwrap();
        let namespace = StorageNamespace::from_layout(&layout);
        (layout, namespace)
    }

    #[test]
    fn no_volume_group_is_a_no_op() {
        let (layout, namespace) = plan(BIOS_PLAIN);
        let runner = RecordingRunner::new();
        assert_eq!(setup_lvm(&runner, &namespace, &layout).unwrap(), None);
        assert!(runner.steps().is_empty());
    }

    #[test]
    fn tears_down_then_builds_in_order() {
        let (layout, namespace) = plan(LVM_UEFI);
        let runner = RecordingRunner::new();

        let report = setup_lvm(&runner, &namespace, &layout).unwrap().unwrap();

        assert_eq!(report.volume_group, TeardownOutcome::Removed);
        assert_eq!(
            runner.commands(),
            vec![
                "vgremove -f vg0",
                "pvremove -ff -y /dev/sdx2",
                "pvcreate -ff -y /dev/sdx2",
                "vgcreate vg0 /dev/sdx2",
                "lvcreate -y -L 18G -n root vg0",
                "lvcreate -y -L 2G -n home vg0",
            ]
        );
    }

    #[test]
    fn missing_stale_state_is_not_an_error() {
        let (layout, namespace) = plan(LVM_UEFI);
        let runner = RecordingRunner::new();
        runner.fail_on("vgremove", "  Volume group \"vg0\" not found");
        runner.fail_on("pvremove", "  No PV found on device /dev/sdx2.");

        let report = setup_lvm(&runner, &namespace, &layout).unwrap().unwrap();

        assert_eq!(report.volume_group, TeardownOutcome::NotFound);
        assert_eq!(report.physical_volume, TeardownOutcome::NotFound);
        assert_eq!(runner.commands().len(), 6);
    }

    #[test]
    fn unexpected_teardown_failure_is_reported_but_swallowed() {
        let (layout, namespace) = plan(LVM_UEFI);
        let runner = RecordingRunner::new();
        runner.fail_on("vgremove", "  Logical volume vg0/root in use.");

        let report = setup_lvm(&runner, &namespace, &layout).unwrap().unwrap();

        assert!(matches!(
            report.volume_group,
            TeardownOutcome::Failed(ref reason) if reason.contains("in use")
        ));
        assert_eq!(report.physical_volume, TeardownOutcome::Removed);
    }

    #[test]
    fn pvcreate_failure_is_fatal() {
        let (layout, namespace) = plan(LVM_UEFI);
        let runner = RecordingRunner::new();
        runner.fail_on("pvcreate", "Can't open /dev/sdx2 exclusively.");

        let error = setup_lvm(&runner, &namespace, &layout).unwrap_err();

        assert!(matches!(error, SysError::PvCreate { ref device, .. } if device == "/dev/sdx2"));
        assert!(!runner.commands().iter().any(|c| c.starts_with("vgcreate")));
    }

    #[test]
    fn vgcreate_failure_is_fatal() {
        let (layout, namespace) = plan(LVM_UEFI);
        let runner = RecordingRunner::new();
        runner.fail_on("vgcreate", "A volume group called vg0 already exists.");

        let error = setup_lvm(&runner, &namespace, &layout).unwrap_err();
        assert!(matches!(error, SysError::VgCreate { ref volume_group, .. } if volume_group == "vg0"));
    }

    #[test]
    fn lvcreate_failure_stops_remaining_volumes() {
        let (layout, namespace) = plan(LVM_UEFI);
        let runner = RecordingRunner::new();
        runner.fail_on("lvcreate -y -L 18G", "Insufficient free space");

        let error = setup_lvm(&runner, &namespace, &layout).unwrap_err();

        assert!(matches!(error, SysError::LvCreate { ref name, .. } if name == "root"));
        assert!(!runner.commands().iter().any(|c| c.contains("-n home")));
    }

    #[test]
    fn recognizes_not_found_messages() {
        assert!(is_not_found("  Volume group \"vg0\" not found"));
        assert!(is_not_found("  No PV found on device /dev/sdx2."));
        assert!(is_not_found("  Failed to find physical volume \"/dev/sdx2\"."));
        assert!(is_not_found("Device /dev/sdx2 does not exist"));
        assert!(!is_not_found("  Can't open /dev/sdx2 exclusively.  Mounted filesystem?"));
    }

    #[test]
    fn filter_warnings_do_not_hide_real_failures() {
        let refused = "  WARNING: Device /dev/sdy not found or rejected by a filter.\n  \
                       Logical volume vg0/root contains a filesystem in use.";
        assert!(!is_not_found(refused));

        let missing = "  WARNING: Device /dev/sdy not found or rejected by a filter.\n  \
                       Volume group \"vg0\" not found";
        assert!(is_not_found(missing));
    }

    #[test]
    fn refused_removal_behind_filter_warning_is_failed() {
        let (layout, namespace) = plan(LVM_UEFI);
        let runner = RecordingRunner::new();
        runner.fail_on(
            "vgremove",
            "  WARNING: Device /dev/sdy not found or rejected by a filter.\n  \
             Logical volume vg0/root contains a filesystem in use.",
        );

        let report = setup_lvm(&runner, &namespace, &layout).unwrap().unwrap();

        assert!(matches!(
            report.volume_group,
            TeardownOutcome::Failed(ref reason) if reason.contains("in use")
        ));
    }

    #[test]
    fn parses_lvs_output() {
        let rows = parse_lvs(
            "  vg0\troot\t/dev/vg0/root\t19327352832\tactive\n  vg0\thome\t/dev/vg0/home\t2147483648\t\n\n",
        );
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].lv_path, "/dev/vg0/root");
        assert_eq!(rows[0].size, 18 * 1024 * 1024 * 1024);
        assert!(rows[0].active);
        assert!(!rows[1].active);
    }
}

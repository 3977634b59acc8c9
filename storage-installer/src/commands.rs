// SPDX-License-Identifier: GPL-3.0-only

use anyhow::{Context, Result, bail};
use storage_sys::{
    Provisioner, RecordedStep, RecordingRunner, SystemRunner, list_logical_volumes, preflight,
};
use storage_types::{InstallConfig, StorageLayout};
use tracing::{info, warn};

fn layout(config: &InstallConfig) -> Result<StorageLayout> {
    StorageLayout::plan(&config.storage).context("planning storage layout")
}

fn ensure_root() -> Result<()> {
    if unsafe { libc::geteuid() } != 0 {
        bail!("storage-installer must run with root privileges");
    }
    Ok(())
}

/// Run the whole pipeline against a recorder and return the steps.
pub(crate) fn record_plan(config: &InstallConfig) -> Result<Vec<RecordedStep>> {
    let runner = RecordingRunner::new();
    Provisioner::new(&runner, config)?.run()?;
    Ok(runner.take_steps())
}

pub(crate) fn plan(config: &InstallConfig, json: bool) -> Result<()> {
    let steps = record_plan(config)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&steps)?);
    } else {
        for step in &steps {
            println!("{}", step.rendered());
        }
    }
    Ok(())
}

pub(crate) fn apply(config: &InstallConfig, dry_run: bool, yes: bool) -> Result<()> {
    let runner = SystemRunner::new(dry_run);
    let provisioner = Provisioner::new(&runner, config)?;

    if !dry_run {
        if !yes {
            bail!(
                "refusing to wipe {} without --yes",
                provisioner.layout().devices.join(", ")
            );
        }
        ensure_root()?;
        preflight::ensure_tools(provisioner.layout()).context("checking host tools")?;
    }

    let report = provisioner.run().context("provisioning storage")?;
    for target in &report.mounted {
        println!("{}", target.display());
    }
    Ok(())
}

pub(crate) fn mount_order_lines(config: &InstallConfig) -> Result<Vec<String>> {
    let root = &config.installation.mount_point;
    Ok(layout(config)?
        .mount_order()
        .iter()
        .map(|entry| format!("{} {}", entry.device, entry.target(root).display()))
        .collect())
}

pub(crate) fn mount_order(config: &InstallConfig) -> Result<()> {
    for line in mount_order_lines(config)? {
        println!("{line}");
    }
    Ok(())
}

pub(crate) fn unmount(config: &InstallConfig, dry_run: bool) -> Result<()> {
    if !dry_run {
        ensure_root()?;
    }
    let runner = SystemRunner::new(dry_run);
    let failures = Provisioner::new(&runner, config)?.unmount_filesystems();
    if !failures.is_empty() {
        for failure in &failures {
            warn!("{failure}");
        }
        bail!("{} filesystem(s) could not be unmounted", failures.len());
    }
    info!("Target tree unmounted");
    Ok(())
}

pub(crate) fn status(config: &InstallConfig) -> Result<()> {
    let layout = layout(config)?;
    let Some(group) = &layout.volume_group else {
        println!("no volume group configured");
        return Ok(());
    };

    let volumes = list_logical_volumes(&SystemRunner::new(false), &group.name)
        .with_context(|| format!("querying volume group {}", group.name))?;
    if volumes.is_empty() {
        println!("volume group {} has no logical volumes", group.name);
    }
    for volume in volumes {
        println!(
            "{}\t{}\t{}\t{}",
            volume.lv_path,
            volume.size,
            if volume.active { "active" } else { "inactive" },
            volume.vg_name
        );
    }
    Ok(())
}

// SPDX-License-Identifier: GPL-3.0-only

//! Storage provisioning pipeline
//!
//! partition → LVM → filesystems → mounts. Each stage runs to completion
//! before the next starts and the first error ends the run. Nothing is
//! rolled back.

use std::path::{Path, PathBuf};

use storage_types::{BootloaderMode, InstallConfig, StorageLayout};
use tracing::{debug, info, warn};

use crate::cmd::CommandRunner;
use crate::error::{Result, SysError};
use crate::filesystem;
use crate::lvm::{self, TeardownReport};
use crate::mount;
use crate::namespace::StorageNamespace;
use crate::partition;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionReport {
    pub teardown: Option<TeardownReport>,
    pub mounted: Vec<PathBuf>,
}

pub struct Provisioner<'a> {
    runner: &'a dyn CommandRunner,
    layout: StorageLayout,
    namespace: StorageNamespace,
    root: PathBuf,
}

impl<'a> Provisioner<'a> {
    pub fn new(runner: &'a dyn CommandRunner, config: &InstallConfig) -> Result<Self> {
        let layout = StorageLayout::plan(&config.storage)?;
        Ok(Self::from_layout(
            runner,
            layout,
            config.installation.mount_point.clone(),
        ))
    }

    pub fn from_layout(runner: &'a dyn CommandRunner, layout: StorageLayout, root: PathBuf) -> Self {
        let namespace = StorageNamespace::from_layout(&layout);
        debug!(
            "Storage namespace: devices [{}], volume groups [{}]",
            namespace.devices().collect::<Vec<_>>().join(", "),
            namespace.volume_groups().collect::<Vec<_>>().join(", ")
        );
        Self {
            runner,
            layout,
            namespace,
            root,
        }
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    pub fn namespace(&self) -> &StorageNamespace {
        &self.namespace
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write the same partition table to every configured device.
    pub fn partition_devices(&self) -> Result<()> {
        for device in &self.layout.devices {
            partition::partition_device(
                self.runner,
                &self.namespace,
                device,
                &self.layout.partitions,
            )?;
        }
        Ok(())
    }

    pub fn setup_lvm(&self) -> Result<Option<TeardownReport>> {
        lvm::setup_lvm(self.runner, &self.namespace, &self.layout)
    }

    pub fn create_filesystems(&self) -> Result<()> {
        filesystem::create_filesystems(self.runner, &self.namespace, &self.layout)
    }

    pub fn mount_filesystems(&self) -> Result<Vec<PathBuf>> {
        mount::mount_filesystems(self.runner, &self.namespace, &self.layout, &self.root)
    }

    pub fn unmount_filesystems(&self) -> Vec<SysError> {
        mount::unmount_filesystems(self.runner, &self.layout, &self.root)
    }

    pub fn run(&self) -> Result<ProvisionReport> {
        info!("Preparing storage on {}", self.layout.devices.join(", "));

        if self.layout.bootloader == BootloaderMode::Bios && !self.layout.has_bios_boot() {
            warn!("BIOS bootloader requested but no bios_boot partition is planned");
        }

        self.partition_devices()?;
        if self.layout.devices.len() > 1 {
            info!(
                "Continuing on primary device {} only",
                self.layout.primary_device()
            );
        }
        let teardown = self.setup_lvm()?;
        self.create_filesystems()?;
        let mounted = self.mount_filesystems()?;

        info!(
            "Storage ready: {} filesystem(s) mounted under {}",
            mounted.len(),
            self.root.display()
        );
        Ok(ProvisionReport { teardown, mounted })
    }
}

// SPDX-License-Identifier: GPL-3.0-only

//! Host tool checks before touching any device

use std::collections::BTreeSet;

use storage_types::StorageLayout;
use which::which;

use crate::error::{Result, SysError};
use crate::filesystem::mkfs_command;

const LVM_TOOLS: [&str; 5] = ["vgremove", "pvremove", "pvcreate", "vgcreate", "lvcreate"];

/// Every external program a run of `layout` invokes.
pub fn required_tools(layout: &StorageLayout) -> Vec<String> {
    let mut tools = BTreeSet::new();
    tools.insert("sgdisk".to_string());
    tools.insert("mount".to_string());
    if layout.needs_lvm() {
        tools.extend(LVM_TOOLS.iter().map(|tool| tool.to_string()));
    }
    tools.extend(
        layout
            .format_targets()
            .iter()
            .map(|target| mkfs_command(&target.filesystem)),
    );
    tools.into_iter().collect()
}

pub fn missing_tools(layout: &StorageLayout) -> Vec<String> {
    required_tools(layout)
        .into_iter()
        .filter(|tool| which(tool).is_err())
        .collect()
}

pub fn ensure_tools(layout: &StorageLayout) -> Result<()> {
    let missing = missing_tools(layout);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(SysError::MissingTools(missing))
    }
}

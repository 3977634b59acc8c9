// SPDX-License-Identifier: GPL-3.0-only

//! GPT partition type codes
//!
//! Short `sgdisk` type codes written into each partition entry. The code is
//! advisory: it never influences which filesystem gets created.

use crate::PartitionRole;

/// A GPT partition type as `sgdisk -t` understands it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GptType {
    /// Four-digit hex code accepted by `sgdisk -t <num>:<code>`.
    pub code: &'static str,
    pub name: &'static str,
}

pub const BIOS_BOOT: GptType = GptType {
    code: "ef02",
    name: "BIOS boot partition",
};

pub const EFI_SYSTEM: GptType = GptType {
    code: "ef00",
    name: "EFI System",
};

pub const LINUX_LVM: GptType = GptType {
    code: "8e00",
    name: "Linux LVM",
};

pub const LINUX_FILESYSTEM: GptType = GptType {
    code: "8300",
    name: "Linux filesystem",
};

impl PartitionRole {
    pub fn gpt_type(self) -> GptType {
        match self {
            PartitionRole::BiosBoot => BIOS_BOOT,
            PartitionRole::EfiSystem => EFI_SYSTEM,
            PartitionRole::LvmPv => LINUX_LVM,
            PartitionRole::Boot | PartitionRole::Data => LINUX_FILESYSTEM,
        }
    }
}

// SPDX-License-Identifier: GPL-3.0-only

//! Storage data model for the installer
//!
//! This crate is pure: it parses and validates the declarative install
//! configuration and turns it into a planned layout. Nothing here touches a
//! device.
//!
//! - `config` → `InstallConfig` / `StorageConfig` as read from TOML
//! - `size` → `512M` / `20G` style size strings
//! - `layout` → partition numbers, device paths, format targets, mount order
//! - `partition_types` → GPT type codes per partition role

pub mod config;
pub mod layout;
pub mod partition_types;
pub mod size;

pub use config::*;
pub use layout::*;
pub use partition_types::GptType;
pub use size::{SizeError, parse_size};

// SPDX-License-Identifier: GPL-3.0-only

//! Storage installer: partition, format and mount target disks
//!
//! Reads a TOML install configuration and drives the storage pipeline
//! against the devices it names.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use storage_types::LoggingLevel;

mod commands;
mod logging;

#[derive(Debug, Parser)]
#[command(name = "storage-installer")]
#[command(about = "Partition, format and mount target disks for an OS install")]
#[command(version)]
struct Cli {
    /// Install configuration file.
    #[arg(long, short, default_value = "config.toml")]
    config: PathBuf,
    /// Overrides `log_level` from the configuration.
    #[arg(long, value_enum)]
    log_level: Option<LogLevel>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print every step a run would perform, touching nothing.
    Plan {
        #[arg(long)]
        json: bool,
    },
    /// Partition, format and mount the configured devices.
    Apply {
        /// Log commands instead of executing them.
        #[arg(long)]
        dry_run: bool,
        /// Confirm that every configured device may be wiped.
        #[arg(long)]
        yes: bool,
    },
    /// Print mount entries in the order they are mounted.
    MountOrder,
    /// Unmount the target tree, children first.
    Unmount {
        #[arg(long)]
        dry_run: bool,
    },
    /// List logical volumes in the configured volume group.
    Status,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LoggingLevel {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LoggingLevel::Error,
            LogLevel::Warn => LoggingLevel::Warn,
            LogLevel::Info => LoggingLevel::Info,
            LogLevel::Debug => LoggingLevel::Debug,
            LogLevel::Trace => LoggingLevel::Trace,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = storage_types::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    let level = cli.log_level.map(LoggingLevel::from).unwrap_or(config.log_level);
    logging::init(level, config.log_file.as_deref());

    tracing::debug!(
        "storage-installer v{} using {}",
        env!("CARGO_PKG_VERSION"),
        cli.config.display()
    );

    let result = match cli.command {
        Command::Plan { json } => commands::plan(&config, json),
        Command::Apply { dry_run, yes } => commands::apply(&config, dry_run, yes),
        Command::MountOrder => commands::mount_order(&config),
        Command::Unmount { dry_run } => commands::unmount(&config, dry_run),
        Command::Status => commands::status(&config),
    };

    if let Err(error) = &result {
        tracing::error!("{error:#}");
    }
    result
}

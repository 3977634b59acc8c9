// SPDX-License-Identifier: GPL-3.0-only

use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, anyhow};
use storage_types::LoggingLevel;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the global subscriber: stdout always, plus `log_file` when set.
///
/// `RUST_LOG` overrides `level`.
pub(crate) fn init(level: LoggingLevel, log_file: Option<&Path>) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_directive()));

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(false);

    let Some(path) = log_file else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stdout_layer)
            .init();
        return;
    };

    match file_writer(path) {
        Ok((writer, guard)) => {
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_ansi(false);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(stdout_layer)
                .with(file_layer)
                .init();

            // Flushes buffered lines when the process exits.
            let _ = LOG_GUARD.set(guard);
        }
        Err(e) => {
            eprintln!("storage-installer: failed to initialize file logging: {e:#}");
            tracing_subscriber::registry()
                .with(env_filter)
                .with(stdout_layer)
                .init();
        }
    }
}

fn file_writer(path: &Path) -> anyhow::Result<(NonBlocking, WorkerGuard)> {
    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow!("log file has no file name: {}", path.display()))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    std::fs::create_dir_all(dir)
        .with_context(|| format!("create log directory failed: {}", dir.display()))?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    Ok(tracing_appender::non_blocking(appender))
}

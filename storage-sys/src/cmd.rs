// SPDX-License-Identifier: GPL-3.0-only

//! External command execution
//!
//! Every privileged tool the installer calls goes through [`CommandRunner`],
//! so a pipeline can run against real devices ([`SystemRunner`]) or be
//! recorded without side effects ([`RecordingRunner`]).

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::thread::sleep;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Result, SysError};

#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    pub executed: bool,
}

impl CommandOutcome {
    fn skipped(command: String) -> Self {
        Self {
            command,
            stdout: String::new(),
            stderr: String::new(),
            executed: false,
        }
    }
}

pub fn render(command: &str, args: &[String]) -> String {
    if args.is_empty() {
        command.to_string()
    } else {
        format!("{} {}", command, args.join(" "))
    }
}

/// Run argv, capture output, report exit status.
pub trait CommandRunner {
    /// Run `command` with `args`, failing with [`SysError::CommandFailed`] on a
    /// non-zero exit.
    fn run(&self, command: &str, args: &[String]) -> Result<CommandOutcome>;

    /// Create `path` and all missing ancestors.
    fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Block for `duration` so the kernel can catch up with device changes.
    fn settle(&self, duration: Duration);
}

/// Executes commands on the host. No timeout: a hung tool hangs the run.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner {
    pub dry_run: bool,
}

impl SystemRunner {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, command: &str, args: &[String]) -> Result<CommandOutcome> {
        let rendered = render(command, args);
        if self.dry_run {
            info!("Would execute: {rendered}");
            return Ok(CommandOutcome::skipped(rendered));
        }

        info!("Executing command: {rendered}");
        let output = Command::new(command)
            .args(args)
            .output()
            .map_err(|error| SysError::CommandFailed {
                command: rendered.clone(),
                stderr: error.to_string(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        if !stdout.trim().is_empty() {
            debug!("{command} stdout: {}", stdout.trim_end());
        }

        if !output.status.success() {
            return Err(SysError::CommandFailed {
                command: rendered,
                stderr: if stderr.trim().is_empty() {
                    format!("process exited with status {}", output.status)
                } else {
                    stderr
                },
            });
        }

        // Tools such as the LVM commands report warnings on stderr and still exit 0.
        if !stderr.trim().is_empty() {
            warn!("{command} stderr: {}", stderr.trim_end());
        }

        Ok(CommandOutcome {
            command: rendered,
            stdout,
            stderr,
            executed: true,
        })
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        if self.dry_run {
            info!("Would create directory {}", path.display());
            return Ok(());
        }
        debug!("Creating directory {}", path.display());
        fs::create_dir_all(path)?;
        Ok(())
    }

    fn settle(&self, duration: Duration) {
        if !self.dry_run {
            sleep(duration);
        }
    }
}

/// A single step seen by a [`RecordingRunner`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordedStep {
    Command { program: String, args: Vec<String> },
    CreateDir { path: PathBuf },
    Settle { millis: u64 },
}

impl RecordedStep {
    pub fn rendered(&self) -> String {
        match self {
            RecordedStep::Command { program, args } => render(program, args),
            RecordedStep::CreateDir { path } => format!("mkdir -p {}", path.display()),
            RecordedStep::Settle { millis } => format!("sleep {}", *millis as f64 / 1000.0),
        }
    }
}

#[derive(Debug, Clone)]
struct ScriptedFailure {
    prefix: String,
    stderr: String,
}

/// Records every step instead of executing it.
///
/// Commands whose rendered form starts with a scripted prefix fail with the
/// scripted stderr, which is how tool-level failures are simulated.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    steps: RefCell<Vec<RecordedStep>>,
    failures: RefCell<Vec<ScriptedFailure>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(&self, prefix: &str, stderr: &str) {
        self.failures.borrow_mut().push(ScriptedFailure {
            prefix: prefix.to_string(),
            stderr: stderr.to_string(),
        });
    }

    pub fn clear_failures(&self) {
        self.failures.borrow_mut().clear();
    }

    pub fn steps(&self) -> Vec<RecordedStep> {
        self.steps.borrow().clone()
    }

    /// Rendered command lines only, in execution order.
    pub fn commands(&self) -> Vec<String> {
        self.steps
            .borrow()
            .iter()
            .filter(|step| matches!(step, RecordedStep::Command { .. }))
            .map(RecordedStep::rendered)
            .collect()
    }

    pub fn take_steps(&self) -> Vec<RecordedStep> {
        self.steps.take()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, command: &str, args: &[String]) -> Result<CommandOutcome> {
        let rendered = render(command, args);
        self.steps.borrow_mut().push(RecordedStep::Command {
            program: command.to_string(),
            args: args.to_vec(),
        });

        if let Some(failure) = self
            .failures
            .borrow()
            .iter()
            .find(|failure| rendered.starts_with(&failure.prefix))
        {
            return Err(SysError::CommandFailed {
                command: rendered,
                stderr: failure.stderr.clone(),
            });
        }

        Ok(CommandOutcome::skipped(rendered))
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.steps.borrow_mut().push(RecordedStep::CreateDir {
            path: path.to_path_buf(),
        });
        Ok(())
    }

    fn settle(&self, duration: Duration) {
        self.steps.borrow_mut().push(RecordedStep::Settle {
            millis: duration.as_millis() as u64,
        });
    }
}

/// Shorthand for building argv vectors from string literals.
pub(crate) fn args<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    values.into_iter().map(Into::into).collect()
}

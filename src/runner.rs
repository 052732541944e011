//! External command execution
//!
//! Every program the installer invokes (curl, wget, micromamba)
//! goes through a [`CommandRunner`]. The trait is the seam that lets the
//! orchestration be tested with a recording fake and previewed with
//! [`DryRunRunner`].
//!
//! # Outcomes
//!
//! Each invocation ends in exactly one of three states:
//!
//! - tool absent: `Err(InstallerError::ToolNotFound)`
//! - tool ran and failed: `Ok(CommandOutput { success: false, .. })`
//! - tool ran and succeeded: `Ok(CommandOutput { success: true, .. })`
//!
//! A tool ended by a signal, or any run after the installer itself was
//! signalled, is `Err(InstallerError::Interrupted)` instead.
//!
//! Callers decide whether a failure is fatal via [`CommandOutput::ensure_success`].

use crate::error::{InstallerError, Result};
use std::ffi::OsStr;
use std::fmt;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::Mutex;

/// A fully described external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program name or path
    pub program: String,
    /// Arguments, passed without shell interpretation
    pub args: Vec<String>,
    /// Extra environment variables for the child
    pub envs: Vec<(String, String)>,
    /// Capture stdout/stderr instead of streaming them to the terminal
    pub capture: bool,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            capture: false,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Capture output so the caller can parse it.
    pub fn captured(mut self) -> Self {
        self.capture = true;
        self
    }

    /// Short program name for messages (`micromamba`, not its full path).
    pub fn program_name(&self) -> &str {
        Path::new(&self.program)
            .file_name()
            .and_then(OsStr::to_str)
            .unwrap_or(&self.program)
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " '{}'", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Output from a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Captured standard output (empty when streamed)
    pub stdout: String,
    /// Captured standard error (empty when streamed)
    pub stderr: String,
    /// Exit code (None if terminated by signal)
    pub exit_code: Option<i32>,
    /// Whether the command exited successfully
    pub success: bool,
}

impl CommandOutput {
    /// A successful run with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: Some(0),
            success: true,
        }
    }

    /// A failed run with the given exit code.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code: Some(code),
            success: false,
        }
    }

    /// Turn an unsuccessful exit into `CommandFailed`.
    pub fn ensure_success(&self, program: &str) -> Result<()> {
        if self.success {
            Ok(())
        } else {
            Err(InstallerError::command_failed(
                program,
                self.exit_code.unwrap_or(-1),
                self.stderr.trim(),
            ))
        }
    }
}

/// Executes external commands.
pub trait CommandRunner {
    /// Run a command to completion.
    ///
    /// # Errors
    ///
    /// - `ToolNotFound` if the program does not exist
    /// - `Io` for any other spawn or wait failure
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;

    /// Whether `program` resolves to an executable on PATH.
    fn program_exists(&self, program: &str) -> bool;

    /// Whether commands are only being previewed.
    fn is_dry_run(&self) -> bool {
        false
    }

    /// Run and require success.
    fn run_checked(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let output = self.run(spec)?;
        output.ensure_success(spec.program_name())?;
        Ok(output)
    }
}

/// Runs commands on the host.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        tracing::info!("run: {} env={:?}", spec, spec.envs);

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args).stdin(Stdio::null());
        for (key, value) in &spec.envs {
            cmd.env(key, value);
        }
        if spec.capture {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        } else {
            cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        }

        #[cfg(unix)]
        {
            use crate::process_guard::CommandProcessGroup;
            cmd.in_new_process_group();
        }

        if let Some(sig) = interrupted() {
            return Err(InstallerError::Interrupted(sig));
        }

        let child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                InstallerError::ToolNotFound(spec.program.clone())
            } else {
                InstallerError::Io(e)
            }
        })?;
        let pid = child.id();
        track_child(pid, true);

        let output = child.wait_with_output();
        track_child(pid, false);
        let output = output?;

        if let Some(sig) = interrupted().or_else(|| terminating_signal(&output.status)) {
            tracing::warn!("{} stopped by signal {}", spec.program_name(), sig);
            return Err(InstallerError::Interrupted(sig));
        }

        let result = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code(),
            success: output.status.success(),
        };

        if result.success {
            tracing::debug!("{} exited successfully", spec.program_name());
        } else {
            tracing::warn!(
                "{} failed with exit code {}",
                spec.program_name(),
                result.exit_code.unwrap_or(-1)
            );
        }
        Ok(result)
    }

    fn program_exists(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

#[cfg(unix)]
fn track_child(pid: u32, running: bool) {
    use crate::process_guard::ChildGroups;

    if let Ok(mut groups) = ChildGroups::global().lock() {
        if running {
            groups.track(pid);
        } else {
            groups.release(pid);
        }
    }
}

#[cfg(not(unix))]
fn track_child(_pid: u32, _running: bool) {}

#[cfg(unix)]
fn interrupted() -> Option<i32> {
    crate::process_guard::interrupted()
}

#[cfg(not(unix))]
fn interrupted() -> Option<i32> {
    None
}

#[cfg(unix)]
fn terminating_signal(status: &std::process::ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn terminating_signal(_status: &std::process::ExitStatus) -> Option<i32> {
    None
}

/// Logs and prints every command without executing it.
///
/// Tool lookups still hit the real host so the preview shows which transfer
/// tool would be chosen.
#[derive(Debug, Default)]
pub struct DryRunRunner {
    planned: Mutex<Vec<CommandSpec>>,
}

impl DryRunRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands that would have been executed, in order.
    pub fn planned(&self) -> Vec<CommandSpec> {
        self.planned.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl CommandRunner for DryRunRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        tracing::info!("[DRY RUN] Skipping: {}", spec);
        println!("[dry-run] {}", spec);
        if let Ok(mut planned) = self.planned.lock() {
            planned.push(spec.clone());
        }
        Ok(CommandOutput::ok(""))
    }

    fn program_exists(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }

    fn is_dry_run(&self) -> bool {
        true
    }
}

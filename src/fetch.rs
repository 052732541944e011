//! HTTP download through whichever transfer tool the host provides.

use crate::error::{InstallerError, Result};
use crate::runner::{CommandRunner, CommandSpec};
use std::path::Path;
use strum::{Display, EnumIter, EnumString};

/// Extra curl arguments, appended after the built-in ones.
pub const CURL_OPTS_VAR: &str = "CURL_OPTS";
/// Extra wget arguments, placed before the built-in ones.
pub const WGET_OPTS_VAR: &str = "WGET_OPTS";

/// Supported download clients, in order of preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum TransferTool {
    Curl,
    Wget,
}

impl TransferTool {
    /// Environment variable holding extra options for this tool.
    pub fn opts_var(self) -> &'static str {
        match self {
            Self::Curl => CURL_OPTS_VAR,
            Self::Wget => WGET_OPTS_VAR,
        }
    }

    /// Build the download command.
    ///
    /// `extra` is split on whitespace like an unquoted shell expansion.
    pub fn command(self, url: &str, destination: &Path, extra: &str) -> CommandSpec {
        let extra = extra.split_whitespace();
        let dest = destination.display().to_string();
        match self {
            Self::Curl => CommandSpec::new("curl")
                .args([url, "-o", dest.as_str(), "-fsSL", "--compressed"])
                .args(extra),
            Self::Wget => CommandSpec::new("wget")
                .args(extra)
                .args(["-qO", dest.as_str(), url]),
        }
    }
}

/// Pick curl if present, otherwise wget.
///
/// # Errors
///
/// `MissingTransferTool` when neither is on PATH.
pub fn select_transfer_tool(runner: &dyn CommandRunner) -> Result<TransferTool> {
    for tool in [TransferTool::Curl, TransferTool::Wget] {
        if runner.program_exists(&tool.to_string()) {
            tracing::debug!("Using {} for downloads", tool);
            return Ok(tool);
        }
    }
    Err(InstallerError::MissingTransferTool)
}

/// Download `url` to `destination`, following redirects.
///
/// No retries or timeouts are applied; a transport failure surfaces as the
/// tool's non-zero exit.
pub fn fetch(runner: &dyn CommandRunner, url: &str, destination: &Path) -> Result<()> {
    let tool = select_transfer_tool(runner)?;
    let extra = std::env::var(tool.opts_var()).unwrap_or_default();
    tracing::info!("Downloading {} -> {}", url, destination.display());
    runner.run_checked(&tool.command(url, destination, &extra))?;
    Ok(())
}

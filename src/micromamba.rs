//! micromamba bootstrap and invocation
//!
//! Downloads the standalone micromamba binary for the resolved platform and
//! wraps every later manager call in a [`Micromamba`] handle.
//!
//! # Shell integration
//!
//! The shell hook (`micromamba shell hook`) normally defines a shell function
//! and exports `MAMBA_EXE` and `MAMBA_ROOT_PREFIX`. A Rust process cannot
//! evaluate shell code into itself, so the hook is run once to prove the binary
//! works on this host, and its effect is carried by the handle instead: every
//! command it builds uses the absolute executable path and sets those two
//! variables, with the bin folder prepended to `PATH`.

use crate::config::Config;
use crate::error::{InstallerError, Result};
use crate::fetch::fetch;
use crate::platform::PlatformTag;
use crate::runner::{CommandRunner, CommandSpec};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const RELEASES_BASE: &str = "https://github.com/mamba-org/micromamba-releases/releases";

/// Build the release download URL for `platform`.
///
/// `latest` maps to GitHub's `latest/download` redirect; any other value must
/// be a published release tag such as `1.5.10-0`.
pub fn release_url(platform: &PlatformTag, version: &str) -> String {
    if version == crate::version::LATEST {
        format!("{}/latest/download/micromamba-{}", RELEASES_BASE, platform)
    } else {
        format!("{}/download/{}/micromamba-{}", RELEASES_BASE, version, platform)
    }
}

/// Handle to an installed micromamba with shell integration applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Micromamba {
    exe: PathBuf,
    root_prefix: PathBuf,
    bin_folder: PathBuf,
}

#[derive(Debug, Deserialize)]
struct EnvList {
    envs: Vec<PathBuf>,
}

impl Micromamba {
    /// Handle for a binary at `config.micromamba_path()`.
    pub fn from_config(config: &Config) -> Self {
        Self {
            exe: config.micromamba_path(),
            root_prefix: config.prefix_location.clone(),
            bin_folder: config.bin_folder.clone(),
        }
    }

    pub fn exe(&self) -> &Path {
        &self.exe
    }

    pub fn root_prefix(&self) -> &Path {
        &self.root_prefix
    }

    /// A micromamba command with the activated environment applied.
    pub fn command<I, S>(&self, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let exe = self.exe.display().to_string();
        CommandSpec::new(exe.clone())
            .args(args)
            .env("MAMBA_EXE", exe)
            .env("MAMBA_ROOT_PREFIX", self.root_prefix.display().to_string())
            .env("PATH", self.search_path())
    }

    fn search_path(&self) -> String {
        let mut dirs = vec![self.bin_folder.clone()];
        if let Some(path) = std::env::var_os("PATH") {
            dirs.extend(std::env::split_paths(&path));
        }
        std::env::join_paths(dirs)
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|_| self.bin_folder.display().to_string())
    }

    /// Run the shell hook to verify the binary executes on this host.
    pub fn shell_hook(&self, runner: &dyn CommandRunner) -> Result<()> {
        let spec = self
            .command(["shell", "hook", "--shell", "bash"])
            .captured();
        let output = runner.run_checked(&spec)?;
        tracing::debug!(
            "Shell hook produced {} line(s); applying via MAMBA_EXE/MAMBA_ROOT_PREFIX",
            output.stdout.lines().count()
        );
        Ok(())
    }

    /// `micromamba create -y -n <name> -c <channel>... <specs>...`
    pub fn create_env(
        &self,
        runner: &dyn CommandRunner,
        name: &str,
        channels: &[&str],
        specs: &[String],
    ) -> Result<()> {
        let mut args = vec!["create".to_string(), "-y".into(), "-n".into(), name.into()];
        for channel in channels {
            args.push("-c".into());
            args.push((*channel).to_string());
        }
        args.extend(specs.iter().cloned());

        tracing::info!("Creating environment '{}' with {:?}", name, specs);
        runner.run_checked(&self.command(args))?;
        Ok(())
    }

    /// `micromamba run -n <name> <args>...`
    pub fn run_in_env(&self, runner: &dyn CommandRunner, name: &str, args: &[String]) -> Result<()> {
        let mut full = vec!["run".to_string(), "-n".into(), name.into()];
        full.extend(args.iter().cloned());
        runner.run_checked(&self.command(full))?;
        Ok(())
    }

    /// Prefix an environment named `name` gets under this root.
    pub fn env_prefix(&self, name: &str) -> PathBuf {
        self.root_prefix.join("envs").join(name)
    }

    /// Every environment prefix micromamba knows about.
    ///
    /// This includes prefixes registered by other conda installs, so callers
    /// match on full paths rather than names.
    pub fn env_prefixes(&self, runner: &dyn CommandRunner) -> Result<Vec<PathBuf>> {
        let spec = self.command(["env", "list", "--json"]).captured();
        let output = runner.run_checked(&spec)?;
        parse_env_prefixes(&output.stdout)
    }
}

/// Extract the prefixes from `micromamba env list --json` output.
pub fn parse_env_prefixes(json: &str) -> Result<Vec<PathBuf>> {
    let list: EnvList = serde_json::from_str(json)?;
    Ok(list.envs)
}

/// Download micromamba, make it executable and apply its shell integration.
///
/// # Errors
///
/// - `MissingTransferTool` if neither curl nor wget exists
/// - `CommandFailed` if the download or the shell hook fails
/// - `Io` if the bin folder cannot be created or permissions cannot be set
pub fn install_package_manager(
    runner: &dyn CommandRunner,
    config: &Config,
    platform: &PlatformTag,
) -> Result<Micromamba> {
    let url = release_url(platform, &config.micromamba_version);
    let mamba = Micromamba::from_config(config);

    if runner.is_dry_run() {
        tracing::info!("[DRY RUN] Would create {}", config.bin_folder.display());
    } else {
        fs::create_dir_all(&config.bin_folder)?;
    }

    fetch(runner, &url, mamba.exe())?;

    if !runner.is_dry_run() {
        if !mamba.exe().is_file() {
            return Err(InstallerError::ToolNotFound(mamba.exe().display().to_string()));
        }
        make_executable(mamba.exe())?;
    }

    mamba.shell_hook(runner)?;
    tracing::info!("micromamba installed at {}", mamba.exe().display());
    Ok(mamba)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

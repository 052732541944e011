//! Installer configuration
//!
//! All names, versions and paths are resolved once at startup into an immutable
//! [`Config`] that every operation borrows. Values come from built-in defaults,
//! optionally overridden by a JSON file, and finally by the positional version
//! argument.
//!
//! # Example config file
//!
//! ```json
//! {
//!   "python_version": "3.12",
//!   "kernel_env": "my-kernel"
//! }
//! ```
//!
//! Fields that are omitted keep their defaults.

use crate::error::{InstallerError, Result};
use crate::version::VersionSelector;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_PACKAGE_NAME: &str = "spyder-remote-services";
pub const DEFAULT_SERVER_ENV: &str = "spyder-remote";
pub const DEFAULT_KERNEL_ENV: &str = "spyder-kernels";
pub const DEFAULT_MICROMAMBA_VERSION: &str = "1.5.10-0";
pub const DEFAULT_PYTHON_VERSION: &str = "3.11";
pub const DEFAULT_CHANNEL: &str = "conda-forge";
pub const DEFAULT_KERNEL_CHANNEL: &str = "conda-forge/label/spyder_kernels_rc";
pub const DEFAULT_KERNEL_PACKAGE: &str = "spyder-kernels";

/// On-disk overrides. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub package_name: Option<String>,
    pub server_env: Option<String>,
    pub kernel_env: Option<String>,
    pub micromamba_version: Option<String>,
    pub bin_folder: Option<PathBuf>,
    pub prefix_location: Option<PathBuf>,
    pub python_version: Option<String>,
    pub channel: Option<String>,
    pub kernel_channel: Option<String>,
    pub kernel_package: Option<String>,
}

impl ConfigFile {
    /// Load overrides from a JSON file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            InstallerError::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let file: Self = serde_json::from_str(&content)?;
        tracing::debug!("Loaded config overrides from {}", path.display());
        Ok(file)
    }
}

/// Fully resolved, validated installer configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub package_name: String,
    pub version: VersionSelector,
    pub server_env: String,
    pub kernel_env: String,
    pub micromamba_version: String,
    pub bin_folder: PathBuf,
    pub prefix_location: PathBuf,
    pub python_version: String,
    pub channel: String,
    pub kernel_channel: String,
    pub kernel_package: String,
}

impl Config {
    /// Built-in defaults rooted at `home`.
    pub fn with_home(home: &Path) -> Self {
        Self {
            package_name: DEFAULT_PACKAGE_NAME.to_string(),
            version: VersionSelector::Latest,
            server_env: DEFAULT_SERVER_ENV.to_string(),
            kernel_env: DEFAULT_KERNEL_ENV.to_string(),
            micromamba_version: DEFAULT_MICROMAMBA_VERSION.to_string(),
            bin_folder: home.join(".local").join("bin"),
            prefix_location: home.join("micromamba"),
            python_version: DEFAULT_PYTHON_VERSION.to_string(),
            channel: DEFAULT_CHANNEL.to_string(),
            kernel_channel: DEFAULT_KERNEL_CHANNEL.to_string(),
            kernel_package: DEFAULT_KERNEL_PACKAGE.to_string(),
        }
    }

    /// Resolve the configuration for this run.
    ///
    /// # Errors
    ///
    /// - `Config` if `HOME` is unset, the override file is unreadable, or a
    ///   resolved value fails [`Config::validate`]
    /// - `Json` if the override file is malformed
    pub fn resolve(version: &str, config_path: Option<&Path>) -> Result<Self> {
        let home = std::env::var_os("HOME")
            .map(PathBuf::from)
            .ok_or_else(|| InstallerError::config("HOME is not set"))?;

        let mut config = Self::with_home(&home);
        if let Some(path) = config_path {
            config = config.with_overrides(ConfigFile::load_from_file(path)?);
        }
        config.version = VersionSelector::parse(version)?;
        config.validate()?;

        tracing::info!(
            package = %config.package_name,
            version = %config.version,
            server_env = %config.server_env,
            kernel_env = %config.kernel_env,
            "Configuration resolved"
        );
        Ok(config)
    }

    /// Apply file overrides on top of the current values.
    pub fn with_overrides(mut self, file: ConfigFile) -> Self {
        let ConfigFile {
            package_name,
            server_env,
            kernel_env,
            micromamba_version,
            bin_folder,
            prefix_location,
            python_version,
            channel,
            kernel_channel,
            kernel_package,
        } = file;

        if let Some(v) = package_name {
            self.package_name = v;
        }
        if let Some(v) = server_env {
            self.server_env = v;
        }
        if let Some(v) = kernel_env {
            self.kernel_env = v;
        }
        if let Some(v) = micromamba_version {
            self.micromamba_version = v;
        }
        if let Some(v) = bin_folder {
            self.bin_folder = v;
        }
        if let Some(v) = prefix_location {
            self.prefix_location = v;
        }
        if let Some(v) = python_version {
            self.python_version = v;
        }
        if let Some(v) = channel {
            self.channel = v;
        }
        if let Some(v) = kernel_channel {
            self.kernel_channel = v;
        }
        if let Some(v) = kernel_package {
            self.kernel_package = v;
        }
        self
    }

    /// Path of the downloaded manager binary.
    pub fn micromamba_path(&self) -> PathBuf {
        self.bin_folder.join(micromamba_binary_name())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("package_name", &self.package_name),
            ("server_env", &self.server_env),
            ("kernel_env", &self.kernel_env),
            ("micromamba_version", &self.micromamba_version),
            ("python_version", &self.python_version),
            ("channel", &self.channel),
            ("kernel_channel", &self.kernel_channel),
            ("kernel_package", &self.kernel_package),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(InstallerError::config(format!("{} must not be empty", field)));
            }
        }

        for (field, name) in [("server_env", &self.server_env), ("kernel_env", &self.kernel_env)] {
            if !is_valid_env_name(name) {
                return Err(InstallerError::config(format!(
                    "{} '{}' may only contain letters, digits, '-', '_' and '.'",
                    field, name
                )));
            }
        }

        if self.server_env == self.kernel_env {
            return Err(InstallerError::config(
                "server_env and kernel_env must name different environments",
            ));
        }

        if self.bin_folder.as_os_str().is_empty() || self.prefix_location.as_os_str().is_empty() {
            return Err(InstallerError::config("bin_folder and prefix_location must be set"));
        }

        Ok(())
    }
}

/// Name of the manager executable inside `bin_folder`.
pub fn micromamba_binary_name() -> &'static str {
    if cfg!(windows) { "micromamba.exe" } else { "micromamba" }
}

fn is_valid_env_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

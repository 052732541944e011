//! Host platform detection
//!
//! Maps the raw OS name and machine architecture reported by the host onto one
//! of the platform tags micromamba publishes release binaries for.
//!
//! # Design
//!
//! - **Pure mapping**: [`resolve_platform`] takes plain strings, so every
//!   supported and unsupported combination is testable without touching the host
//! - **Fail Fast**: unknown OS names and pairs outside the whitelist are errors,
//!   returned before any download is attempted

use crate::error::{InstallerError, Result};
use std::fmt;
use std::process::Command;
use strum::{Display, EnumIter, EnumString};

/// Operating system family as named in micromamba release assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum OsFamily {
    Linux,
    Osx,
    Win,
}

impl OsFamily {
    /// Map a `uname -s` style OS name to its family.
    ///
    /// MSYS/MinGW/Cygwin shells report names such as `MINGW64_NT-10.0`, so any
    /// name containing `NT` is treated as Windows.
    pub fn from_uname(os: &str) -> Option<Self> {
        match os {
            "Linux" => Some(Self::Linux),
            "Darwin" => Some(Self::Osx),
            other if other.contains("NT") => Some(Self::Win),
            _ => None,
        }
    }
}

/// Architectures that keep their own name in release assets. Everything else
/// is published under the generic `64` tag.
const NAMED_ARCHES: &[&str] = &["aarch64", "ppc64le", "arm64"];

/// Platform/arch combinations with a published micromamba binary.
pub const SUPPORTED_PLATFORMS: &[&str] = &[
    "linux-aarch64",
    "linux-ppc64le",
    "linux-64",
    "osx-arm64",
    "osx-64",
    "win-64",
];

/// Normalize a `uname -m` architecture string.
pub fn normalize_arch(arch: &str) -> &str {
    if NAMED_ARCHES.contains(&arch) {
        arch
    } else {
        "64"
    }
}

/// A validated platform tag, e.g. `linux-64` or `osx-arm64`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlatformTag {
    os: OsFamily,
    arch: String,
}

impl PlatformTag {
    pub fn os(&self) -> OsFamily {
        self.os
    }

    pub fn arch(&self) -> &str {
        &self.arch
    }
}

impl fmt::Display for PlatformTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}

/// Resolve raw OS and architecture names to a supported platform tag.
///
/// # Errors
///
/// `UnsupportedPlatform` if the OS is unknown or the resulting pair is not in
/// [`SUPPORTED_PLATFORMS`].
pub fn resolve_platform(os: &str, arch: &str) -> Result<PlatformTag> {
    let unsupported = || InstallerError::UnsupportedPlatform {
        os: os.to_string(),
        arch: arch.to_string(),
        supported: SUPPORTED_PLATFORMS.join(", "),
    };

    let family = OsFamily::from_uname(os).ok_or_else(unsupported)?;
    let tag = PlatformTag {
        os: family,
        arch: normalize_arch(arch).to_string(),
    };

    if !SUPPORTED_PLATFORMS.contains(&tag.to_string().as_str()) {
        return Err(unsupported());
    }

    tracing::debug!(os, arch, platform = %tag, "Resolved platform");
    Ok(tag)
}

/// Raw OS and architecture names of the running host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInfo {
    pub os: String,
    pub arch: String,
}

impl HostInfo {
    /// Detect the host via `uname`, falling back to the compile-time target
    /// when `uname` is not available.
    pub fn detect() -> Self {
        let os = uname("-s").unwrap_or_else(|| fallback_os().to_string());
        let arch = uname("-m").unwrap_or_else(|| fallback_arch().to_string());
        tracing::info!("Host detection: os={}, arch={}", os, arch);
        Self { os, arch }
    }

    /// Resolve this host to a platform tag.
    pub fn platform(&self) -> Result<PlatformTag> {
        resolve_platform(&self.os, &self.arch)
    }
}

fn uname(flag: &str) -> Option<String> {
    let output = Command::new("uname").arg(flag).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!value.is_empty()).then_some(value)
}

fn fallback_os() -> &'static str {
    match std::env::consts::OS {
        "linux" => "Linux",
        "macos" => "Darwin",
        "windows" => "Windows_NT",
        other => other,
    }
}

/// `uname -m` reports Apple silicon as `arm64`.
fn fallback_arch() -> &'static str {
    match (std::env::consts::OS, std::env::consts::ARCH) {
        ("macos", "aarch64") => "arm64",
        (_, arch) => arch,
    }
}

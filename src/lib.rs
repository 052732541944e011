//! Remote environment installer library
//!
//! Bootstraps micromamba on the host and provisions the remote-services server
//! environment and the Jupyter kernel environment.

pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod environments;
pub mod error;
pub mod fetch;
pub mod micromamba;
pub mod platform;
#[cfg(unix)]
pub mod process_guard;
pub mod provision_state;
pub mod runner;
pub mod version;

// Re-export main types for convenience
pub use bootstrap::{Bootstrapper, FailurePolicy, ProvisionReport};
pub use config::{Config, ConfigFile};
pub use error::{InstallerError, Result};
pub use micromamba::{Micromamba, install_package_manager, release_url};
pub use platform::{HostInfo, OsFamily, PlatformTag, resolve_platform};
pub use provision_state::{ProvisionContext, ProvisionStage, ProvisionTransitionError};
pub use runner::{CommandOutput, CommandRunner, CommandSpec, DryRunRunner, SystemRunner};
pub use version::VersionSelector;

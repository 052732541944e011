//! Error handling module for the installer
//!
//! Provides centralized error handling with proper error types using thiserror.
//! Every fallible operation in the library returns [`Result`], so the binary can
//! report one human-readable message and exit non-zero.

use thiserror::Error;

/// Main error type for the installer
#[derive(Error, Debug)]
pub enum InstallerError {
    /// Host OS/architecture pair outside the supported set
    #[error("Unsupported platform: {os} on {arch} (supported: {supported})")]
    UnsupportedPlatform {
        os: String,
        arch: String,
        supported: String,
    },

    /// Neither curl nor wget is available on PATH
    #[error("Neither curl nor wget was found. Please install one of them to continue")]
    MissingTransferTool,

    /// An external program could not be spawned because it does not exist
    #[error("Required tool not found: {0}")]
    ToolNotFound(String),

    /// An external program ran and exited unsuccessfully
    #[error("{program} failed (exit code {code}): {stderr}")]
    CommandFailed {
        program: String,
        code: i32,
        stderr: String,
    },

    /// The installer or the tool it was running was stopped by a signal
    #[error("Interrupted by signal {0}")]
    Interrupted(i32),

    /// Configuration errors (loading, parsing, validation)
    #[error("Configuration error: {0}")]
    Config(String),

    /// An environment expected after provisioning is absent
    #[error("Environment '{0}' is missing from the package manager listing")]
    MissingEnvironment(String),

    /// Steps that failed while running with the continue policy
    #[error("{0} provisioning step(s) failed")]
    StepsFailed(usize),

    /// Provisioning stage machine errors
    #[error("Provision transition error: {0}")]
    Transition(#[from] crate::provision_state::ProvisionTransitionError),

    /// IO errors (file operations, process spawning)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for installer operations
pub type Result<T> = std::result::Result<T, InstallerError>;

impl InstallerError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a command failure error
    pub fn command_failed(program: impl Into<String>, code: i32, stderr: impl Into<String>) -> Self {
        Self::CommandFailed {
            program: program.into(),
            code,
            stderr: stderr.into(),
        }
    }

    /// Returns true for conditions that always halt the run, regardless of
    /// the configured failure policy.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::CommandFailed { .. })
    }
}

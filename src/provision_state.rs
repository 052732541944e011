//! Provisioning stage machine
//!
//! Tracks where a run is. Stages only move forward, one at a time; any
//! non-terminal stage can drop to `Failed`.
//!
//! ```text
//! NotStarted
//!     ↓
//! ResolvingPlatform
//!     ↓
//! InstallingPackageManager
//!     ↓
//! ProvisioningServer
//!     ↓
//! ProvisioningKernel
//!     ↓
//! Verifying
//!     ↓
//! Completed
//! ```

use std::fmt;
use thiserror::Error;

/// Provisioning stages in sequential order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ProvisionStage {
    #[default]
    NotStarted = 0,
    /// Detecting OS/arch and mapping to a release tag
    ResolvingPlatform = 1,
    /// Downloading micromamba and applying its shell integration
    InstallingPackageManager = 2,
    /// Creating the server env and installing the server package
    ProvisioningServer = 3,
    /// Creating the kernel env and registering its kernel spec
    ProvisioningKernel = 4,
    /// Checking both environments exist
    Verifying = 5,
    Completed = 6,
    Failed = 255,
}

impl ProvisionStage {
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Next stage in the sequence, or None at a terminal state
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::NotStarted => Some(Self::ResolvingPlatform),
            Self::ResolvingPlatform => Some(Self::InstallingPackageManager),
            Self::InstallingPackageManager => Some(Self::ProvisioningServer),
            Self::ProvisioningServer => Some(Self::ProvisioningKernel),
            Self::ProvisioningKernel => Some(Self::Verifying),
            Self::Verifying => Some(Self::Completed),
            Self::Completed | Self::Failed => None,
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::NotStarted => "Not started",
            Self::ResolvingPlatform => "Resolving platform",
            Self::InstallingPackageManager => "Installing micromamba",
            Self::ProvisioningServer => "Provisioning server environment",
            Self::ProvisioningKernel => "Provisioning kernel environment",
            Self::Verifying => "Verifying environments",
            Self::Completed => "Provisioning complete",
            Self::Failed => "Provisioning failed",
        }
    }

    /// Stage number as shown in progress output (`[2/5]`), None outside the
    /// working stages
    pub const fn step(self) -> Option<(u8, u8)> {
        match self {
            Self::ResolvingPlatform
            | Self::InstallingPackageManager
            | Self::ProvisioningServer
            | Self::ProvisioningKernel
            | Self::Verifying => Some((self as u8, 5)),
            _ => None,
        }
    }
}

impl fmt::Display for ProvisionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur during stage transitions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProvisionTransitionError {
    #[error("Cannot move from {from} to {to} (stages advance one at a time)")]
    OutOfOrder {
        from: ProvisionStage,
        to: ProvisionStage,
    },

    #[error("Cannot transition from terminal state {from}")]
    FromTerminalState { from: ProvisionStage },
}

/// Owns the current stage and the list of steps that failed under the
/// continue policy.
#[derive(Debug, Clone, Default)]
pub struct ProvisionContext {
    current: ProvisionStage,
    failed_at: Option<ProvisionStage>,
    failures: Vec<(ProvisionStage, String)>,
}

impl ProvisionContext {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn current_stage(&self) -> ProvisionStage {
        self.current
    }

    #[inline]
    pub fn failed_at(&self) -> Option<ProvisionStage> {
        self.failed_at
    }

    /// Failures recorded without stopping the run
    pub fn failures(&self) -> &[(ProvisionStage, String)] {
        &self.failures
    }

    /// Move to `target`, which must be the immediate next stage.
    pub fn transition_to(
        &mut self,
        target: ProvisionStage,
    ) -> Result<ProvisionStage, ProvisionTransitionError> {
        let from = self.current_stage();
        if from.is_terminal() {
            return Err(ProvisionTransitionError::FromTerminalState { from });
        }
        if from.next() != Some(target) {
            return Err(ProvisionTransitionError::OutOfOrder { from, to: target });
        }

        tracing::debug!("Stage: {} -> {}", from, target);
        self.current = target;
        Ok(target)
    }

    /// Record a failure in the current stage and keep going.
    pub fn record_failure(&mut self, message: impl Into<String>) {
        let stage = self.current_stage();
        self.failures.push((stage, message.into()));
    }

    /// Drop to `Failed`, remembering where it happened.
    pub fn fail(&mut self) {
        let stage = self.current_stage();
        if !stage.is_terminal() {
            self.failed_at = Some(stage);
            self.current = ProvisionStage::Failed;
        }
    }
}

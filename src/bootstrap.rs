//! Provisioning orchestration
//!
//! Runs the stages in order against a [`CommandRunner`]:
//!
//! 1. resolve the platform tag from the host
//! 2. download micromamba and apply its shell integration
//! 3. provision the server environment
//! 4. provision the kernel environment and register its kernel spec
//! 5. verify both environment prefixes are listed by micromamba
//!
//! # Failure handling
//!
//! Unsupported platforms, missing tools and a failed micromamba bootstrap
//! always stop the run. A failing environment step stops the run under
//! [`FailurePolicy::Abort`]; under [`FailurePolicy::Continue`] it is recorded,
//! the remaining steps still run, and the run ends with `StepsFailed`.

use crate::config::Config;
use crate::environments::{provision_kernel_environment, provision_server_environment};
use crate::error::{InstallerError, Result};
use crate::micromamba::{Micromamba, install_package_manager};
use crate::platform::{HostInfo, PlatformTag};
use crate::provision_state::{ProvisionContext, ProvisionStage};
use crate::runner::CommandRunner;
use std::path::PathBuf;
use strum::{Display, EnumIter, EnumString};

/// What to do when an environment step fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "kebab-case")]
pub enum FailurePolicy {
    /// Stop at the first failing step
    #[default]
    Abort,
    /// Keep running later steps and report all failures at the end
    Continue,
}

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct ProvisionReport {
    pub platform: PlatformTag,
    pub micromamba: Micromamba,
    /// Verified environment prefixes (empty in dry-run)
    pub environments: Vec<PathBuf>,
    pub dry_run: bool,
}

/// Drives one provisioning run.
pub struct Bootstrapper<'a> {
    config: &'a Config,
    runner: &'a dyn CommandRunner,
    host: HostInfo,
    policy: FailurePolicy,
    ctx: ProvisionContext,
}

impl<'a> Bootstrapper<'a> {
    pub fn new(config: &'a Config, runner: &'a dyn CommandRunner, host: HostInfo) -> Self {
        Self {
            config,
            runner,
            host,
            policy: FailurePolicy::default(),
            ctx: ProvisionContext::new(),
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Stage tracking for this run.
    pub fn context(&self) -> &ProvisionContext {
        &self.ctx
    }

    /// Execute every stage in order.
    pub fn run(&mut self) -> Result<ProvisionReport> {
        let result = self.run_stages();
        if result.is_err() {
            self.ctx.fail();
            tracing::error!(
                "Provisioning failed during: {}",
                self.ctx.failed_at().unwrap_or_default()
            );
        }
        result
    }

    fn run_stages(&mut self) -> Result<ProvisionReport> {
        self.enter(ProvisionStage::ResolvingPlatform)?;
        let platform = self.host.platform()?;
        println!("   platform: {}", platform);

        self.enter(ProvisionStage::InstallingPackageManager)?;
        let mamba = install_package_manager(self.runner, self.config, &platform)?;

        self.enter(ProvisionStage::ProvisioningServer)?;
        let server = provision_server_environment(
            self.runner,
            &mamba,
            self.config,
            &self.config.version,
        );
        self.settle(server)?;

        self.enter(ProvisionStage::ProvisioningKernel)?;
        let kernel = provision_kernel_environment(self.runner, &mamba, self.config);
        self.settle(kernel)?;

        self.enter(ProvisionStage::Verifying)?;
        let failed = self.ctx.failures().len();
        if failed > 0 {
            return Err(InstallerError::StepsFailed(failed));
        }
        let environments = if self.runner.is_dry_run() {
            tracing::info!("[DRY RUN] Skipping environment verification");
            Vec::new()
        } else {
            self.verify(&mamba)?
        };

        self.ctx.transition_to(ProvisionStage::Completed)?;
        Ok(ProvisionReport {
            platform,
            micromamba: mamba,
            environments,
            dry_run: self.runner.is_dry_run(),
        })
    }

    fn enter(&mut self, stage: ProvisionStage) -> Result<()> {
        self.ctx.transition_to(stage)?;
        if let Some((n, total)) = stage.step() {
            println!("==> [{}/{}] {}", n, total, stage);
        }
        tracing::info!("Stage: {}", stage);
        Ok(())
    }

    /// Apply the failure policy to a step result.
    fn settle(&mut self, result: Result<()>) -> Result<()> {
        match result {
            Ok(()) => Ok(()),
            Err(e) if self.policy == FailurePolicy::Continue && !e.is_fatal() => {
                tracing::warn!("{} failed, continuing: {}", self.ctx.current_stage(), e);
                eprintln!("✗ {}: {}", self.ctx.current_stage(), e);
                self.ctx.record_failure(e.to_string());
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn verify(&self, mamba: &Micromamba) -> Result<Vec<PathBuf>> {
        let listed = mamba.env_prefixes(self.runner)?;
        let mut verified = Vec::new();
        for name in [&self.config.server_env, &self.config.kernel_env] {
            let prefix = mamba.env_prefix(name);
            if !listed.contains(&prefix) {
                return Err(InstallerError::MissingEnvironment(name.clone()));
            }
            verified.push(prefix);
        }
        tracing::info!("Verified environments: {:?}", verified);
        Ok(verified)
    }
}

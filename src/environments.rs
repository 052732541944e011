//! Server and kernel environment provisioning.

use crate::config::Config;
use crate::error::Result;
use crate::micromamba::Micromamba;
use crate::runner::CommandRunner;
use crate::version::VersionSelector;

/// Conda specs for the server environment.
pub fn server_env_specs(config: &Config) -> Vec<String> {
    vec![format!("python={}", config.python_version), "pip".to_string()]
}

/// pip arguments installing the server package.
pub fn server_install_args(config: &Config, selector: &VersionSelector) -> Vec<String> {
    vec![
        "pip".to_string(),
        "install".to_string(),
        selector.install_spec(&config.package_name),
    ]
}

/// Conda specs for the kernel environment.
pub fn kernel_env_specs(config: &Config) -> Vec<String> {
    vec![
        format!("python={}", config.python_version),
        config.kernel_package.clone(),
    ]
}

/// Arguments registering the kernel env as a user-level Jupyter kernel spec.
pub fn kernel_registration_args(config: &Config) -> Vec<String> {
    ["python", "-m", "ipykernel", "install", "--user", "--name"]
        .iter()
        .map(|s| s.to_string())
        .chain(std::iter::once(config.kernel_env.clone()))
        .collect()
}

/// Create the server environment and install the server package into it.
pub fn provision_server_environment(
    runner: &dyn CommandRunner,
    mamba: &Micromamba,
    config: &Config,
    selector: &VersionSelector,
) -> Result<()> {
    tracing::info!(
        "Provisioning server environment '{}' ({})",
        config.server_env,
        selector.install_spec(&config.package_name)
    );
    mamba.create_env(
        runner,
        &config.server_env,
        &[config.channel.as_str()],
        &server_env_specs(config),
    )?;
    mamba.run_in_env(runner, &config.server_env, &server_install_args(config, selector))
}

/// Create the kernel environment and register it as a kernel spec.
pub fn provision_kernel_environment(
    runner: &dyn CommandRunner,
    mamba: &Micromamba,
    config: &Config,
) -> Result<()> {
    tracing::info!("Provisioning kernel environment '{}'", config.kernel_env);
    mamba.create_env(
        runner,
        &config.kernel_env,
        &[config.channel.as_str(), config.kernel_channel.as_str()],
        &kernel_env_specs(config),
    )?;
    mamba.run_in_env(runner, &config.kernel_env, &kernel_registration_args(config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_server_install_args_follow_selector() {
        let config = Config::with_home(Path::new("/h"));
        let args = server_install_args(&config, &VersionSelector::parse("1.0.0").unwrap());
        assert_eq!(args, ["pip", "install", "spyder-remote-services==1.0.0"]);
    }

    #[test]
    fn test_kernel_registration_uses_env_name() {
        let mut config = Config::with_home(Path::new("/h"));
        config.kernel_env = "k-env".into();
        let args = kernel_registration_args(&config);
        assert_eq!(args.last().map(String::as_str), Some("k-env"));
        assert!(args.contains(&"--user".to_string()));
    }

    #[test]
    fn test_env_specs_pin_python() {
        let config = Config::with_home(Path::new("/h"));
        assert_eq!(server_env_specs(&config), ["python=3.11", "pip"]);
        assert_eq!(kernel_env_specs(&config), ["python=3.11", "spyder-kernels"]);
    }
}

//! Remote environment installer - main entry point

use anyhow::Context;
use spyder_remote_installer::cli::Cli;
use spyder_remote_installer::{
    Bootstrapper, CommandRunner, Config, DryRunRunner, FailurePolicy, HostInfo, InstallerError,
    ProvisionReport, SystemRunner,
};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

/// Initialize logging. `RUST_LOG` overrides the default `info` level.
fn init_logger() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn main() {
    init_logger();
    info!("Installer starting up");

    // Running tools are stopped if we receive SIGINT/SIGTERM/SIGHUP
    #[cfg(unix)]
    {
        if let Err(e) = spyder_remote_installer::process_guard::init_signal_handlers() {
            tracing::warn!("Failed to initialize signal handlers: {}", e);
        }
    }

    let cli = Cli::parse_args();
    debug!("CLI arguments parsed: {:?}", cli);

    if let Err(e) = run(&cli) {
        error!("{:#}", e);
        eprintln!("✗ {:#}", e);
        std::process::exit(exit_status(&e));
    }
}

/// `128 + signal` for an interrupted run, 1 for everything else.
fn exit_status(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<InstallerError>() {
        Some(InstallerError::Interrupted(sig)) => 128 + sig,
        _ => 1,
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = Config::resolve(&cli.selector, cli.config.as_deref())
        .context("Failed to resolve configuration")?;

    let policy = if cli.keep_going {
        FailurePolicy::Continue
    } else {
        FailurePolicy::Abort
    };

    let system = SystemRunner;
    let dry = DryRunRunner::new();
    let runner: &dyn CommandRunner = if cli.dry_run { &dry } else { &system };

    let host = HostInfo::detect();
    let report = Bootstrapper::new(&config, runner, host)
        .with_policy(policy)
        .run()?;

    print_summary(&config, &report);
    Ok(())
}

fn print_summary(config: &Config, report: &ProvisionReport) {
    println!();
    if report.dry_run {
        println!("✓ Dry run complete, nothing was changed");
        return;
    }
    println!("✓ Provisioning completed successfully!");
    println!("   platform:    {}", report.platform);
    println!("   micromamba:  {}", report.micromamba.exe().display());
    println!("   root prefix: {}", report.micromamba.root_prefix().display());
    println!(
        "   server env:  {} ({})",
        config.server_env,
        config.version.install_spec(&config.package_name)
    );
    println!("   kernel env:  {} (kernel spec '{}')", config.kernel_env, config.kernel_env);
}

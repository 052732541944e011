use clap::Parser;
use std::path::PathBuf;

/// Install micromamba and provision the remote-services server and kernel environments
#[derive(Parser, Debug)]
#[command(name = "spyder-remote-installer")]
#[command(about = "Provision the remote-services server and Jupyter kernel environments")]
#[command(version)]
pub struct Cli {
    /// Server package version: `latest`, a bare version (`1.2.3`) or a
    /// pip expression (`>=1.2,<2`)
    #[arg(value_name = "VERSION", default_value = crate::version::LATEST)]
    pub selector: String,

    /// JSON file overriding default names, versions and paths
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Show what would be executed without downloading or installing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Keep going after a failed environment step and report failures at the end
    #[arg(long)]
    pub keep_going: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        <Self as clap::Parser>::parse()
    }
}

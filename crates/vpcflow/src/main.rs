mod commands;
mod output;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use vpcflow_config::Topology;
use vpcflow_core::Pipeline;

#[derive(Parser)]
#[command(name = "vpcflow", version)]
#[command(
    about = "Deploy VPC stacks across regions, peer them and propagate routes",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file (default: $VPCFLOW_SETTINGS, ./vpcflow.yaml, ~/.config/vpcflow/settings.yaml)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Verbose logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// VPC list and the directory its templates live in
#[derive(Args)]
pub struct Target {
    /// YAML list of VPCs
    pub config: PathBuf,
    /// Directory containing the stack templates
    pub template_dir: PathBuf,
}

#[derive(Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub target: Target,

    /// Maximum items in flight within a phase
    #[arg(long)]
    pub max_in_flight: Option<usize>,

    /// Maximum concurrent items per region
    #[arg(long)]
    pub per_region: Option<usize>,

    /// Peering topology: mesh (every pair) or hub (first VPC to all others)
    #[arg(long)]
    pub topology: Option<Topology>,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy every stack, peer the VPCs and propagate routes
    Up(RunArgs),
    /// Create or update the stacks only
    Deploy(RunArgs),
    /// Peer the VPCs of already deployed stacks
    Peer(RunArgs),
    /// Propagate routes over existing peering connections
    Route(RunArgs),
    /// Check the VPC list, templates and settings without calling AWS
    Validate(Target),
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "vpcflow=debug,vpcflow_core=debug,vpcflow_cloud_aws=debug,vpcflow_config=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = cli.settings.as_deref();
    let success = match &cli.command {
        Commands::Validate(target) => commands::validate::handle(target, settings)?,
        Commands::Up(args) => commands::run::handle(Pipeline::Up, args, settings).await?,
        Commands::Deploy(args) => commands::run::handle(Pipeline::Deploy, args, settings).await?,
        Commands::Peer(args) => commands::run::handle(Pipeline::Peer, args, settings).await?,
        Commands::Route(args) => commands::run::handle(Pipeline::Route, args, settings).await?,
    };

    if !success {
        std::process::exit(1);
    }
    Ok(())
}

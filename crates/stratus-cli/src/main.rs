use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(
    name = "stratus",
    about = "Stratus — tenant-scoped cluster and service lifecycle",
    version,
    propagate_version = true,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the resource name and tags a tenant key encodes to (JSON).
    Names {
        /// Project id
        #[arg(short, long)]
        project: String,
        /// Long-lived deployment name, e.g. master
        #[arg(short, long, conflicts_with = "pr", required_unless_present = "pr")]
        deployment: Option<String>,
        /// Pull-request number
        #[arg(long)]
        pr: Option<String>,
        /// Commit sha
        #[arg(long)]
        sha: Option<String>,
    },
    /// Run deploy → describe → decommission of an app definition against
    /// the in-memory provider.
    Simulate {
        /// App definition JSON: {"tasks": [{"family": ..., "containerDefinitions": [...]}]}
        #[arg(short, long)]
        app: PathBuf,
        /// Optional stratus.toml
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long, default_value = "demo")]
        project: String,
        #[arg(long, default_value = "master")]
        deployment: String,
        /// Service name prefix (default: the project id)
        #[arg(long)]
        prefix: Option<String>,
        /// Poll interval in milliseconds, overriding the config
        #[arg(long, default_value = "200")]
        poll_ms: u64,
        /// Leave the simulated resources in place instead of decommissioning
        #[arg(long)]
        keep: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,stratus=debug")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Names {
            project,
            deployment,
            pr,
            sha,
        } => commands::names::print(&project, deployment.as_deref(), pr.as_deref(), sha.as_deref()),
        Commands::Simulate {
            app,
            config,
            project,
            deployment,
            prefix,
            poll_ms,
            keep,
        } => {
            commands::simulate::run(commands::simulate::SimulateArgs {
                app,
                config,
                project,
                deployment,
                prefix,
                poll_ms,
                keep,
            })
            .await
        }
    }
}

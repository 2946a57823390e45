use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use launch_core::configs::launch::CONFIG_FILE;
use tracing_subscriber::EnvFilter;

mod commands;

/// Launch - deploy a branch whenever it is pushed
#[derive(Parser)]
#[command(name = "launch")]
#[command(about = "Git push deployments driven by a post-receive hook")]
#[command(version)]
struct Cli {
    /// Path to the dispatcher configuration
    #[arg(short, long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy one revision of a branch
    Deploy(commands::deploy::DeployArgs),
    /// Read ref updates from stdin and run the matching actions
    PostReceive,
    /// Show the deployment tasks and their prerequisites
    Graph,
    /// Show execution plan for a task without running it
    Plan {
        /// Task to plan
        #[arg(default_value = launch_core::pipeline::DEPLOY_TASK)]
        task: String,
    },
    /// Install the post-receive hook into a repository
    Init {
        /// Path to the bare repository
        repo: PathBuf,
        /// Replace an existing post-receive hook
        #[arg(long)]
        force: bool,
    },
    /// Print the JSON schema of the configuration file
    Schema,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("LAUNCH_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    // Execute command (CLI layer only handles presentation)
    match cli.command {
        Commands::Deploy(args) => commands::deploy::execute(args).await,
        Commands::PostReceive => commands::post_receive::execute(&cli.config).await,
        Commands::Graph => commands::graph::execute(),
        Commands::Plan { task } => commands::plan::execute(&task),
        Commands::Init { repo, force } => commands::init::execute(&repo, &cli.config, force),
        Commands::Schema => commands::schema::execute(),
    }
}

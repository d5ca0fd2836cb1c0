//! shelfctl — runs ShelfGrid deployment strategies from the terminal.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod config;
mod kube;

#[derive(Parser)]
#[command(
    name = "shelfctl",
    about = "ShelfGrid — blue-green, canary, and rolling deployments",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Config file with environments, probe thresholds, and timings.
    #[arg(short, long, default_value = "shelfgrid.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a deployment run and print its history.
    Deploy(commands::deploy::DeployArgs),
    /// Check the config and request without deploying anything.
    Validate(commands::validate::ValidateArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("SHELFGRID_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let code = match cli.command {
        Commands::Deploy(args) => commands::deploy::run(&cli.config, args).await?,
        Commands::Validate(args) => commands::validate::run(&cli.config, args)?,
    };
    std::process::exit(code);
}

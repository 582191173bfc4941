//! Managed cluster import controllers
//!
//! Runs the import status, auto-import and namespace deletion controllers
//! against the hub cluster, and offers a few configuration helpers.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use cluster_import_controller::cli::{
    ConfigSubcommand, display_version, handle_config_command, init_logging,
};
use cluster_import_controller::config::ConfigLoader;
use cluster_import_controller::controller::access::KubeAccessProbe;
use cluster_import_controller::controller::{Context as ControllerContext, Settings, runner};
use cluster_import_controller::hub::{KubeHubClient, create_client};

/// Managed cluster import controllers
#[derive(Parser, Debug)]
#[command(name = "cluster-import-controller")]
#[command(about = "Hub-side controllers for managed cluster import", long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(long, short = 'd')]
    debug: bool,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Configuration file
    #[arg(long, short = 'c', env = "CLUSTER_IMPORT_CONFIG")]
    config: Option<PathBuf>,

    /// Kubeconfig of the hub (defaults to in-cluster or KUBECONFIG)
    #[arg(long)]
    kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use
    #[arg(long)]
    context: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

/// Main commands
#[derive(Subcommand, Debug)]
enum Command {
    /// Run the controllers (default)
    Run,
    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Some(Command::Config { subcommand }) => {
            return handle_config_command(subcommand, args.config.as_deref());
        }
        Some(Command::Version) => {
            display_version();
            return Ok(());
        }
        Some(Command::Run) | None => {}
    }

    let config = ConfigLoader::load(args.config.as_deref()).context("Failed to load configuration")?;
    init_logging(&config.log_level, args.debug, args.log_file.as_deref())?;

    let client = create_client(
        args.kubeconfig.as_deref(),
        args.context.as_deref(),
        config.api_timeout(),
    )
    .await
    .context("Failed to create hub client")?;

    let ctx = Arc::new(ControllerContext::new(
        Arc::new(KubeHubClient::new(client.clone(), config.api_timeout())),
        Arc::new(KubeAccessProbe::new(config.auto_import.probe_timeout())),
        Settings::from(&config),
    ));

    tracing::info!(
        max_retry = config.auto_import.max_retry,
        api_timeout_seconds = config.api_timeout_seconds,
        "Configuration loaded"
    );

    runner::run(client, ctx, &config.controllers).await;
    Ok(())
}

//! bundlegate CLI entry point

use bundlegate::cli::{commands, Cli, Commands};
use bundlegate::config::ConfigManager;
use bundlegate::error::GateResult;
use clap::Parser;
use console::style;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> GateResult<()> {
    let cli = Cli::parse();

    let manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = manager.load().await?;

    // 0 = warn, 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("bundlegate=warn"),
        1 => EnvFilter::new("bundlegate=info"),
        _ => EnvFilter::new("bundlegate=debug"),
    };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if config.general.log_format == "json" {
        subscriber.json().init();
    } else {
        subscriber.without_time().init();
    }
    debug!("Using config {}", manager.path().display());

    ConfigManager::ensure_state_dirs(&config).await?;

    match cli.command {
        Commands::Resolve(args) => commands::resolve(args, &config).await,
        Commands::Get(args) => commands::get(args, &config).await,
        Commands::Cache(args) => commands::cache(args, &config).await,
        Commands::Hashes(args) => commands::hashes(args, &config).await,
        Commands::Status(args) => commands::status(args, &config).await,
        Commands::Config(args) => commands::config(args, &manager, &config).await,
    }
}

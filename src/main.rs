//! offline-worker CLI entry point

use clap::Parser;
use console::style;
use offline_worker::cli::{commands, Cli, Commands};
use offline_worker::config::ConfigManager;
use offline_worker::error::WorkerResult;
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

async fn run() -> WorkerResult<()> {
    let cli = Cli::parse();

    // Completions need neither config nor logging
    if let Commands::Completions { shell } = cli.command {
        commands::completions(shell);
        return Ok(());
    }

    let manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = manager.load().await?;

    init_tracing(cli.verbose, &config.general.log_format);
    debug!("Loaded configuration from {}", manager.path().display());

    match cli.command {
        Commands::Completions { .. } => Ok(()),
        Commands::Inspect(args) => commands::inspect(args).await,
        Commands::Diff(args) => commands::diff(args).await,
        Commands::Install(args) => commands::install(args, &config).await,
        Commands::Activate(args) => commands::activate(args, &config).await,
        Commands::Fetch(args) => commands::fetch(args, &config).await,
        Commands::Status(args) => commands::status(args, &config).await,
        Commands::Config(args) => commands::config(args, &manager, &config).await,
    }
}

/// 0 = warn (spinners only), 1 = info, 2+ = debug
fn init_tracing(verbose: u8, format: &str) {
    let filter = match verbose {
        0 => EnvFilter::new("offline_worker=warn"),
        1 => EnvFilter::new("offline_worker=info"),
        _ => EnvFilter::new("offline_worker=debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if format == "json" {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}

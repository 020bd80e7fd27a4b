//! clf-harness - Main Entry Point

use clap::Parser;
use clf_harness::cli::{cmd_run, cmd_validate, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clf_harness=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { data, params } => cmd_run(&data, &params)?,
        Commands::Validate { params } => cmd_validate(&params)?,
    }

    Ok(())
}

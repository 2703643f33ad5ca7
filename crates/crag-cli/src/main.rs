//! Crag CLI - browse and sync the climbing catalog from the terminal.

mod cli;
mod commands;
mod config_profiles;
mod error;


use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::common::CliContext;
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::delete::run_delete;
use crate::commands::favorite::run_favorite;
use crate::commands::file::run_file;
use crate::commands::list::run_list;
use crate::commands::sync::run_sync;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("crag=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let profile = cli.profile.as_deref();
    let data_dir = cli.data_dir.as_deref();

    match cli.command {
        Commands::Config { command } => run_config(command, profile, data_dir)?,
        Commands::Completions { shell, output } => run_completions(shell, output.as_deref())?,
        command => {
            let ctx = CliContext::resolve(profile, data_dir)?;
            tracing::debug!(
                "Using profile {} with data in {}",
                ctx.profile,
                ctx.data_dir.display()
            );
            match command {
                Commands::Sync { force, retries } => run_sync(&ctx, force, retries).await?,
                Commands::List { kind, parent, json } => {
                    run_list(&ctx, kind, parent, json).await?;
                }
                Commands::Delete { kind, id } => run_delete(&ctx, kind, id).await?,
                Commands::Favorite { command } => run_favorite(&ctx, command).await?,
                Commands::File { command } => run_file(&ctx, command).await?,
                Commands::Config { .. } | Commands::Completions { .. } => {}
            }
        }
    }

    Ok(())
}

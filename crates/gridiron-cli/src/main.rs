// Gridiron command-line entry point.
//
// Startup sequence:
// 1. Parse arguments
// 2. Load config (copying defaults on first run)
// 3. Initialize tracing (log to file; stdout carries JSON output)
// 4. Open database
// 5. Build the draft engine around the shared store
// 6. Dispatch the command and print its JSON result

mod cli;
mod commands;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use gridiron_core::config;
use gridiron_core::draft::DraftEngine;
use gridiron_core::store::SqliteStore;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Parse arguments
    let args = cli::Gridiron::parse();

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;

    // 3. Initialize tracing
    init_tracing(&config.logging.filter)?;
    info!("Gridiron starting: {:?}", args.command);

    // 4. Open database
    let store = Arc::new(
        SqliteStore::open(&config.database.path).context("failed to open database")?,
    );
    info!("Database opened at {}", config.database.path);

    // 5. Build the engine. The store is shared, never re-opened per command.
    let ctx = commands::Context {
        engine: DraftEngine::new(store),
        league_defaults: config.league_defaults.clone(),
        players_file: PathBuf::from(&config.data.players),
    };

    // 6. Dispatch
    match commands::run(&ctx, args.command).await {
        Ok(payload) => {
            println!("{}", serde_json::to_string_pretty(&payload)?);
            Ok(())
        }
        Err(err) => {
            error!("Command failed ({}): {}", err.kind(), err);
            eprintln!("{}", serde_json::to_string_pretty(&commands::error_body(&err))?);
            std::process::exit(commands::exit_code(&err));
        }
    }
}

fn init_tracing(default_filter: &str) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("gridiron.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}

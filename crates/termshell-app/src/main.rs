//! Termshell entry point.

use std::error::Error;
use std::sync::Arc;

use termshell_app::config::{LogFormat, ShellConfig};
use termshell_app::context::{Collaborators, ShellContext};
use termshell_app::npc_directory::NpcDirectory;
use termshell_app::storage::JsonFileStore;
use termshell_app::terminal::{self, TerminalDisplay};
use termshell_core::clock::SystemClock;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = ShellConfig::from_env()?;

    // Logs go to stderr; stdout belongs to the shell.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }

    tracing::info!(storage = %config.storage_path.display(), "starting termshell");

    let store = JsonFileStore::open(&config.storage_path)?;
    let npcs = match &config.npc_file {
        Some(path) => NpcDirectory::from_path(path)?,
        None => NpcDirectory::builtin()?,
    };
    tracing::info!(npcs = ?npcs.ids(), "npc roster loaded");

    let context = ShellContext::build(
        config,
        Collaborators {
            store: Arc::new(store),
            producer: Arc::new(npcs),
            display: Arc::new(TerminalDisplay::stdout()),
            clock: Arc::new(SystemClock),
        },
    )?;

    context.boot().await?;
    terminal::run_repl(&context, BufReader::new(tokio::io::stdin())).await?;

    tracing::info!("termshell stopped");
    Ok(())
}

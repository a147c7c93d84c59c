//! # Orinda (`orinda`)
//!
//! Starts an interactive chat session against a local Ollama server.
//!
//! ```bash
//! orinda --config ./config/orinda.toml
//! ```
//!
//! Type a message to chat, or `/help` for the command list.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use orinda::config;
use orinda::context::AppContext;
use orinda::logging;
use orinda::session::Session;

/// Local chat and document Q&A over an Ollama server.
///
/// Settings are read from a TOML file; a missing file means defaults.
/// See `config/orinda.example.toml`.
#[derive(Parser)]
#[command(name = "orinda", version, about)]
struct Cli {
    /// Path to configuration file
    #[arg(long, global = true, default_value = "./config/orinda.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = config::load_config(&cli.config)
        .with_context(|| format!("Invalid configuration in {}", cli.config.display()))?;
    logging::init(&cfg.logging);

    let ctx = Arc::new(AppContext::open(cfg).await?);
    let interactive = atty::is(atty::Stream::Stdin);

    let mut session = Session::new(ctx, std::io::stdout())?.interactive(interactive);
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    session.run(stdin).await?;

    tracing::info!("session ended");
    Ok(())
}

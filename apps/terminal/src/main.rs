mod app;
mod commands;
mod render;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{load_settings, ChatClient};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "chattify", about = "Terminal client for Chattify direct messages")]
struct Args {
    /// TOML settings file; defaults to ./chattify.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    api_url: Option<String>,
    #[arg(long)]
    socket_url: Option<String>,
    /// Log filter, e.g. `client_core=debug`. Falls back to RUST_LOG, then `warn`.
    #[arg(long)]
    log: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = match args.log.as_deref() {
        Some(directives) => EnvFilter::try_new(directives)
            .with_context(|| format!("invalid --log filter '{directives}'"))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut settings = load_settings(args.config.as_deref()).context("failed to load settings")?;
    if let Some(api_url) = args.api_url {
        settings.api_base_url = api_url;
    }
    if let Some(socket_url) = args.socket_url {
        settings.socket_url = socket_url;
    }
    let settings = settings.validated()?;
    tracing::info!(
        api_base_url = %settings.api_base_url,
        socket_url = %settings.socket_url,
        "chattify starting"
    );

    let client = ChatClient::new(&settings)?;
    app::App::new(client).run().await
}

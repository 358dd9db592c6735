#![warn(clippy::all, clippy::pedantic)]

use anyhow::Result;
use camel::{Cli, Config};
use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

fn log_level() -> Level {
    std::env::var("CAMEL_LOG")
        .ok()
        .and_then(|raw| raw.trim().parse::<Level>().ok())
        .unwrap_or(Level::INFO)
}

#[tokio::main]
async fn main() -> Result<()> {
    // reqwest is built with rustls but no provider feature; pick ring explicitly.
    if let Err(e) = rustls::crypto::ring::default_provider().install_default() {
        eprintln!("Warning: Failed to install default crypto provider: {e:?}");
    }

    // Logs go to stderr so they never interleave with streamed replies.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level())
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Warning: Failed to install log subscriber: {e}");
    }

    let cli = Cli::parse();
    let config = Config::load_or_init(cli.config.as_deref())?;
    camel::app::dispatch(cli, config).await
}

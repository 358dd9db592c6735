use super::repl::{ChatOptions, run_chat};
use super::status::print_status;
use super::style as ui;
use crate::cli::{Cli, Commands};
use crate::config::Config;
use crate::llm::BackendSwitchManager;
use crate::platform::{coordinator, dashboard, guardian};
use anyhow::Result;
use tracing::info;

/// `camel backends`: probe every profile in order.
async fn list_backends(config: &Config) -> Result<()> {
    let backends = BackendSwitchManager::from_config(config)?;
    let active = backends.active();
    for profile in backends.profiles() {
        let reachable = backends.connector_for(profile).health_check().await;
        let marker = if profile.name == active.name { "*" } else { " " };
        let state = match &reachable {
            Ok(()) => ui::success("reachable"),
            Err(error) => ui::error(format!("unreachable: {error}")),
        };
        println!(
            "{} {:<12} {:<6} {:<24} {} {state}",
            ui::accent(marker),
            profile.name,
            profile.api.to_string(),
            profile.model,
            ui::dim(&profile.endpoint),
        );
    }
    Ok(())
}

pub async fn dispatch(cli: Cli, config: Config) -> Result<()> {
    match cli.command_or_default() {
        Commands::Chat {
            backend,
            model,
            message,
        } => {
            run_chat(
                config,
                ChatOptions {
                    backend,
                    model,
                    message,
                },
            )
            .await
        }

        Commands::Guardian => guardian::run(&config).await,

        Commands::Coordinator => coordinator::run(config).await,

        Commands::Dashboard { host, port } => {
            let host = host.unwrap_or_else(|| config.dashboard.host.clone());
            let port = port.unwrap_or(config.dashboard.port);
            info!("Starting Camel dashboard API on {host}:{port}");
            dashboard::run(&config, &host, port).await
        }

        Commands::Status => print_status(&config).await,

        Commands::Backends => list_backends(&config).await,
    }
}

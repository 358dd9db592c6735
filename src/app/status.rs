use crate::config::Config;
use crate::platform::guardian::{GuardianStatus, read_state_file};
use crate::status::{StatusSnapshot, read_snapshot};
use anyhow::Result;

pub fn render_status(
    config: &Config,
    snapshot: Option<&StatusSnapshot>,
    guardian: Option<&GuardianStatus>,
) -> String {
    let active = config
        .initial_backend()
        .map_or_else(|| "(none)".to_string(), |b| format!("{} ({})", b.name, b.model));
    let mut lines = vec![
        "◆ Camel status".to_string(),
        String::new(),
        format!("Version     {}", env!("CARGO_PKG_VERSION")),
        format!("Workspace   {}", config.workspace_dir.display()),
        format!("Config      {}", config.config_path.display()),
        format!("Backend     {active}"),
        format!("Turn budget {}", config.agent.effective_turn_budget()),
        String::new(),
    ];

    match snapshot {
        Some(snapshot) => lines.push(format!("Progress    {}", snapshot.summary())),
        None => lines.push(format!(
            "Progress    no snapshot at {}",
            config.status_path().display()
        )),
    }

    match guardian {
        Some(status) if !status.processes.is_empty() => {
            lines.push(format!("Guardian    written {}", status.written_at.to_rfc3339()));
            for process in &status.processes {
                let started = process
                    .last_started_at
                    .map_or_else(|| "never".to_string(), |t| t.to_rfc3339());
                lines.push(format!(
                    "  {:<14} {:<9} failures {}/{}  started {started}",
                    process.name,
                    process.state.to_string(),
                    process.consecutive_failures,
                    process.restart.max_retries,
                ));
            }
        }
        Some(_) => lines.push("Guardian    no processes".to_string()),
        None => lines.push("Guardian    not running".to_string()),
    }

    lines.join("\n")
}

/// `camel status`
pub async fn print_status(config: &Config) -> Result<()> {
    let snapshot = read_snapshot(&config.status_path()).await.ok();
    let guardian = read_state_file(&config.resolve_path(&config.guardian.state_file))
        .await
        .ok();
    println!("{}", render_status(config, snapshot.as_ref(), guardian.as_ref()));
    Ok(())
}

use super::clipboard::copy_text;
use super::input::{HELP, ReplInput, parse_input};
use super::style as ui;
use crate::agent::{AgentSession, ExchangeReport, TurnOutcome};
use crate::config::Config;
use crate::llm::{BackendSwitchManager, CliStreamSink};
use crate::status::{StatusFeed, StatusFileWatcher, StatusReader, StatusSnapshot};
use crate::tools::{ToolContext, default_registry, run_shell};
use anyhow::{Result, bail};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

const STATUS_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Startup options from `camel chat`.
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    pub backend: Option<String>,
    pub model: Option<String>,
    pub message: Option<String>,
}

struct Repl {
    session: AgentSession,
    status: StatusReader,
    shell_mode: bool,
}

/// Build the session, check reachability, then run one message or the REPL.
pub async fn run_chat(config: Config, options: ChatOptions) -> Result<()> {
    let cancel = CancellationToken::new();
    let (publisher, reader) = StatusFeed::new(StatusSnapshot::default());
    let watcher = StatusFileWatcher::new(config.status_path(), STATUS_POLL_INTERVAL);
    watcher.poll_once(&publisher).await;
    let poller = watcher.spawn(publisher, cancel.child_token());

    let registry = default_registry(&config, reader.clone())?;
    if registry.is_empty() {
        bail!("no tools registered");
    }

    let backends = BackendSwitchManager::from_config(&config)?;
    if let Some(name) = &options.backend {
        backends.switch_to(name)?;
    }
    if let Some(model) = &options.model {
        backends.set_model(model);
    }
    let active = backends.activate_first_reachable().await?;
    tracing::info!(backend = active.name, model = active.model, "backend ready");

    let session = AgentSession::from_config(
        &config,
        Arc::new(registry),
        Arc::new(backends),
        Arc::new(CliStreamSink::new()),
    );
    let mut repl = Repl {
        session,
        status: reader,
        shell_mode: false,
    };

    let result = match options.message {
        Some(message) => repl.single(&message).await,
        None => repl.interactive().await,
    };
    cancel.cancel();
    let _ = poller.await;
    result
}

impl Repl {
    async fn single(&mut self, message: &str) -> Result<()> {
        let report = self.submit(message).await;
        if let TurnOutcome::ConnectionFailed { detail } = report.outcome {
            bail!("backend request failed: {detail}");
        }
        Ok(())
    }

    async fn interactive(&mut self) -> Result<()> {
        self.banner();
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            self.prompt();
            let line = tokio::select! {
                line = lines.next_line() => line?,
                _ = tokio::signal::ctrl_c() => {
                    println!();
                    break;
                }
            };
            let Some(line) = line else {
                println!();
                break;
            };
            if !self.handle(parse_input(&line, self.shell_mode)).await {
                break;
            }
        }
        println!("{}", ui::dim("Bye."));
        Ok(())
    }

    /// Returns `false` to leave the REPL.
    async fn handle(&mut self, input: ReplInput) -> bool {
        match input {
            ReplInput::Empty => {}
            ReplInput::Message(text) => {
                self.submit(&text).await;
            }
            ReplInput::Backend(None) => self.list_backends(),
            ReplInput::Backend(Some(name)) => match self.session.switch_backend(&name) {
                Ok(profile) => println!(
                    "{} {} ({})",
                    ui::success("Backend:"),
                    profile.name,
                    profile.model
                ),
                Err(error) => println!("{}", ui::error(error)),
            },
            ReplInput::Model(None) => self.list_models().await,
            ReplInput::Model(Some(model)) => match self.session.switch_model(&model) {
                Ok(profile) => println!("{} {}", ui::success("Model:"), profile.model),
                Err(error) => println!("{}", ui::error(error)),
            },
            ReplInput::Copy => match self.session.conversation().last_assistant_text() {
                Some(text) => {
                    let text = text.to_string();
                    self.copy(&text).await;
                }
                None => println!("{}", ui::dim("Nothing to copy yet.")),
            },
            ReplInput::CopyAll => {
                let transcript = self.session.conversation().transcript();
                if transcript.is_empty() {
                    println!("{}", ui::dim("Nothing to copy yet."));
                } else {
                    self.copy(&transcript).await;
                }
            }
            ReplInput::ToggleShell => {
                self.shell_mode = !self.shell_mode;
                if self.shell_mode {
                    println!("{}", ui::dim("Shell pane on: lines run as shell commands, /shell to return."));
                } else {
                    println!("{}", ui::dim("Shell pane off."));
                }
            }
            ReplInput::Shell(command) => self.shell(&command).await,
            ReplInput::Retry => {
                match self.session.last_failed_input().map(str::to_string) {
                    Some(input) => {
                        self.submit(&input).await;
                    }
                    None => println!("{}", ui::dim("Nothing to retry.")),
                }
            }
            ReplInput::Clear => {
                self.session.clear();
                println!("{}", ui::dim("Conversation cleared."));
            }
            ReplInput::Status => self.print_status(),
            ReplInput::Tools => {
                for spec in self.session.agent().registry().specs() {
                    println!("  {} {}", ui::accent(&spec.name), ui::dim(&spec.description));
                }
            }
            ReplInput::Help => println!("{HELP}"),
            ReplInput::Quit => return false,
            ReplInput::Unknown(command) => {
                println!("{} {command} (try /help)", ui::warn("Unknown command:"));
            }
        }
        true
    }

    /// Run one exchange with Ctrl-C wired to abort it. `/retry` comes
    /// through here too, resubmitting the last failed input.
    async fn submit(&mut self, text: &str) -> ExchangeReport {
        let interrupt = self.session.handle().abort_on(tokio::signal::ctrl_c());
        println!("{}", ui::header("Camel:"));
        let report = self.session.submit(text).await;
        interrupt.abort();
        self.render(&report);
        report
    }

    fn render(&self, report: &ExchangeReport) {
        println!();
        match &report.outcome {
            TurnOutcome::Completed { .. } => {
                if report.tool_calls > 0 {
                    println!(
                        "{}",
                        ui::dim(format!(
                            "({} tool call(s), {} round(s))",
                            report.tool_calls, report.rounds
                        ))
                    );
                }
            }
            TurnOutcome::Truncated { text } => println!("{}", ui::warn(text)),
            TurnOutcome::ConnectionFailed { detail } => {
                println!("{} {detail}", ui::error("Connection error:"));
                println!("{}", ui::dim("/retry to resend, /backend to switch."));
            }
            TurnOutcome::Cancelled { reason } => println!("{}", ui::dim(format!("[{reason}]"))),
        }
    }

    fn list_backends(&self) {
        let active = self.session.active_profile();
        for profile in self.session.backends().profiles() {
            let marker = if profile.name == active.name { "*" } else { " " };
            let model = if profile.name == active.name {
                &active.model
            } else {
                &profile.model
            };
            println!(
                "{} {} {} {}",
                ui::accent(marker),
                profile.name,
                ui::dim(model),
                ui::dim(&profile.endpoint)
            );
        }
    }

    async fn list_models(&self) {
        let active = self.session.active_profile();
        match self.session.backends().connector_for(&active).list_models().await {
            Ok(models) if models.is_empty() => println!("{}", ui::dim("No models reported.")),
            Ok(models) => {
                for model in models {
                    let marker = if model == active.model { "*" } else { " " };
                    println!("{} {model}", ui::accent(marker));
                }
            }
            Err(error) => println!("{} {error:#}", ui::error("Cannot list models:")),
        }
    }

    async fn copy(&self, text: &str) {
        match copy_text(text).await {
            Ok(target) => println!("{} {target}", ui::success("Copied to")),
            Err(error) => println!("{} {error:#}", ui::error("Copy failed:")),
        }
    }

    async fn shell(&self, command: &str) {
        let ctx = ToolContext::new(self.session.workspace_dir());
        match run_shell(command, &ctx).await {
            Ok(output) => {
                print!("{}", output.stdout);
                if !output.stderr.is_empty() {
                    eprint!("{}", output.stderr);
                }
                if output.exit_code != Some(0) {
                    println!(
                        "{}",
                        ui::dim(output.exit_code.map_or_else(
                            || "[killed by signal]".to_string(),
                            |code| format!("[exit {code}]")
                        ))
                    );
                }
            }
            Err(error) => println!("{} {error:#}", ui::error("Shell:")),
        }
    }

    fn print_status(&self) {
        let profile = self.session.active_profile();
        println!("Backend     {} ({})", profile.name, profile.model);
        println!("Loop state  {}", self.session.agent().state());
        println!("Turns       {}", self.session.conversation().len());
        println!("Workspace   {}", self.session.workspace_dir().display());
        println!("Shell pane  {}", if self.shell_mode { "on" } else { "off" });
        println!("Progress    {}", self.status.latest().summary());
    }

    fn banner(&self) {
        let profile = self.session.active_profile();
        println!(
            "{} {} {}",
            ui::accent("◆"),
            ui::header("Camel"),
            ui::dim(format!("· {} ({}) · {}", profile.name, profile.model, self.session.workspace_dir().display()))
        );
        println!("{}", ui::dim("/help for commands, /quit to exit"));
    }

    fn prompt(&self) {
        let marker = if self.shell_mode { "$" } else { ">" };
        print!("{} ", ui::accent(marker));
        let _ = std::io::stdout().flush();
    }
}

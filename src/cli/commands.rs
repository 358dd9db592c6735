use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// `camel` - terminal coding agent with local tools and a self-healing guardian.
#[derive(Parser, Debug)]
#[command(name = "camel")]
#[command(version)]
#[command(about = "A terminal agent runtime for local and remote language models.", long_about = None)]
pub struct Cli {
    /// Path to config.toml (default: ~/.camel/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Chat with the agent (default)
    Chat {
        /// Backend profile to start with
        #[arg(short, long)]
        backend: Option<String>,

        /// Model to use on the starting profile
        #[arg(long)]
        model: Option<String>,

        /// Single message mode (don't enter interactive mode)
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Run the process guardian until Ctrl-C
    Guardian,

    /// Run the autonomous-development coordinator
    Coordinator,

    /// Serve the dashboard status API
    Dashboard {
        /// Host to bind to (default: [dashboard].host)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (default: [dashboard].port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show progress snapshot and guardian state
    Status,

    /// List backend profiles and their reachability
    Backends,
}

impl Cli {
    /// The chosen command, defaulting to interactive chat.
    pub fn command_or_default(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Chat {
            backend: None,
            model: None,
            message: None,
        })
    }
}

//! pairlink CLI
//!
//! Inspect pairing tokens and run a host/guest handshake demo over the
//! in-process loopback transport.

use std::io;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;

use pairlink_cli::{demo_cmd, inspect_cmd};
use pairlink_core::config::load_config;
use pairlink_core::tracing_init::init_tracing;

#[derive(Parser, Debug)]
#[command(name = "pairlink")]
#[command(version, about = "Serverless peer pairing over copy-pasted tokens", long_about = None)]
struct Cli {
    /// Config file layered over the global settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level for pairlink crates (overrides config)
    #[arg(long, global = true, env = "PAIRLINK_LOG_LEVEL")]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode a token or invite link and describe it.
    Inspect {
        /// Token, invite link, or legacy JSON payload.
        token: String,
    },
    /// Pair two in-process peers and exchange messages.
    Demo {
        /// Message the host sends; repeat for more.
        #[arg(short, long = "message", default_value = "hello")]
        messages: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        config.log.level = level;
    }
    if cli.log_json {
        config.log.json = true;
    }
    init_tracing(&config.log);
    info!(version = env!("CARGO_PKG_VERSION"), "Starting pairlink CLI");

    let mut out = io::stdout();
    match cli.command {
        Command::Inspect { token } => inspect_cmd::run(&token, &mut out),
        Command::Demo { messages } => demo_cmd::run(&config, &messages, &mut out).await,
    }
}

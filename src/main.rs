mod command;

use clap::{Parser, Subcommand};
use smarthome_shared::config::LedgerArgs;
use smarthome_shared::{DeviceDirectory, RpcLedger};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Control the smart home lights through the on-chain AI agent
#[derive(Debug, Parser)]
#[command(name = "smarthome-client", version)]
struct Cli {
    #[command(flatten)]
    ledger: LedgerArgs,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Send a prompt to the agent and wait for its answer
    Ask {
        /// e.g. "turn on the workspace light"
        #[arg(required = true, num_args = 1..)]
        prompt: Vec<String>,
    },
    /// Show the on/off state of every light
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; everything has a flag or a default
    let _ = dotenvy::dotenv();

    // Logs go to stderr so stdout only carries answers
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();

    let directory = match &cli.ledger.devices {
        Some(path) => DeviceDirectory::load(path)?,
        None => DeviceDirectory::default(),
    };
    info!("{} lights in directory", directory.len());

    let ledger = RpcLedger::new(&cli.ledger.ledger_config())?;
    if let Err(e) = ledger.check_chain_id(cli.ledger.chain_id).await {
        warn!("Could not verify chain id: {}", e);
    }

    match cli.command {
        Commands::Ask { prompt } => {
            command::ask(
                &ledger,
                &directory,
                cli.ledger.poll_policy(),
                &prompt.join(" "),
                cli.json,
            )
            .await
        }
        Commands::Status => command::status(&ledger, &directory, cli.json).await,
    }
}

mod bot;
mod connection;
#[cfg(test)]
mod fake;

use bot::Bot;
use clap::Parser;
use smarthome_shared::config::LedgerArgs;
use smarthome_shared::{cancellation, DeviceDirectory, RpcLedger};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// How long open connections get to deliver their last reply on shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Chat bot relaying messages to the smart home AI agent
#[derive(Debug, Parser)]
#[command(name = "smarthome-bot", version)]
struct Args {
    #[command(flatten)]
    ledger: LedgerArgs,

    /// Address to accept message connections on
    #[arg(long, env = "SMARTHOME_BOT_LISTEN", default_value = "0.0.0.0:8080")]
    listen: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let args = Args::parse();

    let directory = match &args.ledger.devices {
        Some(path) => DeviceDirectory::load(path)?,
        None => DeviceDirectory::default(),
    };

    let ledger = RpcLedger::new(&args.ledger.ledger_config())?;
    if let Err(e) = ledger.check_chain_id(args.ledger.chain_id).await {
        warn!("Could not verify chain id: {}", e);
    }
    if args.ledger.sender.is_none() {
        warn!("No sender account configured; every command will fail to submit");
    }

    let (cancel_handle, cancel) = cancellation();
    let bot = Arc::new(Bot::new(
        ledger,
        directory,
        args.ledger.poll_policy(),
        cancel.clone(),
    ));

    let listener = TcpListener::bind(&args.listen).await?;
    info!("Bot listening on {}", args.listen);

    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (socket, addr) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        error!("Accept failed: {}", e);
                        continue;
                    }
                };
                info!("Connection from: {}", addr);

                let bot = bot.clone();
                let cancel = cancel.clone();
                connections.spawn(async move {
                    if let Err(e) = connection::serve(socket, bot, cancel).await {
                        warn!("Connection {} closed with error: {}", addr, e);
                    }
                    info!("Client disconnected: {}", addr);
                });
            }
            // Reap finished connections so the set does not grow forever
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down, cancelling in-flight commands");
                cancel_handle.cancel();
                break;
            }
        }
    }

    let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
        while connections.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        warn!("{} connections did not close in time", connections.len());
    }

    Ok(())
}

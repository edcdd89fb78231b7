//! `ask` subcommand

use super::status::print_snapshot;
use anyhow::bail;
use serde_json::json;
use smarthome_shared::{
    cancellation, snapshot, Command, CommandSession, DeviceDirectory, PollPolicy, RpcLedger,
    SessionEvent, SessionState,
};
use tokio::sync::mpsc;
use tracing::warn;

/// Send `prompt` to the agent, print the decoded answer, then the lights
pub async fn ask(
    ledger: &RpcLedger,
    directory: &DeviceDirectory,
    policy: PollPolicy,
    prompt: &str,
    json: bool,
) -> anyhow::Result<()> {
    let command = Command::new(prompt);
    if command.is_blank() {
        bail!("Please enter some prompt!");
    }

    // Ctrl-C stops waiting for the agent instead of killing the process
    let (cancel_handle, cancel) = cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_handle.cancel();
        }
    });

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let progress = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            if !json {
                if let SessionEvent::StateChanged {
                    to: SessionState::AwaitingReceipt,
                    ..
                } = event
                {
                    println!("Processing...");
                }
            }
        }
    });

    let report = CommandSession::new(command, ledger, directory)
        .with_policy(policy)
        .with_cancel(cancel)
        .with_events(events_tx)
        .run()
        .await;
    // The session dropped its sender, so this drains and ends
    let _ = progress.await;

    let tx = report
        .submission
        .as_ref()
        .map(|submission| submission.handle.to_string());

    let action = match report.outcome {
        Ok(action) => action,
        Err(e) => {
            if json {
                println!(
                    "{}",
                    json!({ "tx": tx, "run_id": report.run_id, "error": e.user_message(), "detail": e.to_string() })
                );
            } else {
                println!("{}", e.user_message());
            }
            return Err(e.into());
        }
    };

    if json {
        println!("{}", json!({ "tx": tx, "run_id": report.run_id, "action": action }));
    } else {
        println!("{}", action);
    }

    // The answer may have toggled a light; show the fresh state
    match snapshot(&directory.device_ids(), ledger).await {
        Ok(lights) => print_snapshot(directory, &lights, json),
        Err(e) => warn!("Could not refresh light status: {}", e),
    }

    Ok(())
}

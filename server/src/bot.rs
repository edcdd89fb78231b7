//! Chat bot reply logic
//!
//! Every incoming message is either the status query, a blank greeting or a
//! command for the agent. Commands run through a full [`CommandSession`];
//! a command that switched a light also refreshes the shared status board.

use smarthome_shared::{
    AgentLedger, CancelSignal, Command, CommandSession, DeviceDirectory, LightRegistry,
    PollPolicy, StatusBoard,
};
use tracing::{info, warn};

pub const WELCOME: &str = "Welcome! Please type any prompt you want to do with your smart home. \
Here are some examples:\n\n- Turn on workspace light\n- Give me light status";

const STATUS_COMMAND: &str = "/status";

/// Reply when no light status was ever read successfully
pub const STATUS_UNAVAILABLE: &str = "ERROR: Could not read light status";

pub struct Bot<L> {
    ledger: L,
    directory: DeviceDirectory,
    policy: PollPolicy,
    cancel: CancelSignal,
    board: StatusBoard,
}

impl<L: AgentLedger + LightRegistry> Bot<L> {
    pub fn new(ledger: L, directory: DeviceDirectory, policy: PollPolicy, cancel: CancelSignal) -> Self {
        Self {
            ledger,
            directory,
            policy,
            cancel,
            board: StatusBoard::new(),
        }
    }

    #[cfg(test)]
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Produce the reply for one chat message
    pub async fn reply(&self, text: &str) -> String {
        let command = Command::new(text.trim());

        if command.is_blank() {
            return WELCOME.to_string();
        }

        if command.text.eq_ignore_ascii_case(STATUS_COMMAND) {
            return self.status().await;
        }

        info!("Handling command: {}", command.text);

        let outcome = CommandSession::new(command, &self.ledger, &self.directory)
            .with_policy(self.policy)
            .with_cancel(self.cancel.clone())
            .execute()
            .await;

        match outcome {
            Ok(action) => {
                if action.device().is_some() {
                    // The reply does not depend on the refresh; failures are logged there
                    let _ = self.board.refresh(&self.directory, &self.ledger).await;
                }
                action.to_string()
            }
            Err(e) => {
                warn!("Command failed: {}", e);
                e.user_message().to_string()
            }
        }
    }

    async fn status(&self) -> String {
        let snapshot = match self.board.refresh(&self.directory, &self.ledger).await {
            Ok(snapshot) => snapshot,
            Err(_) => {
                let last = self.board.current().await;
                if last.is_empty() {
                    return STATUS_UNAVAILABLE.to_string();
                }
                last
            }
        };
        format!("Light Status\n{}", snapshot.render(&self.directory))
    }
}

//! Ledger connection settings

use crate::poller::PollPolicy;
use crate::protocol;
use std::time::Duration;

/// Where the agent and registry live and how to talk to them
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// JSON-RPC endpoint
    pub rpc_url: String,
    /// Expected chain id, checked at start-up
    pub chain_id: u64,
    /// Agent contract receiving commands
    pub agent_address: String,
    /// Registry contract holding light states
    pub registry_address: String,
    /// Node-managed account that signs submissions
    pub sender_address: Option<String>,
    /// Timeout of a single RPC request
    pub request_timeout: Duration,
    /// Delay between two receipt lookups
    pub receipt_poll_interval: Duration,
    /// Give up on a receipt after this long
    pub receipt_timeout: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            rpc_url: protocol::DEFAULT_RPC_URL.into(),
            chain_id: protocol::DEFAULT_CHAIN_ID,
            agent_address: protocol::DEFAULT_AGENT_ADDRESS.into(),
            registry_address: protocol::DEFAULT_REGISTRY_ADDRESS.into(),
            sender_address: None,
            request_timeout: Duration::from_secs(10),
            receipt_poll_interval: Duration::from_secs(1),
            receipt_timeout: Duration::from_secs(60),
        }
    }
}

#[cfg(feature = "cli")]
pub use cli::LedgerArgs;

#[cfg(feature = "cli")]
mod cli {
    use super::*;
    use std::path::PathBuf;

    /// Command-line and environment overrides shared by both front-ends
    #[derive(Debug, Clone, clap::Args)]
    pub struct LedgerArgs {
        /// JSON-RPC endpoint of the node
        #[arg(long, env = "SMARTHOME_RPC_URL", default_value = protocol::DEFAULT_RPC_URL)]
        pub rpc_url: String,

        /// Expected chain id
        #[arg(long, env = "SMARTHOME_CHAIN_ID", default_value_t = protocol::DEFAULT_CHAIN_ID)]
        pub chain_id: u64,

        /// Agent contract address
        #[arg(long, env = "SMARTHOME_AGENT", default_value = protocol::DEFAULT_AGENT_ADDRESS)]
        pub agent: String,

        /// Light registry contract address
        #[arg(long, env = "SMARTHOME_REGISTRY", default_value = protocol::DEFAULT_REGISTRY_ADDRESS)]
        pub registry: String,

        /// Account the node signs submissions with
        #[arg(long, env = "SMARTHOME_SENDER")]
        pub sender: Option<String>,

        /// JSON device directory; the built-in one is used when absent
        #[arg(long, env = "SMARTHOME_DEVICES")]
        pub devices: Option<PathBuf>,

        /// Delay between two response reads, in milliseconds
        #[arg(long, env = "SMARTHOME_POLL_INTERVAL_MS", default_value_t = protocol::POLL_INTERVAL.as_millis() as u64)]
        pub poll_interval_ms: u64,

        /// Give up waiting for a response after this many seconds
        #[arg(long, env = "SMARTHOME_POLL_MAX_WAIT_SECS", default_value_t = protocol::POLL_MAX_WAIT.as_secs())]
        pub poll_max_wait_secs: u64,

        /// Give up waiting for a response after this many reads
        #[arg(long, env = "SMARTHOME_POLL_MAX_ATTEMPTS", value_parser = clap::value_parser!(u32).range(1..))]
        pub poll_max_attempts: Option<u32>,
    }

    impl LedgerArgs {
        pub fn ledger_config(&self) -> LedgerConfig {
            LedgerConfig {
                rpc_url: self.rpc_url.clone(),
                chain_id: self.chain_id,
                agent_address: self.agent.clone(),
                registry_address: self.registry.clone(),
                sender_address: self.sender.clone(),
                ..Default::default()
            }
        }

        pub fn poll_policy(&self) -> PollPolicy {
            PollPolicy {
                interval: Duration::from_millis(self.poll_interval_ms),
                max_attempts: self.poll_max_attempts,
                max_wait: Some(Duration::from_secs(self.poll_max_wait_secs)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_targets_devnet() {
        let config = LedgerConfig::default();
        assert_eq!(config.chain_id, 696969);
        assert_eq!(config.rpc_url, "https://devnet.galadriel.com");
        assert!(config.sender_address.is_none());
    }

    #[cfg(feature = "cli")]
    #[test]
    fn test_args_reject_zero_attempts() {
        use clap::Parser;

        #[derive(Debug, Parser)]
        struct Cli {
            #[command(flatten)]
            ledger: LedgerArgs,
        }

        assert!(Cli::try_parse_from(["smarthome", "--poll-max-attempts", "0"]).is_err());

        let cli = Cli::try_parse_from(["smarthome", "--poll-max-attempts", "3"]).unwrap();
        assert_eq!(cli.ledger.poll_policy().max_attempts, Some(3));
    }

    #[test]
    fn test_default_poll_policy_is_bounded() {
        let policy = PollPolicy::default();
        assert_eq!(policy.interval, Duration::from_millis(500));
        assert!(policy.max_wait.is_some());
    }
}

//! Agent and registry contracts reached through a JSON-RPC node

use super::abi;
use super::client::RpcClient;
use crate::address::Address;
use crate::config::LedgerConfig;
use crate::correlator::{Event, Receipt, ReceiptStatus};
use crate::ledger::{
    AgentLedger, LedgerError, LightRegistry, RawResult, ResponseSource, SubmissionHandle,
};
use crate::protocol;
use crate::run_id::RunId;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
struct RawLog {
    #[serde(default)]
    topics: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawReceipt {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    logs: Vec<RawLog>,
}

impl RawReceipt {
    /// Anonymous logs (no topics) can never carry the correlation event
    fn into_receipt(self) -> Receipt {
        let status = match self.status.as_deref() {
            Some("0x1") => ReceiptStatus::Success,
            _ => ReceiptStatus::Failure,
        };

        let events = self
            .logs
            .into_iter()
            .filter_map(|log| {
                let mut topics = log.topics.into_iter().map(|t| t.to_ascii_lowercase());
                let topic = topics.next()?;
                Some(Event::new(topic, topics.collect()))
            })
            .collect();

        Receipt { status, events }
    }
}

fn hex_data(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

fn parse_hex_data(value: &str) -> Result<Vec<u8>, LedgerError> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(digits).map_err(|e| LedgerError::Malformed(format!("bad hex data {value:?}: {e}")))
}

fn parse_quantity(value: &str) -> Result<u64, LedgerError> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    u64::from_str_radix(digits, 16)
        .map_err(|e| LedgerError::Malformed(format!("bad quantity {value:?}: {e}")))
}

fn light_from_call_result(result: Value) -> Result<bool, LedgerError> {
    let data: String = serde_json::from_value(result)?;
    Ok(abi::decode_light(&parse_hex_data(&data)?)?.is_on)
}

/// Agent contract and light registry on an Ethereum-compatible node
pub struct RpcLedger {
    rpc: RpcClient,
    agent: Address,
    registry: Address,
    sender: Option<Address>,
    receipt_poll_interval: Duration,
    receipt_timeout: Duration,
}

impl RpcLedger {
    pub fn new(config: &LedgerConfig) -> Result<Self, LedgerError> {
        let sender = match &config.sender_address {
            Some(s) => Some(s.parse::<Address>()?),
            None => None,
        };

        Ok(Self {
            rpc: RpcClient::new(config.rpc_url.clone(), config.request_timeout)?,
            agent: config.agent_address.parse()?,
            registry: config.registry_address.parse()?,
            sender,
            receipt_poll_interval: config.receipt_poll_interval,
            receipt_timeout: config.receipt_timeout,
        })
    }

    /// Compare the node's chain id with the expected one; a mismatch is only
    /// logged since devnets get re-created under new ids
    pub async fn check_chain_id(&self, expected: u64) -> Result<u64, LedgerError> {
        let raw: String = self.rpc.call("eth_chainId", json!([])).await?;
        let actual = parse_quantity(&raw)?;
        if actual == expected {
            info!("Connected to chain {} at {}", actual, self.rpc.url());
        } else {
            warn!(
                "Node at {} reports chain {}, expected {}",
                self.rpc.url(),
                actual,
                expected
            );
        }
        Ok(actual)
    }

    async fn eth_call(&self, to: &Address, data: &[u8]) -> Result<Vec<u8>, LedgerError> {
        let params = json!([{ "to": to.to_string(), "data": hex_data(data) }, "latest"]);
        let result: String = self.rpc.call("eth_call", params).await?;
        parse_hex_data(&result)
    }
}

#[async_trait]
impl ResponseSource for RpcLedger {
    async fn read_response(&self, run_id: &RunId) -> Result<RawResult, LedgerError> {
        let call = abi::encode_word_call(protocol::MESSAGE_RESPONSE_SELECTOR, &run_id.to_word()?);
        let data = self.eth_call(&self.agent, &call).await?;
        Ok(RawResult::from_stored(abi::decode_string(&data)?))
    }
}

#[async_trait]
impl AgentLedger for RpcLedger {
    async fn submit(&self, command_text: &str) -> Result<SubmissionHandle, LedgerError> {
        let sender = self.sender.ok_or(LedgerError::NoSender)?;
        let call = abi::encode_string_call(protocol::SEND_MESSAGE_SELECTOR, command_text);
        let params = json!([{
            "from": sender.to_string(),
            "to": self.agent.to_string(),
            "data": hex_data(&call),
        }]);

        let hash: String = self.rpc.call("eth_sendTransaction", params).await?;
        debug!("Transaction {} sent to agent {}", hash, self.agent);
        Ok(SubmissionHandle::new(hash))
    }

    async fn await_receipt(&self, handle: &SubmissionHandle) -> Result<Receipt, LedgerError> {
        let deadline = Instant::now() + self.receipt_timeout;

        loop {
            let receipt: Option<RawReceipt> = self
                .rpc
                .call("eth_getTransactionReceipt", json!([handle.as_str()]))
                .await?;

            if let Some(raw) = receipt {
                return Ok(raw.into_receipt());
            }

            if Instant::now() >= deadline {
                return Err(LedgerError::ReceiptTimeout(self.receipt_timeout));
            }

            sleep(self.receipt_poll_interval).await;
        }
    }
}

#[async_trait]
impl LightRegistry for RpcLedger {
    async fn light_state(&self, device_id: &str) -> Result<bool, LedgerError> {
        let device: Address = device_id.parse()?;
        let call = abi::encode_address_call(protocol::LIGHTS_SELECTOR, &device);
        let data = self.eth_call(&self.registry, &call).await?;
        Ok(abi::decode_light(&data)?.is_on)
    }

    /// One JSON-RPC batch for every parsable id
    async fn light_states(&self, device_ids: &[String]) -> Vec<Result<bool, LedgerError>> {
        let mut calls = Vec::new();
        let slots: Vec<Result<(), LedgerError>> = device_ids
            .iter()
            .map(|device_id| -> Result<(), LedgerError> {
                let device: Address = device_id.parse()?;
                let call = abi::encode_address_call(protocol::LIGHTS_SELECTOR, &device);
                let params = json!([
                    { "to": self.registry.to_string(), "data": hex_data(&call) },
                    "latest"
                ]);
                calls.push(("eth_call", params));
                Ok(())
            })
            .collect();

        let batch = self.rpc.batch(calls).await;
        merge_light_batch(slots, batch)
    }
}

/// Put batched light reads back in device order.
///
/// `slots` holds one entry per device: `Ok` for ids sent in the batch (in
/// batch order), `Err` for ids rejected before sending. A failed batch fails
/// every sent id.
fn merge_light_batch(
    slots: Vec<Result<(), LedgerError>>,
    batch: Result<Vec<Result<Value, LedgerError>>, LedgerError>,
) -> Vec<Result<bool, LedgerError>> {
    let mut answers = match batch {
        Ok(answers) => Ok(answers.into_iter()),
        Err(e) => Err(e.to_string()),
    };

    slots
        .into_iter()
        .map(|slot| {
            slot?;
            match &mut answers {
                Ok(answers) => answers
                    .next()
                    .unwrap_or_else(|| Err(LedgerError::Malformed("missing batch result".into())))
                    .and_then(light_from_call_result),
                Err(reason) => Err(LedgerError::BatchFailed(reason.clone())),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_receipt(value: Value) -> RawReceipt {
        serde_json::from_value(value).unwrap()
    }

    /// `lights(address)` return data for an unnamed light
    fn light_result(is_on: bool) -> Result<Value, LedgerError> {
        Ok(json!(format!(
            "0x{}{:064x}{:064x}{}",
            "00".repeat(32),
            96,
            is_on as u8,
            "00".repeat(32)
        )))
    }

    fn bad_id() -> Result<(), LedgerError> {
        "0xnope".parse::<Address>().map(|_| ()).map_err(LedgerError::from)
    }

    #[test]
    fn test_light_batch_keeps_device_order() {
        let states = merge_light_batch(
            vec![Ok(()), bad_id(), Ok(())],
            Ok(vec![light_result(true), light_result(false)]),
        );

        assert_eq!(states.len(), 3);
        assert!(matches!(states[0], Ok(true)));
        assert!(matches!(states[1], Err(LedgerError::Address(_))));
        assert!(matches!(states[2], Ok(false)));
    }

    #[test]
    fn test_light_batch_transport_failure_fails_every_sent_id() {
        let states = merge_light_batch(
            vec![Ok(()), bad_id(), Ok(())],
            Err(LedgerError::Other("connection reset".into())),
        );

        assert_eq!(states.len(), 3);
        for i in [0, 2] {
            match &states[i] {
                Err(LedgerError::BatchFailed(reason)) => assert!(reason.contains("connection reset")),
                other => panic!("slot {i}: {other:?}"),
            }
        }
        assert!(matches!(states[1], Err(LedgerError::Address(_))));
    }

    #[test]
    fn test_light_batch_item_errors_stay_in_their_slot() {
        let states = merge_light_batch(
            vec![Ok(()), Ok(()), Ok(())],
            Ok(vec![
                Err(LedgerError::Rpc {
                    code: -32000,
                    message: "execution reverted".into(),
                }),
                light_result(true),
            ]),
        );

        assert!(matches!(states[0], Err(LedgerError::Rpc { code: -32000, .. })));
        assert!(matches!(states[1], Ok(true)));
        assert!(matches!(states[2], Err(LedgerError::Malformed(_))));
    }

    #[test]
    fn test_receipt_mapping() {
        let receipt = raw_receipt(json!({
            "status": "0x1",
            "transactionHash": "0xfeed",
            "logs": [
                { "topics": [] },
                {
                    "topics": [
                        "0x03551B986D041CBC5634E1ECF13EA7EB57C58E6ED33C521FC03C6F524E128317",
                        "0x000000000000000000000000000000000000000000000000000000000000000c"
                    ]
                }
            ]
        }))
        .into_receipt();

        assert!(receipt.is_success());
        assert_eq!(receipt.events.len(), 1);
        assert_eq!(receipt.events[0].topic, protocol::CORRELATION_TOPIC);
        assert_eq!(
            crate::correlator::correlate(&receipt),
            Ok(RunId::from(12u64))
        );
    }

    #[test]
    fn test_receipt_failure_status() {
        let receipt = raw_receipt(json!({ "status": "0x0", "logs": [] })).into_receipt();
        assert_eq!(receipt.status, ReceiptStatus::Failure);

        // Receipts without a status field cannot be confirmed
        let legacy = raw_receipt(json!({ "logs": [] })).into_receipt();
        assert_eq!(legacy.status, ReceiptStatus::Failure);
    }

    #[test]
    fn test_parse_hex_helpers() {
        assert_eq!(parse_quantity("0xaa289").unwrap(), 696969);
        assert!(parse_quantity("0xzz").is_err());
        assert_eq!(parse_hex_data("0x0102").unwrap(), vec![1, 2]);
        assert_eq!(parse_hex_data("0x").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_new_rejects_bad_address() {
        let config = LedgerConfig {
            agent_address: "not an address".into(),
            ..Default::default()
        };
        assert!(matches!(RpcLedger::new(&config), Err(LedgerError::Address(_))));
    }

    #[tokio::test]
    async fn test_submit_requires_sender() {
        let ledger = RpcLedger::new(&LedgerConfig::default()).unwrap();
        assert!(matches!(
            ledger.submit("turn on the lights").await,
            Err(LedgerError::NoSender)
        ));
    }
}

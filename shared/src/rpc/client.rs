//! JSON-RPC 2.0 over HTTP

use crate::ledger::LedgerError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::trace;

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

impl RpcResponse {
    /// `null` is a valid result (e.g. a receipt that does not exist yet)
    fn into_result(self) -> Result<Value, LedgerError> {
        match self.error {
            Some(err) => Err(LedgerError::Rpc {
                code: err.code,
                message: err.message,
            }),
            None => Ok(self.result),
        }
    }
}

/// Thin JSON-RPC client with request ids unique per client
pub struct RpcClient {
    http: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, LedgerError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url: url.into(),
            next_id: AtomicU64::new(0),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Issue one call and deserialize its result
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, LedgerError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id(),
            method,
            params,
        };
        trace!("RPC {} id={}", method, request.id);

        let response: RpcResponse = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let result = response.into_result()?;
        Ok(serde_json::from_value(result)?)
    }

    /// Issue several calls in one HTTP request.
    ///
    /// The outer error covers the transport; each inner result is the
    /// outcome of the call at the same position in `calls`.
    pub async fn batch(
        &self,
        calls: Vec<(&str, Value)>,
    ) -> Result<Vec<Result<Value, LedgerError>>, LedgerError> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }

        let requests: Vec<RpcRequest<'_>> = calls
            .into_iter()
            .map(|(method, params)| RpcRequest {
                jsonrpc: "2.0",
                id: self.next_id(),
                method,
                params,
            })
            .collect();
        trace!("RPC batch of {}", requests.len());

        let responses: Vec<RpcResponse> = self
            .http
            .post(&self.url)
            .json(&requests)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(match_batch(&requests, responses))
    }
}

/// Responses may come back in any order; pair them with requests by id
fn match_batch(
    requests: &[RpcRequest<'_>],
    responses: Vec<RpcResponse>,
) -> Vec<Result<Value, LedgerError>> {
    let mut by_id: HashMap<u64, RpcResponse> = responses
        .into_iter()
        .filter_map(|r| r.id.map(|id| (id, r)))
        .collect();

    requests
        .iter()
        .map(|request| match by_id.remove(&request.id) {
            Some(response) => response.into_result(),
            None => Err(LedgerError::Malformed(format!(
                "no response for request {} ({})",
                request.id, request.method
            ))),
        })
        .collect()
}

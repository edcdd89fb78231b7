//! JSON-RPC ledger adapter
//!
//! This module handles:
//! - JSON-RPC 2.0 requests and batches over HTTP
//! - ABI encoding of the agent and registry calls
//! - Mapping transaction receipts onto protocol receipts

pub mod abi;
mod client;
mod ledger;

pub use client::RpcClient;
pub use ledger::RpcLedger;

//! chainlog-evm — Ethereum JSON-RPC adapters for chainlog-core.
//!
//! Provides an [`EngineGateway`](chainlog_core::EngineGateway) over
//! `eth_getBlockBy*` / `eth_getLogs` and a [`FinalitySource`](chainlog_core::FinalitySource)
//! that either trusts the execution client's `"finalized"` tag or follows a
//! fork-choice feed.

pub mod finality;
pub mod gateway;
pub mod rpc;

#[cfg(test)]
pub(crate) mod test_utils;

pub use finality::{ForkChoiceHandle, RpcFinalitySource};
pub use gateway::{is_range_too_large, JsonRpcGateway};
pub use rpc::{RpcClient, RpcError};

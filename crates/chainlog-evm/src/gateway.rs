//! [`EngineGateway`] over Ethereum JSON-RPC.
//!
//! Uses `eth_getBlockByHash` / `eth_getBlockByNumber` to resolve block
//! references and `eth_getLogs` to fetch logs. Node errors that mean "this
//! range returns too much data" are classified as
//! [`GatewayError::RangeTooLarge`] so the core fetcher can bisect.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, trace};

use chainlog_core::error::GatewayError;
use chainlog_core::source::EngineGateway;
use chainlog_core::types::{Address, BlockRef, RawLog, B256};

use crate::rpc::{parse_quantity, to_quantity, RpcClient, RpcError};

/// Error code used by several providers for oversized `eth_getLogs` results.
pub const LIMIT_EXCEEDED_CODE: i64 = -32005;

const RANGE_TOO_LARGE_MESSAGES: &[&str] = &[
    "query returned more than",
    "too many results",
    "block range is too",
    "exceeds max block range",
    "response size",
];

/// Whether a node error means the requested log range must be narrowed.
pub fn is_range_too_large(code: i64, message: &str) -> bool {
    if code == LIMIT_EXCEEDED_CODE {
        return true;
    }
    let message = message.to_ascii_lowercase();
    RANGE_TOO_LARGE_MESSAGES
        .iter()
        .any(|needle| message.contains(needle))
}

/// A log as returned by `eth_getLogs`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireLog {
    address: String,
    topics: Vec<String>,
    data: String,
    block_number: Option<String>,
    log_index: Option<String>,
    transaction_hash: Option<String>,
    #[serde(default)]
    removed: bool,
}

impl WireLog {
    fn into_raw(self) -> Result<RawLog, String> {
        // Pending logs carry nulls; a finalized range never should.
        let block_number = self.block_number.as_deref().ok_or("log without blockNumber")?;
        let block_number = parse_quantity(block_number)?;
        let log_index = self.log_index.as_deref().ok_or("log without logIndex")?;
        let log_index = parse_quantity(log_index)?;

        let address: Address = self
            .address
            .parse()
            .map_err(|e| format!("address {:?}: {e}", self.address))?;
        let topics = self
            .topics
            .iter()
            .map(|t| t.parse::<B256>().map_err(|e| format!("topic {t:?}: {e}")))
            .collect::<Result<Vec<_>, _>>()?;
        let data = hex::decode(self.data.strip_prefix("0x").unwrap_or(&self.data))
            .map_err(|e| format!("data: {e}"))?;
        let tx_hash = match self.transaction_hash.as_deref() {
            Some(h) => h.parse().map_err(|e| format!("transactionHash {h:?}: {e}"))?,
            None => B256::ZERO,
        };

        Ok(RawLog {
            address,
            topics,
            data,
            block_number,
            log_index,
            tx_hash,
            removed: self.removed,
        })
    }
}

/// JSON-RPC backed engine gateway.
pub struct JsonRpcGateway<C> {
    client: C,
}

impl<C: RpcClient> JsonRpcGateway<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    fn block_request(block: &BlockRef) -> (&'static str, Vec<Value>) {
        // `false`: header fields only, no transaction bodies.
        match block {
            BlockRef::Hash(hash) => {
                ("eth_getBlockByHash", vec![json!(hash.to_string()), json!(false)])
            }
            BlockRef::Number(n) => {
                ("eth_getBlockByNumber", vec![json!(to_quantity(*n)), json!(false)])
            }
            BlockRef::Finalized => {
                ("eth_getBlockByNumber", vec![json!("finalized"), json!(false)])
            }
        }
    }
}

fn transport(e: RpcError) -> GatewayError {
    match e {
        RpcError::Node { code, message } => {
            GatewayError::Transport(format!("RPC error {code}: {message}"))
        }
        RpcError::Transport(msg) => GatewayError::Transport(msg),
    }
}

#[async_trait]
impl<C: RpcClient> EngineGateway for JsonRpcGateway<C> {
    async fn header_by_reference(&self, block: &BlockRef) -> Result<u64, GatewayError> {
        let (method, params) = Self::block_request(block);
        let header = self.client.request(method, params).await.map_err(transport)?;

        if header.is_null() {
            return Err(GatewayError::HeaderNotFound(block.to_string()));
        }
        let number = header["number"]
            .as_str()
            .ok_or_else(|| GatewayError::Malformed(format!("header for {block} has no number")))?;
        let number = parse_quantity(number).map_err(GatewayError::Malformed)?;
        trace!(%block, number, "resolved block reference");
        Ok(number)
    }

    async fn get_logs(
        &self,
        from: u64,
        to: u64,
        addresses: &[Address],
    ) -> Result<Vec<RawLog>, GatewayError> {
        let mut filter = json!({
            "fromBlock": to_quantity(from),
            "toBlock": to_quantity(to),
        });
        // An empty list is left out, which the node reads as "any address".
        if !addresses.is_empty() {
            filter["address"] = json!(addresses.iter().map(|a| a.to_string()).collect::<Vec<_>>());
        }

        let result = match self.client.request("eth_getLogs", vec![filter]).await {
            Ok(v) => v,
            Err(RpcError::Node { code, message }) if is_range_too_large(code, &message) => {
                debug!(from, to, code, %message, "eth_getLogs range too large");
                return Err(GatewayError::RangeTooLarge { from, to, message });
            }
            Err(e) => return Err(transport(e)),
        };

        let wire: Vec<WireLog> = serde_json::from_value(result)
            .map_err(|e| GatewayError::Malformed(format!("eth_getLogs result: {e}")))?;
        let logs = wire
            .into_iter()
            .map(WireLog::into_raw)
            .collect::<Result<Vec<_>, _>>()
            .map_err(GatewayError::Malformed)?;
        trace!(from, to, count = logs.len(), "fetched logs");
        Ok(logs)
    }
}

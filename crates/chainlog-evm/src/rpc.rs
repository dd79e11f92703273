//! The `RpcClient` trait: the minimal JSON-RPC surface the adapters need.
//!
//! Any transport (HTTP, WebSocket, IPC, a provider pool) plugs in by
//! implementing [`RpcClient::request`].

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Errors from a single JSON-RPC call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    /// Error object returned by the node.
    #[error("RPC error {code}: {message}")]
    Node { code: i64, message: String },

    /// The request never produced a response (connection, timeout, ...).
    #[error("transport error: {0}")]
    Transport(String),
}

impl RpcError {
    pub fn node(code: i64, message: impl Into<String>) -> Self {
        Self::Node {
            code,
            message: message.into(),
        }
    }
}

/// Send one JSON-RPC request and return its `result` member.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` so adapters can be shared across
/// Tokio tasks behind an `Arc`.
#[async_trait]
pub trait RpcClient: Send + Sync {
    async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError>;
}

#[async_trait]
impl<C: RpcClient + ?Sized> RpcClient for std::sync::Arc<C> {
    async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        (**self).request(method, params).await
    }
}

/// Format a block number as a JSON-RPC quantity.
pub fn to_quantity(n: u64) -> String {
    format!("{n:#x}")
}

/// Parse a JSON-RPC quantity (`0x`-prefixed, no leading zeros required).
pub fn parse_quantity(s: &str) -> Result<u64, String> {
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| format!("quantity {s:?} missing 0x prefix"))?;
    if digits.is_empty() {
        return Err(format!("empty quantity {s:?}"));
    }
    u64::from_str_radix(digits, 16).map_err(|e| format!("quantity {s:?}: {e}"))
}

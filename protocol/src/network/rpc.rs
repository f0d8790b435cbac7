//! # JSON-RPC API Definitions
//!
//! Type-safe definitions for the slice of the cluster's JSON-RPC API the
//! gateway consumes. This module defines the request/response types, the
//! method enumeration and the mapping from RPC errors to
//! [`GatewayError`]. The HTTP transport lives in [`super::client`].
//!
//! ## Method Index
//!
//! | Method                   | Used for                                |
//! |--------------------------|-----------------------------------------|
//! | `getLatestBlockhash`     | Freshness reference for every build     |
//! | `getAccountInfo`         | Does the recipient's holding account exist? |
//! | `getBalance`             | Native balance                          |
//! | `getTokenAccountBalance` | Token balance of a holding account      |
//! | `sendTransaction`        | Broadcast                               |

use serde::{Deserialize, Serialize};

use super::gateway::GatewayError;

// ---------------------------------------------------------------------------
// RPC Method Enumeration
// ---------------------------------------------------------------------------

/// Supported JSON-RPC methods.
///
/// The method name on the wire is the camelCase string (e.g.
/// `"getLatestBlockhash"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RpcMethod {
    /// Parameters: `[{commitment}]`
    GetLatestBlockhash,
    /// Parameters: `[address, {encoding: "base64", commitment}]`
    GetAccountInfo,
    /// Parameters: `[address, {commitment}]`
    GetBalance,
    /// Parameters: `[holding_account, {commitment}]`
    GetTokenAccountBalance,
    /// Parameters: `[base64_tx, {encoding: "base64", preflightCommitment}]`
    SendTransaction,
}

// ---------------------------------------------------------------------------
// RPC Request / Response
// ---------------------------------------------------------------------------

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    /// JSON-RPC version. Always "2.0".
    pub jsonrpc: String,
    /// Request identifier. Echoed back in the response.
    pub id: u64,
    /// The method to invoke.
    pub method: RpcMethod,
    /// Positional parameters.
    #[serde(default)]
    pub params: serde_json::Value,
}

impl RpcRequest {
    pub fn new(id: u64, method: RpcMethod, params: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            method,
            params,
        }
    }
}

/// A JSON-RPC 2.0 response.
///
/// Exactly one of `result` or `error` will be set. Both being `None` is a
/// protocol violation, and [`RpcResponse::into_result`] treats it as one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    /// Unwrap the result payload, mapping an error object to a
    /// [`GatewayError`].
    pub fn into_result(self) -> Result<serde_json::Value, GatewayError> {
        match (self.result, self.error) {
            (_, Some(error)) => Err(error.into_gateway_error()),
            (Some(result), None) => Ok(result),
            (None, None) => Err(GatewayError::InvalidResponse(
                "response has neither result nor error".to_string(),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// RPC Errors
// ---------------------------------------------------------------------------

/// Standard JSON-RPC 2.0 codes.
pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

/// Cluster-specific codes.
pub const BLOCK_CLEANED_UP: i64 = -32001;
pub const SEND_TRANSACTION_PREFLIGHT_FAILURE: i64 = -32002;
pub const TRANSACTION_SIGNATURE_VERIFICATION_FAILURE: i64 = -32003;
pub const NODE_UNHEALTHY: i64 = -32005;
pub const TRANSACTION_PRECOMPILE_VERIFICATION_FAILURE: i64 = -32006;
pub const MIN_CONTEXT_SLOT_NOT_REACHED: i64 = -32016;
pub const RATE_LIMITED: i64 = -32429;

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Classify an RPC error.
    ///
    /// Transaction-level failures are rejections; an overloaded or lagging
    /// node is a transient outage. Invalid params means the node refused
    /// what we sent (a malformed or oversized transaction, usually), which
    /// is a rejection too, with one exception: "could not find account"
    /// (returned by `getTokenAccountBalance` for a holding account that was
    /// never created) comes back under the same code and has to be sniffed.
    pub fn into_gateway_error(self) -> GatewayError {
        let message = format!("{} ({})", self.message, self.code);
        match self.code {
            RATE_LIMITED => GatewayError::RateLimited(message),
            NODE_UNHEALTHY | MIN_CONTEXT_SLOT_NOT_REACHED | BLOCK_CLEANED_UP | INTERNAL_ERROR => {
                GatewayError::NetworkUnavailable(message)
            }
            SEND_TRANSACTION_PREFLIGHT_FAILURE
            | TRANSACTION_SIGNATURE_VERIFICATION_FAILURE
            | TRANSACTION_PRECOMPILE_VERIFICATION_FAILURE => {
                GatewayError::SubmissionRejected(message)
            }
            INVALID_PARAMS if self.message.contains("could not find account") => {
                GatewayError::AccountNotFound(message)
            }
            INVALID_PARAMS => GatewayError::SubmissionRejected(message),
            _ => GatewayError::InvalidResponse(message),
        }
    }
}

// ---------------------------------------------------------------------------
// Typed Response Payloads
// ---------------------------------------------------------------------------

/// Most read methods wrap their payload as `{context: {slot}, value}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contextual<T> {
    pub context: RpcContext,
    pub value: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcContext {
    pub slot: u64,
}

/// Payload of `getLatestBlockhash`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockhashResponse {
    pub blockhash: String,
    pub last_valid_block_height: u64,
}

/// Payload of `getAccountInfo` with base64 encoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfoResponse {
    pub lamports: u64,
    pub owner: String,
    /// `[base64, "base64"]`
    pub data: (String, String),
    pub executable: bool,
    #[serde(default)]
    pub rent_epoch: Option<serde_json::Value>,
}

/// Payload of `getTokenAccountBalance`. `amount` is a decimal string of
/// base units because it may not fit in a JS number.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenAmountResponse {
    pub amount: String,
    pub decimals: u8,
    #[serde(default)]
    pub ui_amount_string: Option<String>,
}

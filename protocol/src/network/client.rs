//! JSON-RPC gateway over HTTP.
//!
//! One `reqwest::Client` per gateway (it pools connections internally), one
//! POST per call, no retries. If the endpoint is down we say so and let the
//! grind loop decide what to do about it.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, trace};

use super::gateway::{AccountInfo, GatewayError, LedgerGateway};
use super::rpc::{
    AccountInfoResponse, BlockhashResponse, Contextual, RpcMethod, RpcRequest, RpcResponse,
    TokenAmountResponse,
};
use crate::config::{Network, DEFAULT_COMMITMENT, RPC_REQUEST_TIMEOUT};
use crate::crypto::keys::{Pubkey, Signature};
use crate::transaction::types::Hash;

/// A [`LedgerGateway`] backed by a cluster's JSON-RPC endpoint.
pub struct RpcGateway {
    http: Client,
    url: String,
    network: Network,
    commitment: String,
    next_id: AtomicU64,
}

impl RpcGateway {
    /// Connect to the network's public endpoint.
    pub fn new(network: Network) -> Result<Self, GatewayError> {
        Self::with_url(network, network.rpc_url())
    }

    /// Connect to a custom endpoint (a private RPC provider, a local
    /// validator). `network` still decides which token mint is used.
    pub fn with_url(network: Network, url: impl Into<String>) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(RPC_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::NetworkUnavailable(e.to_string()))?;
        Ok(Self {
            http,
            url: url.into(),
            network,
            commitment: DEFAULT_COMMITMENT.to_string(),
            next_id: AtomicU64::new(1),
        })
    }

    /// Override the commitment level used for reads and preflight.
    pub fn with_commitment(mut self, commitment: impl Into<String>) -> Self {
        self.commitment = commitment.into();
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: RpcMethod,
        params: serde_json::Value,
    ) -> Result<T, GatewayError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest::new(id, method, params);
        trace!(id, ?method, "rpc request");

        let response = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| GatewayError::NetworkUnavailable(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(GatewayError::RateLimited(format!("HTTP {}", status)));
        }
        if status.is_server_error() {
            return Err(GatewayError::NetworkUnavailable(format!("HTTP {}", status)));
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        let result = body.into_result()?;
        debug!(id, ?method, "rpc ok");
        serde_json::from_value(result).map_err(|e| GatewayError::InvalidResponse(e.to_string()))
    }

    fn commitment_config(&self) -> serde_json::Value {
        json!({ "commitment": self.commitment })
    }
}

#[async_trait]
impl LedgerGateway for RpcGateway {
    fn network(&self) -> Network {
        self.network
    }

    async fn latest_blockhash(&self) -> Result<Hash, GatewayError> {
        let resp: Contextual<BlockhashResponse> = self
            .call(RpcMethod::GetLatestBlockhash, json!([self.commitment_config()]))
            .await?;
        resp.value
            .blockhash
            .parse::<Hash>()
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))
    }

    async fn account_info(&self, address: &Pubkey) -> Result<Option<AccountInfo>, GatewayError> {
        let resp: Contextual<Option<AccountInfoResponse>> = self
            .call(
                RpcMethod::GetAccountInfo,
                json!([
                    address.to_string(),
                    { "encoding": "base64", "commitment": self.commitment }
                ]),
            )
            .await?;
        let Some(raw) = resp.value else {
            return Ok(None);
        };
        let owner = raw
            .owner
            .parse()
            .map_err(|_| GatewayError::InvalidResponse(format!("bad owner {}", raw.owner)))?;
        let data = BASE64
            .decode(raw.data.0.as_bytes())
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        Ok(Some(AccountInfo {
            lamports: raw.lamports,
            owner,
            data,
            executable: raw.executable,
        }))
    }

    async fn native_balance(&self, address: &Pubkey) -> Result<u64, GatewayError> {
        let resp: Contextual<u64> = self
            .call(
                RpcMethod::GetBalance,
                json!([address.to_string(), self.commitment_config()]),
            )
            .await?;
        Ok(resp.value)
    }

    async fn token_balance(&self, holding_account: &Pubkey) -> Result<u64, GatewayError> {
        let resp: Contextual<TokenAmountResponse> = self
            .call(
                RpcMethod::GetTokenAccountBalance,
                json!([holding_account.to_string(), self.commitment_config()]),
            )
            .await?;
        resp.value
            .amount
            .parse()
            .map_err(|_| GatewayError::InvalidResponse(format!("bad amount {}", resp.value.amount)))
    }

    async fn broadcast(&self, signed_transaction: &[u8]) -> Result<Signature, GatewayError> {
        let encoded = BASE64.encode(signed_transaction);
        let signature: String = self
            .call(
                RpcMethod::SendTransaction,
                json!([
                    encoded,
                    { "encoding": "base64", "preflightCommitment": self.commitment }
                ]),
            )
            .await?;
        signature
            .parse()
            .map_err(|_| GatewayError::InvalidResponse(format!("bad signature {}", signature)))
    }
}

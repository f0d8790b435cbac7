//! The ledger gateway capability.
//!
//! Everything the engine knows about the outside world comes through this
//! trait. Two implementations ship with the crate: [`super::RpcGateway`]
//! talks JSON-RPC to a real cluster, [`super::InMemoryGateway`] is a
//! deterministic stand-in for tests and demos.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Network;
use crate::crypto::keys::{Pubkey, Signature};
use crate::transaction::types::Hash;

/// Gateway failures, split by what the caller should do about them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Could not reach the endpoint, or it timed out. Try again later.
    #[error("network unavailable: {0}")]
    NetworkUnavailable(String),

    /// The endpoint is shedding load. Try again later, more slowly.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The queried account has no on-ledger presence.
    #[error("account not found: {0}")]
    AccountNotFound(String),

    /// The cluster refused the transaction: bad signature, insufficient
    /// funds, expired blockhash, failed simulation.
    #[error("submission rejected: {0}")]
    SubmissionRejected(String),

    /// The endpoint answered with something we couldn't make sense of.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl GatewayError {
    /// `true` for failures that say nothing about the request itself and
    /// may well succeed if repeated.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::NetworkUnavailable(_) | GatewayError::RateLimited(_)
        )
    }
}

/// The subset of on-ledger account state the builder cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub lamports: u64,
    pub owner: Pubkey,
    pub data: Vec<u8>,
    pub executable: bool,
}

/// A handle on a ledger network.
///
/// Implementations must be safe for sequential reuse across grind
/// iterations. `broadcast` submits exactly once per call and never retries
/// internally; retries are the caller's decision.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// The network this gateway is bound to.
    fn network(&self) -> Network;

    /// A recent blockhash. Failures are always worth retrying.
    async fn latest_blockhash(&self) -> Result<Hash, GatewayError>;

    /// `Ok(None)` when the address has no on-ledger presence.
    async fn account_info(&self, address: &Pubkey) -> Result<Option<AccountInfo>, GatewayError>;

    /// Native balance in lamports. A missing account has zero.
    async fn native_balance(&self, address: &Pubkey) -> Result<u64, GatewayError>;

    /// Token balance of a holding account, in base units. Fails with
    /// [`GatewayError::AccountNotFound`] when the holding account doesn't
    /// exist.
    async fn token_balance(&self, holding_account: &Pubkey) -> Result<u64, GatewayError>;

    /// Submit signed transaction bytes. Returns the signature the cluster
    /// accepted.
    async fn broadcast(&self, signed_transaction: &[u8]) -> Result<Signature, GatewayError>;
}

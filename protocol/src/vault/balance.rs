//! # Balance Queries
//!
//! Read-only lookups, normalized to human units: lamports become SOL
//! (÷ 10^9), token base units become tokens (÷ 10^decimals).
//!
//! A wallet that never received the token has no holding account, and the
//! gateway reports that as [`GatewayError::AccountNotFound`]. Here that is
//! a perfectly good balance of zero, and it's the only error anywhere in
//! the crate that gets swallowed.

use thiserror::Error;
use tracing::debug;

use super::token::usdc;
use crate::config::NATIVE_DECIMALS;
use crate::crypto::keys::Pubkey;
use crate::network::gateway::{GatewayError, LedgerGateway};
use crate::transaction::instructions::PdaError;
use crate::transaction::types::TokenAmount;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BalanceError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("holding account derivation failed: {0}")]
    Derivation(#[from] PdaError),
}

// ---------------------------------------------------------------------------
// BalanceQuery
// ---------------------------------------------------------------------------

/// Balance lookups against one gateway.
pub struct BalanceQuery<'a> {
    gateway: &'a dyn LedgerGateway,
}

impl<'a> BalanceQuery<'a> {
    pub fn new(gateway: &'a dyn LedgerGateway) -> Self {
        Self { gateway }
    }

    /// Native balance as an exact amount.
    pub async fn native_amount(&self, owner: &Pubkey) -> Result<TokenAmount, BalanceError> {
        let lamports = self.gateway.native_balance(owner).await?;
        Ok(TokenAmount::from_base_units(lamports, NATIVE_DECIMALS))
    }

    /// Native balance in whole units.
    pub async fn native_balance(&self, owner: &Pubkey) -> Result<f64, BalanceError> {
        Ok(self.native_amount(owner).await?.to_ui())
    }

    /// Token balance of `owner`'s holding account as an exact amount. A
    /// missing holding account is zero.
    pub async fn token_amount(&self, owner: &Pubkey) -> Result<TokenAmount, BalanceError> {
        let token = usdc(self.gateway.network());
        let holding = token.holding_account(owner)?;
        let base_units = match self.gateway.token_balance(&holding).await {
            Ok(units) => units,
            Err(GatewayError::AccountNotFound(_)) => {
                debug!(%owner, %holding, "no holding account, balance is zero");
                0
            }
            Err(e) => return Err(e.into()),
        };
        Ok(TokenAmount::from_base_units(base_units, token.decimals))
    }

    /// Token balance in whole tokens.
    pub async fn token_balance(&self, owner: &Pubkey) -> Result<f64, BalanceError> {
        Ok(self.token_amount(owner).await?.to_ui())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Network;
    use crate::network::memory::{InMemoryGateway, Operation};

    fn owner() -> Pubkey {
        Pubkey::new_from_array([7; 32])
    }

    #[tokio::test]
    async fn native_balance_in_whole_units() {
        let gw = InMemoryGateway::new(Network::Devnet);
        gw.set_native_balance(owner(), 2_500_000_000);
        let q = BalanceQuery::new(&gw);
        assert_eq!(q.native_balance(&owner()).await.unwrap(), 2.5);
    }

    #[tokio::test]
    async fn token_balance_in_whole_units() {
        let gw = InMemoryGateway::new(Network::Devnet);
        gw.set_token_balance(&owner(), 1_500_000).unwrap();
        let q = BalanceQuery::new(&gw);
        assert_eq!(q.token_balance(&owner()).await.unwrap(), 1.5);
    }

    #[tokio::test]
    async fn missing_holding_account_is_zero() {
        let gw = InMemoryGateway::new(Network::Devnet);
        let q = BalanceQuery::new(&gw);
        assert_eq!(q.token_balance(&owner()).await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn other_gateway_errors_propagate() {
        let gw = InMemoryGateway::new(Network::Devnet);
        gw.fail_next(
            Operation::TokenBalance,
            GatewayError::NetworkUnavailable("down".into()),
        );
        let q = BalanceQuery::new(&gw);
        assert_eq!(
            q.token_balance(&owner()).await,
            Err(BalanceError::Gateway(GatewayError::NetworkUnavailable(
                "down".into()
            )))
        );
    }

    #[tokio::test]
    async fn token_lookup_follows_gateway_network() {
        // Funded on devnet; a mainnet gateway derives a different holding
        // account and sees nothing.
        let devnet = InMemoryGateway::new(Network::Devnet);
        let mainnet = InMemoryGateway::new(Network::Mainnet);
        devnet.set_token_balance(&owner(), 9).unwrap();
        assert_eq!(
            BalanceQuery::new(&mainnet).token_amount(&owner()).await.unwrap().base_units(),
            0
        );
        assert_eq!(
            BalanceQuery::new(&devnet).token_amount(&owner()).await.unwrap().base_units(),
            9
        );
    }
}

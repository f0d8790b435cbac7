//! # Token Registry
//!
//! The engine moves exactly one fungible token, but which mint that is
//! depends on the network: mainnet USDC, devnet USDC and testnet USDC are
//! three unrelated accounts that happen to share a ticker. [`usdc`] is the
//! one place that knows the mapping.

use serde::{Deserialize, Serialize};

use crate::config::{Network, TOKEN_DECIMALS};
use crate::crypto::keys::Pubkey;
use crate::transaction::instructions::{associated_token_address, PdaError};

/// `EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v`
pub const USDC_MAINNET_MINT: Pubkey = Pubkey::new_from_array([
    0xc6, 0xfa, 0x7a, 0xf3, 0xbe, 0xdb, 0xad, 0x3a, 0x3d, 0x65, 0xf3, 0x6a, 0xab, 0xc9, 0x74, 0x31,
    0xb1, 0xbb, 0xe4, 0xc2, 0xd2, 0xf6, 0xe0, 0xe4, 0x7c, 0xa6, 0x02, 0x03, 0x45, 0x2f, 0x5d, 0x61,
]);

/// `CpMah17kQEL2wqyMKt3mZBdTnZbkbfx4nqmQMFDP5vwp`
pub const USDC_TESTNET_MINT: Pubkey = Pubkey::new_from_array([
    0xaf, 0x92, 0x20, 0x04, 0x47, 0x4d, 0x0f, 0x99, 0xc3, 0x6f, 0xfd, 0x15, 0x04, 0x61, 0xf6, 0xef,
    0xf9, 0x1d, 0x7e, 0x91, 0x6f, 0xbb, 0xad, 0x2b, 0xb6, 0x09, 0xf0, 0x21, 0xb6, 0xf9, 0xc0, 0xdf,
]);

/// `4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU`
pub const USDC_DEVNET_MINT: Pubkey = Pubkey::new_from_array([
    0x3b, 0x44, 0x2c, 0xb3, 0x91, 0x21, 0x57, 0xf1, 0x3a, 0x93, 0x3d, 0x01, 0x34, 0x28, 0x2d, 0x03,
    0x2b, 0x5f, 0xfe, 0xcd, 0x01, 0xa2, 0xdb, 0xf1, 0xb7, 0x79, 0x06, 0x08, 0xdf, 0x00, 0x2e, 0xa7,
]);

/// Static metadata for a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TokenInfo {
    pub symbol: &'static str,
    pub name: &'static str,
    pub mint: Pubkey,
    /// Decimal exponent. Display only: the wire always carries base units.
    pub decimals: u8,
}

impl TokenInfo {
    /// `owner`'s holding account for this token.
    pub fn holding_account(&self, owner: &Pubkey) -> Result<Pubkey, PdaError> {
        associated_token_address(owner, &self.mint)
    }
}

/// Owned form for config files and JSON output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDescriptor {
    pub symbol: String,
    pub mint: Pubkey,
    pub decimals: u8,
}

impl From<TokenInfo> for TokenDescriptor {
    fn from(info: TokenInfo) -> Self {
        Self {
            symbol: info.symbol.to_string(),
            mint: info.mint,
            decimals: info.decimals,
        }
    }
}

/// USDC on the given network.
pub fn usdc(network: Network) -> TokenInfo {
    let mint = match network {
        Network::Mainnet => USDC_MAINNET_MINT,
        Network::Testnet => USDC_TESTNET_MINT,
        Network::Devnet => USDC_DEVNET_MINT,
    };
    TokenInfo {
        symbol: "USDC",
        name: "USD Coin",
        mint,
        decimals: TOKEN_DECIMALS,
    }
}

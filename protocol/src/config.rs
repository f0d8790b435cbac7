//! # Protocol Configuration & Constants
//!
//! Every magic number in Quarry lives here. If you're hardcoding a constant
//! somewhere else, you're doing it wrong and you owe the team coffee.
//!
//! Most of these are dictated by the ledger itself (decimal exponents, wire
//! limits, program ids). The grind delays are ours, and they are only
//! defaults: [`crate::grind::GrindPolicy`] overrides every one of them.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::crypto::Pubkey;

// ---------------------------------------------------------------------------
// Endpoints
// ---------------------------------------------------------------------------

/// Public mainnet RPC. Heavily rate limited, fine for a few grinds.
pub const MAINNET_RPC_URL: &str = "https://api.mainnet-beta.solana.com";

/// Public testnet RPC.
pub const TESTNET_RPC_URL: &str = "https://api.testnet.solana.com";

/// Public devnet RPC. Airdrops work here, which makes it the default.
pub const DEVNET_RPC_URL: &str = "https://api.devnet.solana.com";

/// Per-request HTTP timeout for the JSON-RPC client.
pub const RPC_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Commitment level used for every read. `confirmed` is the usual compromise
/// between freshness and rollback risk.
pub const DEFAULT_COMMITMENT: &str = "confirmed";

// ---------------------------------------------------------------------------
// Denominations
// ---------------------------------------------------------------------------

/// Decimal exponent of the native unit. 1 SOL = 10^9 lamports.
pub const NATIVE_DECIMALS: u8 = 9;

/// Lamports per whole native unit.
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Decimal exponent of the target fungible token (USDC).
pub const TOKEN_DECIMALS: u8 = 6;

// ---------------------------------------------------------------------------
// Cryptographic Parameters
// ---------------------------------------------------------------------------

/// Ed25519 secret seed length.
pub const SECRET_KEY_LENGTH: usize = 32;

/// Public key (address) length.
pub const PUBKEY_LENGTH: usize = 32;

/// The exported keypair format: 32 secret bytes followed by 32 public bytes.
pub const KEYPAIR_LENGTH: usize = 64;

/// Ed25519 signature length. Always 64 bytes.
pub const SIGNATURE_LENGTH: usize = 64;

/// Blockhash length.
pub const HASH_LENGTH: usize = 32;

// ---------------------------------------------------------------------------
// Wire Limits
// ---------------------------------------------------------------------------

/// Maximum serialized transaction size the network accepts (IPv6 MTU minus
/// headers). Anything larger is rejected before it leaves the process.
pub const PACKET_DATA_SIZE: usize = 1232;

/// Marker appended to program-derived-address preimages.
pub const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";

/// Program-derived addresses accept at most 16 seeds.
pub const MAX_SEEDS: usize = 16;

/// ... of at most 32 bytes each.
pub const MAX_SEED_LEN: usize = 32;

// ---------------------------------------------------------------------------
// Grind Defaults
// ---------------------------------------------------------------------------

/// How many build-sign-evaluate cycles a grind performs before giving up.
pub const DEFAULT_ATTEMPT_BUDGET: u32 = 100;

/// Pause after every rejected candidate. Just enough to stay under public
/// RPC rate limits.
pub const DEFAULT_ATTEMPT_DELAY: Duration = Duration::from_millis(10);

/// Every `DEFAULT_SLOW_DOWN_EVERY` rejections we wait longer, so the
/// blockhash has a chance to actually move. Same blockhash, same message,
/// same signature.
pub const DEFAULT_SLOW_DOWN_DELAY: Duration = Duration::from_millis(500);

/// See [`DEFAULT_SLOW_DOWN_DELAY`].
pub const DEFAULT_SLOW_DOWN_EVERY: u32 = 10;

/// Pause after a transient gateway failure.
pub const DEFAULT_TRANSIENT_DELAY: Duration = Duration::from_secs(1);

/// Transient failures do not burn attempts, but they are not free either.
pub const DEFAULT_TRANSIENT_RETRY_BUDGET: u32 = 100;

// ---------------------------------------------------------------------------
// Network Selection
// ---------------------------------------------------------------------------

/// Which cluster a gateway talks to.
///
/// The selector decides both the RPC endpoint and which mint address "the
/// token" means, since USDC has a different mint on every cluster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Real money.
    Mainnet,
    /// Validator testing cluster.
    Testnet,
    /// Developer cluster. Free airdrops, no promises.
    #[default]
    Devnet,
}

impl Network {
    /// Every selectable network, in a stable order.
    pub const ALL: [Network; 3] = [Network::Mainnet, Network::Testnet, Network::Devnet];

    /// The public RPC endpoint for this network.
    pub fn rpc_url(&self) -> &'static str {
        match self {
            Network::Mainnet => MAINNET_RPC_URL,
            Network::Testnet => TESTNET_RPC_URL,
            Network::Devnet => DEVNET_RPC_URL,
        }
    }

    /// The mint of the fungible token this engine transfers on this network.
    pub fn token_mint(&self) -> Pubkey {
        crate::vault::token::usdc(*self).mint
    }

    /// Short lowercase name, mainly for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Devnet => "devnet",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when a network name doesn't parse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown network: {0} (expected mainnet, testnet or devnet)")]
pub struct UnknownNetwork(pub String);

impl FromStr for Network {
    type Err = UnknownNetwork;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" | "mainnet-beta" | "production" => Ok(Network::Mainnet),
            "testnet" | "test" => Ok(Network::Testnet),
            "devnet" | "dev" | "development" => Ok(Network::Devnet),
            other => Err(UnknownNetwork(other.to_string())),
        }
    }
}

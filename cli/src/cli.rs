//! # CLI Interface
//!
//! Defines the command-line argument structure for `quarry` using `clap`
//! derive. Five subcommands: `keygen`, `address`, `balance`, `send` and
//! `grind`.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use quarry_protocol::grind::{GrindPolicy, MatchKind};
use quarry_protocol::Network;

/// Quarry: build, sign and grind transfers on Solana-style ledgers.
#[derive(Parser, Debug)]
#[command(
    name = "quarry",
    about = "Build, sign and grind transfers on Solana-style ledgers",
    version,
    propagate_version = true
)]
pub struct QuarryCli {
    /// Cluster to talk to: mainnet, testnet or devnet.
    #[arg(long, short = 'n', global = true, env = "QUARRY_NETWORK", default_value = "devnet")]
    pub network: Network,

    /// Override the cluster's public JSON-RPC endpoint.
    #[arg(long, global = true, env = "QUARRY_RPC_URL")]
    pub rpc_url: Option<String>,

    /// Log format on stderr: pretty or json.
    #[arg(long, global = true, env = "QUARRY_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    /// Print results as JSON on stdout.
    #[arg(long, global = true)]
    pub json: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a new identity.
    Keygen(KeygenArgs),
    /// Print the address of an identity.
    Address(SignerArgs),
    /// Show native and token balances of an address.
    Balance(BalanceArgs),
    /// Build, sign and broadcast a single transfer.
    Send(SendArgs),
    /// Rebuild a transfer until its signature matches a pattern, then
    /// broadcast it once.
    Grind(GrindArgs),
}

/// Arguments for the `keygen` subcommand.
#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Also write the secret as a JSON keyfile (`[12, 34, ...]`) here.
    #[arg(long, short = 'o')]
    pub out: Option<PathBuf>,
}

/// Where the signing identity comes from. Exactly one source.
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct SignerArgs {
    /// Base58-encoded 64-byte secret key.
    ///
    /// **Prefer `--keyfile` or the environment** so the secret doesn't end up
    /// in shell history.
    #[arg(long, env = "QUARRY_SECRET", hide_env_values = true)]
    pub secret: Option<String>,

    /// Path to a JSON keyfile.
    #[arg(long, short = 'k', env = "QUARRY_KEYFILE")]
    pub keyfile: Option<PathBuf>,
}

/// Arguments for the `balance` subcommand.
#[derive(Args, Debug)]
pub struct BalanceArgs {
    /// Address to look up.
    pub address: String,
}

/// How much to send. Exactly one unit.
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct AmountArgs {
    /// Native transfer of this many lamports.
    #[arg(long)]
    pub lamports: Option<u64>,

    /// Token transfer of this many whole tokens (truncated to the token's
    /// decimals).
    #[arg(long)]
    pub token: Option<f64>,
}

/// Arguments for the `send` subcommand.
#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub signer: SignerArgs,

    /// Recipient address.
    #[arg(long)]
    pub to: String,

    #[command(flatten)]
    pub amount: AmountArgs,

    /// Build and sign but don't broadcast.
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the `grind` subcommand.
#[derive(Args, Debug)]
pub struct GrindArgs {
    #[command(flatten)]
    pub signer: SignerArgs,

    /// Recipient address.
    #[arg(long)]
    pub to: String,

    #[command(flatten)]
    pub amount: AmountArgs,

    /// The base58 text the signature has to show.
    #[arg(long, short = 'p')]
    pub pattern: String,

    /// Where the pattern has to appear.
    #[arg(long, value_enum, default_value = "prefix")]
    pub position: Position,

    /// Match letters regardless of case.
    #[arg(long, short = 'i')]
    pub ignore_case: bool,

    /// Give up after this many attempts.
    #[arg(long, short = 'a', env = "QUARRY_ATTEMPTS", default_value_t = 100)]
    pub attempts: u32,

    /// Pause between rejected attempts, in milliseconds.
    #[arg(long, env = "QUARRY_ATTEMPT_DELAY_MS")]
    pub attempt_delay_ms: Option<u64>,

    /// Longer pause taken every tenth rejection, in milliseconds.
    #[arg(long, env = "QUARRY_SLOW_DOWN_DELAY_MS")]
    pub slow_down_delay_ms: Option<u64>,

    /// Pause after an RPC failure (endpoint down, rate limited), in
    /// milliseconds.
    #[arg(long, env = "QUARRY_TRANSIENT_DELAY_MS")]
    pub transient_delay_ms: Option<u64>,
}

impl GrindArgs {
    /// The default policy with any delay overrides applied. The attempt
    /// budget is passed separately.
    pub fn policy(&self) -> GrindPolicy {
        let mut policy = GrindPolicy::default();
        if let Some(ms) = self.attempt_delay_ms {
            policy = policy.with_attempt_delay(Duration::from_millis(ms));
        }
        if let Some(ms) = self.slow_down_delay_ms {
            let every = policy.slow_down_every;
            policy = policy.with_slow_down(every, Duration::from_millis(ms));
        }
        if let Some(ms) = self.transient_delay_ms {
            policy = policy.with_transient_delay(Duration::from_millis(ms));
        }
        policy
    }
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Prefix,
    Suffix,
    Contains,
}

impl From<Position> for MatchKind {
    fn from(p: Position) -> Self {
        match p {
            Position::Prefix => MatchKind::Prefix,
            Position::Suffix => MatchKind::Suffix,
            Position::Contains => MatchKind::Contains,
        }
    }
}

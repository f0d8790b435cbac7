// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Quarry Protocol: Core Library
//!
//! Quarry builds, signs and (conditionally) submits value transfers against a
//! Solana-style ledger: native lamport transfers and SPL token transfers with
//! implicit recipient-account provisioning.
//!
//! The interesting part is the grind loop. Ed25519 signatures are
//! deterministic, so the only way to get a *different* signature for the
//! *same* transfer is to change what gets signed, and the one thing that
//! changes on its own is the recent blockhash. Quarry rebuilds and re-signs
//! the transaction against fresh blockhashes, hands each candidate signature
//! to a caller-supplied predicate, and broadcasts exactly once, when the
//! predicate says yes. If it never says yes, nothing is broadcast. Ever.
//!
//! ## Architecture
//!
//! - **config**: Constants, network selection, RPC endpoints.
//! - **crypto**: Ed25519 keys, signatures, public keys, SHA-256.
//! - **identity**: Create and restore signing identities.
//! - **transaction**: Wire codec, message compiler, instructions, builder.
//! - **network**: The `LedgerGateway` capability, its JSON-RPC client and
//!   an in-memory double.
//! - **grind**: The grind-and-submit engine, its policy and predicates.
//! - **vault**: Token registry and balance queries.
//! - **session**: One handle that ties all of the above together.
//!
//! ## Design Philosophy
//!
//! 1. The ledger is a capability that gets passed in, not a global.
//! 2. Retryable and terminal failures are different types, not different
//!    strings.
//! 3. Broadcast is a commit point. At most one per grind, no replays.
//! 4. If it touches money, it has tests. Plural.

pub mod config;
pub mod crypto;
pub mod grind;
pub mod identity;
pub mod network;
pub mod session;
pub mod transaction;
pub mod vault;

pub use config::Network;
pub use crypto::{Keypair, Pubkey, Signature};
pub use grind::{GrindEngine, GrindError, GrindOutcome, GrindPolicy, GrindState, TransferRequest};
pub use identity::{Identity, IdentityError};
pub use network::{GatewayError, LedgerGateway};
pub use session::Session;
pub use transaction::{BuildError, SignedTransaction, TokenAmount, TransactionBuilder};

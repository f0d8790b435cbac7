//! # Transaction Module
//!
//! Construction, compilation, signing and wire encoding of ledger
//! transactions.
//!
//! ## Architecture
//!
//! ```text
//! types.rs        - Hash, AccountMeta, Instruction, TokenAmount
//! wire.rs         - compact-u16 lengths and a bounds-checked reader
//! message.rs      - Message compilation (account ordering) and bytes
//! instructions.rs - System / Token / Associated Token encoders, PDAs
//! signing.rs      - Transaction, sign_transaction, verification
//! builder.rs      - TransactionBuilder: "send X to Y" → signed bytes
//! ```
//!
//! ## Transaction Lifecycle
//!
//! 1. **Assemble**: pick the instructions for the transfer.
//! 2. **Compile**: [`Message::compile`] dedups and orders the accounts and
//!    embeds a fresh blockhash.
//! 3. **Sign**: [`sign_transaction`] signs the message bytes.
//! 4. **Serialize**: [`Transaction::serialize`] gives the wire bytes.
//!
//! [`TransactionBuilder`] does all four against a gateway.
//!
//! ## Design Decisions
//!
//! - All amounts on the wire are `u64` base units. The only float in the
//!   module is the caller-facing token amount, and it is converted through
//!   its exact decimal string before anything else sees it.
//! - Decoding never panics on hostile input; every length and index is
//!   checked and reported as a [`WireError`].

pub mod builder;
pub mod instructions;
pub mod message;
pub mod signing;
pub mod types;
pub mod wire;

pub use builder::{parse_address, BuildError, SignedTransaction, TransactionBuilder};
pub use instructions::{associated_token_address, PdaError};
pub use message::{CompiledInstruction, Message, MessageHeader};
pub use signing::{sign_transaction, SigningError, Transaction};
pub use types::{AccountMeta, AmountError, Hash, Instruction, TokenAmount};
pub use wire::WireError;

//! Transaction construction.
//!
//! [`TransactionBuilder`] turns "send X to Y" into signed wire bytes:
//!
//! 1. validate the recipient,
//! 2. assemble the instructions (native: one transfer; token: an optional
//!    holding-account creation, then the transfer),
//! 3. fetch a fresh blockhash,
//! 4. compile with the sender as fee payer, sign, serialize.
//!
//! Every build fetches its own blockhash. That is what makes two builds of
//! the same transfer produce different signatures, and the grind loop is
//! built on that.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use thiserror::Error;
use tracing::{debug, trace};

use super::instructions::{
    associated_token_address, create_associated_token_account, system_transfer, token_transfer,
    PdaError,
};
use super::message::Message;
use super::signing::{sign_transaction, SigningError, Transaction};
use super::types::{AmountError, Instruction, TokenAmount};
use super::wire::WireError;
use crate::config::{Network, PACKET_DATA_SIZE};
use crate::crypto::keys::{Pubkey, Signature};
use crate::identity::Identity;
use crate::network::gateway::{GatewayError, LedgerGateway};
use crate::vault::token::usdc;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Everything that can go wrong between "send X to Y" and signed bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(#[from] AmountError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Should be unreachable with a valid identity.
    #[error("signing failure: {0}")]
    Signing(#[from] SigningError),

    #[error("holding account derivation failed: {0}")]
    Derivation(#[from] PdaError),

    #[error("encoding error: {0}")]
    Encoding(#[from] WireError),

    #[error("transaction is {size} bytes, over the 1232-byte packet limit")]
    TooLarge { size: usize },
}

impl BuildError {
    /// `true` when the build failed for reasons outside the request and is
    /// worth repeating (a gateway hiccup during the existence check or the
    /// blockhash fetch).
    pub fn is_transient(&self) -> bool {
        matches!(self, BuildError::Gateway(e) if e.is_retryable())
    }
}

// ---------------------------------------------------------------------------
// SignedTransaction
// ---------------------------------------------------------------------------

/// The product of one build: the logical transaction, its wire bytes and
/// its signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub transaction: Transaction,
    pub serialized: Vec<u8>,
    pub signature: Signature,
}

impl SignedTransaction {
    pub fn instruction_count(&self) -> usize {
        self.transaction.message.instructions.len()
    }

    pub fn fee_payer(&self) -> Option<&Pubkey> {
        self.transaction.message.fee_payer()
    }

    /// Wire bytes as base64, the encoding `sendTransaction` wants.
    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.serialized)
    }
}

// ---------------------------------------------------------------------------
// TransactionBuilder
// ---------------------------------------------------------------------------

/// Builds and signs transfers against one gateway.
pub struct TransactionBuilder<'a> {
    gateway: &'a dyn LedgerGateway,
}

impl<'a> TransactionBuilder<'a> {
    pub fn new(gateway: &'a dyn LedgerGateway) -> Self {
        Self { gateway }
    }

    pub fn network(&self) -> Network {
        self.gateway.network()
    }

    /// Native transfer of `lamports` from `identity` to `recipient`.
    ///
    /// No unit conversion: the amount is already in lamports.
    pub async fn native_transfer(
        &self,
        identity: &Identity,
        recipient: &str,
        lamports: u64,
    ) -> Result<SignedTransaction, BuildError> {
        let to = parse_address(recipient)?;
        let from = identity.address();
        let instructions = vec![system_transfer(&from, &to, lamports)];
        self.finalize(identity, &instructions).await
    }

    /// Token transfer of `amount` whole tokens from `identity` to
    /// `recipient`.
    ///
    /// The amount is truncated to the token's decimals. If the recipient has
    /// no holding account yet, one is created first (sender pays), so the
    /// instruction count is 2 instead of 1.
    pub async fn token_transfer(
        &self,
        identity: &Identity,
        recipient: &str,
        amount: f64,
    ) -> Result<SignedTransaction, BuildError> {
        let to = parse_address(recipient)?;
        let token = usdc(self.network());
        let base_units = TokenAmount::from_ui(amount, token.decimals)?.base_units();
        self.token_transfer_base_units(identity, &to, base_units)
            .await
    }

    /// Token transfer with the amount already in base units.
    pub async fn token_transfer_base_units(
        &self,
        identity: &Identity,
        recipient: &Pubkey,
        base_units: u64,
    ) -> Result<SignedTransaction, BuildError> {
        let mint = usdc(self.network()).mint;
        let sender = identity.address();
        let source = associated_token_address(&sender, &mint)?;
        let destination = associated_token_address(recipient, &mint)?;

        let mut instructions = Vec::with_capacity(2);
        if self.gateway.account_info(&destination).await?.is_none() {
            debug!(%recipient, %destination, "recipient holding account missing, creating it");
            instructions.push(create_associated_token_account(&sender, recipient, &mint)?);
        }
        instructions.push(token_transfer(&source, &destination, &sender, base_units));

        self.finalize(identity, &instructions).await
    }

    /// Blockhash, compile, sign, serialize.
    async fn finalize(
        &self,
        identity: &Identity,
        instructions: &[Instruction],
    ) -> Result<SignedTransaction, BuildError> {
        let blockhash = self.gateway.latest_blockhash().await?;
        let message = Message::compile(instructions, &identity.address(), blockhash)?;
        let mut transaction = Transaction::new_unsigned(message);
        sign_transaction(&mut transaction, identity.keypair())?;

        let serialized = transaction.serialize()?;
        if serialized.len() > PACKET_DATA_SIZE {
            return Err(BuildError::TooLarge {
                size: serialized.len(),
            });
        }
        let signature = transaction
            .signature()
            .copied()
            .ok_or(BuildError::Signing(SigningError::VerificationFailed))?;

        trace!(%signature, %blockhash, bytes = serialized.len(), "built transaction");
        Ok(SignedTransaction {
            transaction,
            serialized,
            signature,
        })
    }
}

/// Parse a base58 address. Off-curve addresses (program-derived) are fine
/// as recipients.
pub fn parse_address(address: &str) -> Result<Pubkey, BuildError> {
    address
        .trim()
        .parse()
        .map_err(|_| BuildError::InvalidAddress(address.to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! # Identity Provider
//!
//! A signing identity is an Ed25519 keypair plus the two encodings of its
//! secret that callers actually handle: raw bytes for signing, base58 text
//! for storage and display.
//!
//! The two encodings are produced together and never mutated separately,
//! so they can't drift: `restore(identity.secret_base58())` always gives
//! back the same address and the same raw key.
//!
//! Two import formats are understood:
//!
//! 1. **base58**: 64 bytes (secret seed || public key), the format wallets
//!    export.
//! 2. **JSON keyfile**: the same 64 bytes as a JSON array of integers, the
//!    format the reference CLI writes to `~/.config/solana/id.json`.

use std::fmt;

use thiserror::Error;

use crate::crypto::keys::{KeyError, Keypair, Pubkey};

/// Errors from creating or restoring an identity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// The encoded secret didn't decode, had the wrong length, or its public
    /// half didn't match its secret half. We don't say which.
    #[error("invalid secret key")]
    InvalidSecretKey,
}

impl From<KeyError> for IdentityError {
    fn from(_: KeyError) -> Self {
        IdentityError::InvalidSecretKey
    }
}

/// A local signing identity.
///
/// Cheap to clone, but every clone is another copy of a private key, so
/// prefer passing `&Identity` around.
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    keypair: Keypair,
    secret_base58: String,
}

impl Identity {
    /// Generate a brand-new random identity.
    pub fn create() -> Self {
        Self::from_keypair(Keypair::generate())
    }

    /// Restore an identity from its base58-encoded 64-byte secret.
    ///
    /// # Errors
    ///
    /// [`IdentityError::InvalidSecretKey`] if the text isn't base58, doesn't
    /// decode to exactly 64 bytes, or the embedded public key doesn't match
    /// the one derived from the secret seed.
    pub fn restore(encoded_secret: &str) -> Result<Self, IdentityError> {
        let keypair = Keypair::from_base58_string(encoded_secret)?;
        Ok(Self::from_keypair(keypair))
    }

    /// Restore an identity from a JSON keyfile body (`[12, 34, ...]`).
    pub fn restore_from_json(json: &str) -> Result<Self, IdentityError> {
        let bytes: Vec<u8> =
            serde_json::from_str(json).map_err(|_| IdentityError::InvalidSecretKey)?;
        let keypair = Keypair::from_bytes(&bytes)?;
        Ok(Self::from_keypair(keypair))
    }

    /// Wrap an existing keypair.
    pub fn from_keypair(keypair: Keypair) -> Self {
        let secret_base58 = keypair.to_base58_string();
        Self {
            keypair,
            secret_base58,
        }
    }

    /// The ledger-visible address.
    pub fn address(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    /// The signing keypair.
    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    /// Base58 text form of the 64-byte secret.
    pub fn secret_base58(&self) -> &str {
        &self.secret_base58
    }

    /// Raw 64-byte secret (seed || public key).
    pub fn secret_bytes(&self) -> [u8; 64] {
        self.keypair.to_bytes()
    }

    /// Render as a JSON keyfile body (`[12,34,...]`).
    pub fn to_json(&self) -> Result<String, IdentityError> {
        serde_json::to_string(&self.secret_bytes().to_vec())
            .map_err(|_| IdentityError::InvalidSecretKey)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", self.address())
    }
}

//! Transactions and Ed25519 signing.
//!
//! A [`Transaction`] is a compiled [`Message`] plus one signature per
//! required signer, in the same order as the message's signer keys. The
//! signature is over the canonical message bytes and nothing else, so the
//! first signature doubles as the transaction id: it is the string explorers
//! show, the string `broadcast` returns, and the string grind predicates
//! look at.
//!
//! Wire layout:
//!
//! ```text
//! len signatures, then 64 bytes each
//! message bytes (see super::message)
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::message::Message;
use super::wire::{encode_length, Reader, WireError};
use crate::config::SIGNATURE_LENGTH;
use crate::crypto::keys::{Keypair, Pubkey, Signature};

/// Errors from signing a transaction.
///
/// Neither signing variant should ever fire for a transaction this crate
/// built with a valid identity. If one does, something upstream is badly
/// wrong and the caller should stop, not retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SigningError {
    #[error("keypair {0} is not a required signer of this message")]
    KeypairNotSigner(Pubkey),

    #[error("produced signature failed verification")]
    VerificationFailed,

    #[error("encoding error: {0}")]
    Encoding(#[from] WireError),
}

/// A message and its signatures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub signatures: Vec<Signature>,
    pub message: Message,
}

impl Transaction {
    /// Wrap a message with zeroed placeholder signatures, one per signer.
    pub fn new_unsigned(message: Message) -> Self {
        let signatures =
            vec![Signature::default(); usize::from(message.header.num_required_signatures)];
        Self {
            signatures,
            message,
        }
    }

    /// The transaction id: the fee payer's signature.
    pub fn signature(&self) -> Option<&Signature> {
        self.signatures.first()
    }

    /// `true` once no placeholder signatures remain.
    pub fn is_signed(&self) -> bool {
        !self.signatures.is_empty()
            && self
                .signatures
                .iter()
                .all(|sig| *sig != Signature::default())
    }

    /// Check every signature against its signer key.
    pub fn verify(&self) -> bool {
        let Ok(bytes) = self.message.serialize() else {
            return false;
        };
        let signers = self.message.signer_keys();
        signers.len() == self.signatures.len()
            && signers
                .iter()
                .zip(&self.signatures)
                .all(|(key, sig)| sig.verify(key, &bytes))
    }

    /// Full wire bytes, ready for `sendTransaction`.
    pub fn serialize(&self) -> Result<Vec<u8>, WireError> {
        let message = self.message.serialize()?;
        let mut buf = Vec::with_capacity(3 + self.signatures.len() * SIGNATURE_LENGTH + message.len());
        encode_length(&mut buf, self.signatures.len())?;
        for sig in &self.signatures {
            buf.extend_from_slice(sig.as_bytes());
        }
        buf.extend_from_slice(&message);
        Ok(buf)
    }

    /// Parse wire bytes. The signature count must match the header's
    /// required signers, and nothing may follow the message.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, WireError> {
        let mut reader = Reader::new(bytes);
        let count = reader.read_length()?;
        let mut signatures = Vec::with_capacity(count.min(16));
        for _ in 0..count {
            signatures.push(Signature::from_bytes(reader.read_array()?));
        }
        let message = Message::read_from(&mut reader)?;
        reader.finish()?;

        let required = usize::from(message.header.num_required_signatures);
        if count != required {
            return Err(WireError::SignatureCountMismatch {
                signatures: count,
                required,
            });
        }
        Ok(Self {
            signatures,
            message,
        })
    }
}

/// Signs a transaction in place with `keypair`.
///
/// The procedure:
/// 1. Serialize the message. These exact bytes are what gets signed.
/// 2. Find the keypair's slot among the message's signer keys.
/// 3. Produce an Ed25519 signature and store it in that slot.
/// 4. Verify it straight away. ed25519 is deterministic, so a failure here
///    means a corrupted key in memory, not bad luck.
///
/// Returns the (now signed) transaction for chaining convenience.
///
/// # Example
///
/// ```rust
/// use quarry_protocol::crypto::Keypair;
/// use quarry_protocol::transaction::{
///     instructions::system_transfer, sign_transaction, Hash, Message, Transaction,
/// };
///
/// let keypair = Keypair::generate();
/// let to = Keypair::generate().pubkey();
/// let ix = system_transfer(&keypair.pubkey(), &to, 1_000);
/// let message = Message::compile(&[ix], &keypair.pubkey(), Hash::default()).unwrap();
/// let mut tx = Transaction::new_unsigned(message);
///
/// sign_transaction(&mut tx, &keypair).unwrap();
/// assert!(tx.is_signed());
/// assert!(tx.verify());
/// ```
pub fn sign_transaction<'a>(
    tx: &'a mut Transaction,
    keypair: &Keypair,
) -> Result<&'a Transaction, SigningError> {
    let bytes = tx.message.serialize()?;
    let pubkey = keypair.pubkey();
    let slot = tx
        .message
        .signer_keys()
        .iter()
        .position(|k| *k == pubkey)
        .ok_or(SigningError::KeypairNotSigner(pubkey))?;

    let signature = keypair.sign(&bytes);
    if !signature.verify(&pubkey, &bytes) {
        return Err(SigningError::VerificationFailed);
    }

    let required = usize::from(tx.message.header.num_required_signatures);
    tx.signatures.resize(required, Signature::default());
    tx.signatures[slot] = signature;
    Ok(tx)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::instructions::system_transfer;
    use crate::transaction::types::Hash;

    fn unsigned_transfer(payer: &Keypair) -> Transaction {
        let to = Keypair::generate().pubkey();
        let ix = system_transfer(&payer.pubkey(), &to, 100_000);
        let msg = Message::compile(&[ix], &payer.pubkey(), Hash::new_from_array([9; 32])).unwrap();
        Transaction::new_unsigned(msg)
    }

    #[test]
    fn sign_then_verify() {
        let kp = Keypair::generate();
        let mut tx = unsigned_transfer(&kp);
        assert!(!tx.is_signed());
        sign_transaction(&mut tx, &kp).unwrap();
        assert!(tx.is_signed());
        assert!(tx.verify());
    }

    #[test]
    fn signing_is_deterministic() {
        let kp = Keypair::generate();
        let mut a = unsigned_transfer(&kp);
        let mut b = a.clone();
        sign_transaction(&mut a, &kp).unwrap();
        sign_transaction(&mut b, &kp).unwrap();
        assert_eq!(a.signature(), b.signature());
    }

    #[test]
    fn wrong_keypair_is_rejected() {
        let kp = Keypair::generate();
        let stranger = Keypair::generate();
        let mut tx = unsigned_transfer(&kp);
        assert_eq!(
            sign_transaction(&mut tx, &stranger).unwrap_err(),
            SigningError::KeypairNotSigner(stranger.pubkey())
        );
        assert!(!tx.is_signed());
    }

    #[test]
    fn wire_roundtrip_preserves_signature() {
        let kp = Keypair::generate();
        let mut tx = unsigned_transfer(&kp);
        sign_transaction(&mut tx, &kp).unwrap();
        let bytes = tx.serialize().unwrap();
        let decoded = Transaction::deserialize(&bytes).unwrap();
        assert_eq!(decoded, tx);
        assert!(decoded.verify());
        assert_eq!(decoded.message.fee_payer(), Some(&kp.pubkey()));
    }

    #[test]
    fn tampered_message_fails_verification() {
        let kp = Keypair::generate();
        let mut tx = unsigned_transfer(&kp);
        sign_transaction(&mut tx, &kp).unwrap();
        tx.message.recent_blockhash = Hash::new_from_array([8; 32]);
        assert!(!tx.verify());
    }

    #[test]
    fn deserialize_rejects_signature_count_mismatch() {
        let kp = Keypair::generate();
        let mut tx = unsigned_transfer(&kp);
        sign_transaction(&mut tx, &kp).unwrap();
        tx.signatures.push(Signature::default());
        let bytes = tx.serialize().unwrap();
        assert_eq!(
            Transaction::deserialize(&bytes),
            Err(WireError::SignatureCountMismatch {
                signatures: 2,
                required: 1
            })
        );
    }

    #[test]
    fn deserialize_rejects_trailing_bytes() {
        let kp = Keypair::generate();
        let mut tx = unsigned_transfer(&kp);
        sign_transaction(&mut tx, &kp).unwrap();
        let mut bytes = tx.serialize().unwrap();
        bytes.push(0);
        assert_eq!(
            Transaction::deserialize(&bytes),
            Err(WireError::TrailingBytes(1))
        );
    }
}

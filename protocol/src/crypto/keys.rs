//! # Key Management
//!
//! Ed25519 keypairs, public keys (a.k.a. addresses) and signatures, in the
//! shapes the ledger expects them: raw bytes on the wire, base58 everywhere
//! a human might look.
//!
//! ## Formats
//!
//! - [`Pubkey`]: 32 bytes. Displayed as base58 (32-44 chars).
//! - [`Signature`]: 64 bytes. Displayed as base58 (up to 88 chars). This is
//!   the transaction id, and it is what grind predicates look at.
//! - [`Keypair`]: exported as 64 bytes: the 32-byte secret seed followed by
//!   the 32-byte public key. Same layout the reference CLI writes to disk.
//!
//! ## Security considerations
//!
//! - Private keys are zeroized on drop (thanks, ed25519-dalek).
//! - Key generation uses `OsRng`.
//! - Key bytes are never logged. If you add logging to this module,
//!   you will be asked to leave.

use std::fmt;
use std::str::FromStr;

use curve25519_dalek::edwards::CompressedEdwardsY;
use ed25519_dalek::{Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::config::{KEYPAIR_LENGTH, PUBKEY_LENGTH, SECRET_KEY_LENGTH, SIGNATURE_LENGTH};

/// Base58 of 32 bytes never exceeds 44 characters. Anything longer is not
/// worth decoding.
const MAX_BASE58_PUBKEY_LEN: usize = 44;

/// Same bound for 64-byte values.
const MAX_BASE58_SIGNATURE_LEN: usize = 88;

/// Errors that can occur during key operations.
///
/// These say nothing about *why* something failed. Leaking
/// details about key material through error messages is a classic footgun.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("invalid secret key: wrong length or not valid base58")]
    InvalidSecretKey,

    #[error("invalid public key: expected 32 base58-encoded bytes")]
    InvalidPublicKey,

    #[error("invalid signature: expected 64 base58-encoded bytes")]
    InvalidSignature,

    #[error("keypair validation failed: public key does not match secret key")]
    KeypairMismatch,
}

// ---------------------------------------------------------------------------
// Keypair
// ---------------------------------------------------------------------------

/// An Ed25519 signing keypair.
///
/// `Keypair` intentionally does NOT implement `Serialize`/`Deserialize`.
/// Exporting a private key should be a deliberate act; use
/// [`to_bytes`](Self::to_bytes) or [`to_base58_string`](Self::to_base58_string).
///
/// # Examples
///
/// ```
/// use quarry_protocol::crypto::Keypair;
///
/// let kp = Keypair::generate();
/// let sig = kp.sign(b"send 1 SOL to alice");
/// assert!(sig.verify(&kp.pubkey(), b"send 1 SOL to alice"));
/// ```
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Generate a fresh keypair from the OS RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Constructs a keypair deterministically from a 32-byte seed.
    ///
    /// **Warning**: a weak seed makes a weak key.
    pub fn from_seed(seed: &[u8; SECRET_KEY_LENGTH]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Reconstruct a keypair from its 64-byte export (secret || public).
    ///
    /// The public half is not trusted: it is re-derived from the secret half
    /// and compared. A mismatch means the blob is corrupt or was stitched
    /// together from two different keys, and either way we want no part of it.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() != KEYPAIR_LENGTH {
            return Err(KeyError::InvalidSecretKey);
        }
        let mut seed = [0u8; SECRET_KEY_LENGTH];
        seed.copy_from_slice(&bytes[..SECRET_KEY_LENGTH]);
        let keypair = Self::from_seed(&seed);

        if keypair.pubkey().as_ref() != &bytes[SECRET_KEY_LENGTH..] {
            return Err(KeyError::KeypairMismatch);
        }
        Ok(keypair)
    }

    /// Parse the base58 form of [`to_bytes`](Self::to_bytes).
    pub fn from_base58_string(encoded: &str) -> Result<Self, KeyError> {
        let bytes = bs58::decode(encoded.trim())
            .into_vec()
            .map_err(|_| KeyError::InvalidSecretKey)?;
        Self::from_bytes(&bytes)
    }

    /// The 64-byte export: secret seed followed by public key.
    ///
    /// **Handle with extreme care.** Don't log it. Don't paste it in chat.
    pub fn to_bytes(&self) -> [u8; KEYPAIR_LENGTH] {
        self.signing_key.to_keypair_bytes()
    }

    /// Base58 of [`to_bytes`](Self::to_bytes). This is the string wallets
    /// import and export.
    pub fn to_base58_string(&self) -> String {
        bs58::encode(self.to_bytes()).into_string()
    }

    /// The raw 32-byte secret seed.
    pub fn secret_key_bytes(&self) -> [u8; SECRET_KEY_LENGTH] {
        self.signing_key.to_bytes()
    }

    /// The public key, which is also the account address.
    pub fn pubkey(&self) -> Pubkey {
        Pubkey(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign a message. Deterministic: same key, same message, same signature.
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.signing_key.sign(message).to_bytes())
    }
}

impl Clone for Keypair {
    /// Every copy of a private key is another thing to protect.
    fn clone(&self) -> Self {
        Self::from_seed(&self.signing_key.to_bytes())
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print secret key material in debug output. Not even "partially."
        write!(f, "Keypair(pub={})", self.pubkey())
    }
}

impl PartialEq for Keypair {
    /// Compare public halves only; comparing secrets in non-constant time is
    /// a bad habit.
    fn eq(&self, other: &Self) -> bool {
        self.pubkey() == other.pubkey()
    }
}

impl Eq for Keypair {}

// ---------------------------------------------------------------------------
// Pubkey
// ---------------------------------------------------------------------------

/// A 32-byte account address.
///
/// Not every address is an Ed25519 point: program-derived addresses are
/// deliberately *off* the curve so that no private key can exist for them.
/// [`Pubkey::is_on_curve`] tells the two apart.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pubkey([u8; PUBKEY_LENGTH]);

impl Pubkey {
    /// Wrap raw bytes. `const` so program ids can be constants.
    pub const fn new_from_array(bytes: [u8; PUBKEY_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Try to build a pubkey from a slice. Length is the only check.
    pub fn try_from_slice(slice: &[u8]) -> Result<Self, KeyError> {
        let bytes: [u8; PUBKEY_LENGTH] =
            slice.try_into().map_err(|_| KeyError::InvalidPublicKey)?;
        Ok(Self(bytes))
    }

    /// Raw bytes.
    pub fn to_bytes(self) -> [u8; PUBKEY_LENGTH] {
        self.0
    }

    /// `true` if these bytes decompress to a point on the Ed25519 curve.
    pub fn is_on_curve(&self) -> bool {
        CompressedEdwardsY(self.0).decompress().is_some()
    }

    /// Convert to a dalek `VerifyingKey`. Fails for off-curve addresses.
    pub fn to_verifying_key(&self) -> Result<VerifyingKey, KeyError> {
        VerifyingKey::from_bytes(&self.0).map_err(|_| KeyError::InvalidPublicKey)
    }
}

impl AsRef<[u8]> for Pubkey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl FromStr for Pubkey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() > MAX_BASE58_PUBKEY_LEN {
            return Err(KeyError::InvalidPublicKey);
        }
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|_| KeyError::InvalidPublicKey)?;
        Self::try_from_slice(&bytes)
    }
}

impl fmt::Display for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pubkey({})", self)
    }
}

impl Serialize for Pubkey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Pubkey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Signature
// ---------------------------------------------------------------------------

/// A 64-byte Ed25519 signature.
///
/// The first signature of a transaction doubles as its id, so this is the
/// value the grind predicate sees (via its base58 `Display`).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature([u8; SIGNATURE_LENGTH]);

impl Signature {
    /// Wrap raw bytes.
    pub const fn from_bytes(bytes: [u8; SIGNATURE_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Try to build a signature from a slice.
    pub fn try_from_slice(slice: &[u8]) -> Result<Self, KeyError> {
        let bytes: [u8; SIGNATURE_LENGTH] =
            slice.try_into().map_err(|_| KeyError::InvalidSignature)?;
        Ok(Self(bytes))
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LENGTH] {
        &self.0
    }

    /// Verify against a public key and message. Strict verification; an
    /// off-curve key simply fails.
    pub fn verify(&self, pubkey: &Pubkey, message: &[u8]) -> bool {
        let Ok(verifying_key) = pubkey.to_verifying_key() else {
            return false;
        };
        verifying_key
            .verify(message, &DalekSignature::from_bytes(&self.0))
            .is_ok()
    }
}

impl Default for Signature {
    /// All zeroes. This is what an unsigned slot looks like on the wire.
    fn default() -> Self {
        Self([0u8; SIGNATURE_LENGTH])
    }
}

impl FromStr for Signature {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() > MAX_BASE58_SIGNATURE_LEN {
            return Err(KeyError::InvalidSignature);
        }
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|_| KeyError::InvalidSignature)?;
        Self::try_from_slice(&bytes)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b58 = self.to_string();
        if b58.len() > 16 {
            write!(f, "Signature({}...{})", &b58[..8], &b58[b58.len() - 8..])
        } else {
            write!(f, "Signature({})", b58)
        }
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keypair_sign_verify_roundtrip() {
        let kp = Keypair::generate();
        let msg = b"transfer 100 lamports";
        let sig = kp.sign(msg);
        assert!(sig.verify(&kp.pubkey(), msg));
    }

    #[test]
    fn wrong_message_fails_verification() {
        let kp = Keypair::generate();
        let sig = kp.sign(b"correct message");
        assert!(!sig.verify(&kp.pubkey(), b"wrong message"));
    }

    #[test]
    fn wrong_key_fails_verification() {
        let kp1 = Keypair::generate();
        let kp2 = Keypair::generate();
        let sig = kp1.sign(b"message");
        assert!(!sig.verify(&kp2.pubkey(), b"message"));
    }

    #[test]
    fn test_roundtrip_bytes() {
        let kp = Keypair::generate();
        let restored = Keypair::from_bytes(&kp.to_bytes()).unwrap();
        assert_eq!(kp.pubkey(), restored.pubkey());
        assert_eq!(kp.secret_key_bytes(), restored.secret_key_bytes());
    }

    #[test]
    fn test_roundtrip_base58() {
        let kp = Keypair::generate();
        let restored = Keypair::from_base58_string(&kp.to_base58_string()).unwrap();
        assert_eq!(kp, restored);
    }

    #[test]
    fn test_export_layout_is_secret_then_public() {
        let kp = Keypair::from_seed(&[9u8; 32]);
        let bytes = kp.to_bytes();
        assert_eq!(&bytes[..32], &[9u8; 32]);
        assert_eq!(&bytes[32..], kp.pubkey().as_ref());
    }

    #[test]
    fn test_mismatched_public_half_rejected() {
        let kp = Keypair::generate();
        let other = Keypair::generate();
        let mut bytes = kp.to_bytes();
        bytes[32..].copy_from_slice(other.pubkey().as_ref());
        assert_eq!(Keypair::from_bytes(&bytes), Err(KeyError::KeypairMismatch));
    }

    #[test]
    fn test_invalid_base58_rejected() {
        // '0' and 'l' are not in the base58 alphabet.
        assert_eq!(
            Keypair::from_base58_string("0OIl"),
            Err(KeyError::InvalidSecretKey)
        );
        // Valid base58, wrong length.
        assert_eq!(
            Keypair::from_base58_string("3mJr7AoUXx2Wqd"),
            Err(KeyError::InvalidSecretKey)
        );
    }

    #[test]
    fn test_two_generated_keypairs_are_different() {
        // If this fails, your RNG is broken and you should panic (the emotion,
        // not the macro). Well, actually, both.
        let kp1 = Keypair::generate();
        let kp2 = Keypair::generate();
        assert_ne!(kp1.pubkey(), kp2.pubkey());
    }

    #[test]
    fn deterministic_from_seed() {
        let seed = [42u8; 32];
        assert_eq!(
            Keypair::from_seed(&seed).pubkey(),
            Keypair::from_seed(&seed).pubkey()
        );
    }

    #[test]
    fn test_deterministic_signatures() {
        let kp = Keypair::generate();
        let msg = b"determinism is underrated";
        assert_eq!(kp.sign(msg), kp.sign(msg));
    }

    #[test]
    fn debug_does_not_leak_secret() {
        let kp = Keypair::generate();
        let debug_str = format!("{:?}", kp);
        assert!(debug_str.starts_with("Keypair(pub="));
        assert!(!debug_str.contains(&kp.to_base58_string()));
    }

    #[test]
    fn pubkey_base58_roundtrip() {
        let pk = Keypair::generate().pubkey();
        let parsed: Pubkey = pk.to_string().parse().unwrap();
        assert_eq!(pk, parsed);
    }

    #[test]
    fn system_program_id_is_all_ones_in_base58() {
        assert_eq!(
            Pubkey::default().to_string(),
            "11111111111111111111111111111111"
        );
    }

    #[test]
    fn pubkey_parse_rejects_garbage() {
        assert!("not a key".parse::<Pubkey>().is_err());
        assert!("abc".parse::<Pubkey>().is_err());
        assert!("1".repeat(60).parse::<Pubkey>().is_err());
    }

    #[test]
    fn generated_pubkeys_are_on_curve() {
        for _ in 0..8 {
            assert!(Keypair::generate().pubkey().is_on_curve());
        }
    }

    #[test]
    fn signature_base58_roundtrip() {
        let kp = Keypair::generate();
        let sig = kp.sign(b"test");
        let parsed: Signature = sig.to_string().parse().unwrap();
        assert_eq!(sig, parsed);
    }

    #[test]
    fn signature_serde_uses_base58_string() {
        let sig = Keypair::generate().sign(b"serde");
        let json = serde_json::to_string(&sig).unwrap();
        assert_eq!(json, format!("\"{}\"", sig));
        let back: Signature = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sig);
    }

    #[test]
    fn default_signature_is_zeroed() {
        assert_eq!(Signature::default().as_bytes(), &[0u8; 64]);
    }
}

//! Core value types for transactions.
//!
//! These are the nouns of the transaction layer: the freshness reference
//! (`Hash`), uncompiled instructions and their account metadata, and the
//! decimal token amount with its truncating conversion to base units.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::config::HASH_LENGTH;
use crate::crypto::keys::Pubkey;

// ---------------------------------------------------------------------------
// Hash
// ---------------------------------------------------------------------------

/// A recent blockhash: the freshness reference every transaction embeds.
///
/// It bounds the transaction's validity window (roughly 150 blocks) and is
/// the only input that changes between otherwise identical builds, which is
/// why the grind loop fetches a new one for every attempt.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash([u8; HASH_LENGTH]);

impl Hash {
    pub const fn new_from_array(bytes: [u8; HASH_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn to_bytes(self) -> [u8; HASH_LENGTH] {
        self.0
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A blockhash string that didn't decode to 32 bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid blockhash: {0}")]
pub struct ParseHashError(pub String);

impl FromStr for Hash {
    type Err = ParseHashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|_| ParseHashError(s.to_string()))?;
        let arr: [u8; HASH_LENGTH] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| ParseHashError(s.to_string()))?;
        Ok(Self(arr))
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self)
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Instructions
// ---------------------------------------------------------------------------

/// One account an instruction touches, and how.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountMeta {
    pub pubkey: Pubkey,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountMeta {
    /// Writable account.
    pub fn new(pubkey: Pubkey, is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: true,
        }
    }

    /// Read-only account.
    pub fn new_readonly(pubkey: Pubkey, is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: false,
        }
    }
}

/// A program invocation before it is compiled into a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub program_id: Pubkey,
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
}

// ---------------------------------------------------------------------------
// TokenAmount
// ---------------------------------------------------------------------------

/// Errors converting a human amount into base units.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("amount must not be negative: {0}")]
    Negative(String),

    #[error("amount is not a finite decimal number: {0}")]
    Malformed(String),

    #[error("amount {0} does not fit in 64-bit base units")]
    Overflow(String),
}

/// A token amount held as integer base units plus the decimal exponent that
/// gives them meaning.
///
/// Conversion from human units *truncates*: with 6 decimals, `1.5` is
/// `1_500_000` and `0.0000001` is `0`. Nobody gets rounded up into sending
/// more than they typed.
///
/// # Examples
///
/// ```
/// use quarry_protocol::transaction::TokenAmount;
///
/// let amt = TokenAmount::from_ui(1.5, 6).unwrap();
/// assert_eq!(amt.base_units(), 1_500_000);
/// assert_eq!(amt.to_string(), "1.500000");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenAmount {
    base_units: u64,
    decimals: u8,
}

impl TokenAmount {
    pub fn from_base_units(base_units: u64, decimals: u8) -> Self {
        Self {
            base_units,
            decimals,
        }
    }

    /// Convert a float amount.
    ///
    /// The float is rendered with its shortest round-trip representation
    /// first and the digits are then truncated exactly, so `0.000003` really
    /// is 3 base units and not `2.9999999999999996` floored to 2.
    pub fn from_ui(amount: f64, decimals: u8) -> Result<Self, AmountError> {
        if !amount.is_finite() {
            return Err(AmountError::Malformed(amount.to_string()));
        }
        if amount == 0.0 {
            return Ok(Self::from_base_units(0, decimals));
        }
        Self::from_decimal_str(&amount.to_string(), decimals)
    }

    /// Parse a plain decimal string (`"12"`, `"0.25"`, `".5"`), truncating
    /// any digits past `decimals`.
    pub fn from_decimal_str(s: &str, decimals: u8) -> Result<Self, AmountError> {
        let trimmed = s.trim();
        if trimmed.starts_with('-') {
            return Err(AmountError::Negative(trimmed.to_string()));
        }
        let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);
        let (whole, frac) = match unsigned.split_once('.') {
            Some((w, f)) => (w, f),
            None => (unsigned, ""),
        };
        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if (whole.is_empty() && frac.is_empty()) || !all_digits(whole) || !all_digits(frac) {
            return Err(AmountError::Malformed(trimmed.to_string()));
        }

        let overflow = || AmountError::Overflow(trimmed.to_string());
        let scale = 10u128
            .checked_pow(u32::from(decimals))
            .ok_or_else(overflow)?;

        let whole_value = if whole.is_empty() {
            0u128
        } else {
            whole.parse::<u128>().map_err(|_| overflow())?
        };

        // Keep at most `decimals` fractional digits, right-padded with zeros.
        let kept: String = frac
            .chars()
            .chain(std::iter::repeat('0'))
            .take(usize::from(decimals))
            .collect();
        let frac_value = if kept.is_empty() {
            0u128
        } else {
            kept.parse::<u128>().map_err(|_| overflow())?
        };

        let total = whole_value
            .checked_mul(scale)
            .and_then(|v| v.checked_add(frac_value))
            .ok_or_else(overflow)?;
        let base_units = u64::try_from(total).map_err(|_| overflow())?;
        Ok(Self::from_base_units(base_units, decimals))
    }

    pub fn base_units(&self) -> u64 {
        self.base_units
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    /// Back to human units. Lossy above 2^53 base units, which is fine for
    /// display and balances.
    pub fn to_ui(&self) -> f64 {
        self.base_units as f64 / 10f64.powi(i32::from(self.decimals))
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.decimals == 0 {
            return write!(f, "{}", self.base_units);
        }
        let scale = 10u128.pow(u32::from(self.decimals));
        let value = u128::from(self.base_units);
        write!(
            f,
            "{}.{:0>width$}",
            value / scale,
            value % scale,
            width = usize::from(self.decimals)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ui_amount_truncates_to_six_decimals() {
        assert_eq!(TokenAmount::from_ui(1.5, 6).unwrap().base_units(), 1_500_000);
        assert_eq!(TokenAmount::from_ui(0.0000001, 6).unwrap().base_units(), 0);
        assert_eq!(TokenAmount::from_ui(0.0000019, 6).unwrap().base_units(), 1);
        assert_eq!(TokenAmount::from_ui(2.0, 6).unwrap().base_units(), 2_000_000);
    }

    #[test]
    fn ui_amount_is_exact_where_naive_float_math_is_not() {
        // 0.000003 * 1e6 == 2.9999999999999996 in f64.
        assert_eq!(TokenAmount::from_ui(0.000003, 6).unwrap().base_units(), 3);
        assert_eq!(TokenAmount::from_ui(0.29, 6).unwrap().base_units(), 290_000);
    }

    #[test]
    fn ui_amount_rejects_nonsense() {
        assert!(matches!(
            TokenAmount::from_ui(-1.0, 6),
            Err(AmountError::Negative(_))
        ));
        assert!(matches!(
            TokenAmount::from_ui(f64::NAN, 6),
            Err(AmountError::Malformed(_))
        ));
        assert!(matches!(
            TokenAmount::from_ui(f64::INFINITY, 6),
            Err(AmountError::Malformed(_))
        ));
        assert!(matches!(
            TokenAmount::from_ui(1e30, 6),
            Err(AmountError::Overflow(_))
        ));
    }

    #[test]
    fn negative_zero_is_zero() {
        assert_eq!(TokenAmount::from_ui(-0.0, 6).unwrap().base_units(), 0);
    }

    #[test]
    fn decimal_str_forms() {
        assert_eq!(
            TokenAmount::from_decimal_str("12", 6).unwrap().base_units(),
            12_000_000
        );
        assert_eq!(
            TokenAmount::from_decimal_str(".5", 6).unwrap().base_units(),
            500_000
        );
        assert_eq!(
            TokenAmount::from_decimal_str("7.", 6).unwrap().base_units(),
            7_000_000
        );
        assert_eq!(
            TokenAmount::from_decimal_str("1.23456789", 6)
                .unwrap()
                .base_units(),
            1_234_567
        );
        assert!(TokenAmount::from_decimal_str(".", 6).is_err());
        assert!(TokenAmount::from_decimal_str("1.2.3", 6).is_err());
        assert!(TokenAmount::from_decimal_str("1e5", 6).is_err());
    }

    #[test]
    fn display_pads_fraction() {
        assert_eq!(TokenAmount::from_base_units(1_500_000, 6).to_string(), "1.500000");
        assert_eq!(TokenAmount::from_base_units(42, 6).to_string(), "0.000042");
        assert_eq!(TokenAmount::from_base_units(42, 0).to_string(), "42");
    }

    #[test]
    fn to_ui_divides_by_exponent() {
        assert_eq!(TokenAmount::from_base_units(2_500_000, 6).to_ui(), 2.5);
        assert_eq!(TokenAmount::from_base_units(1_000_000_000, 9).to_ui(), 1.0);
    }

    #[test]
    fn hash_base58_roundtrip() {
        let hash = Hash::new_from_array([3u8; 32]);
        let parsed: Hash = hash.to_string().parse().unwrap();
        assert_eq!(hash, parsed);
        assert!("xyz".parse::<Hash>().is_err());
    }
}

//! Built-in acceptance predicates.
//!
//! The engine accepts any `Fn(&Signature) -> bool`. These are the ones
//! people actually want: "the signature starts with / ends with / contains
//! this string", i.e. vanity transaction ids.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::keys::Signature;

/// The base58 alphabet. No `0`, `O`, `I` or `l`.
const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Longest base58 rendering of a 64-byte signature.
const MAX_SIGNATURE_CHARS: usize = 88;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("pattern is empty")]
    Empty,

    #[error("'{0}' can never appear in a base58 signature")]
    InvalidCharacter(char),

    #[error("pattern of {0} characters is longer than any signature")]
    TooLong(usize),
}

/// Where the pattern has to appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Prefix,
    Suffix,
    Contains,
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MatchKind::Prefix => "prefix",
            MatchKind::Suffix => "suffix",
            MatchKind::Contains => "contains",
        })
    }
}

/// A validated "signature looks like this" predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignaturePattern {
    kind: MatchKind,
    pattern: String,
    ignore_case: bool,
}

impl SignaturePattern {
    /// Build and validate a pattern. Characters outside the base58 alphabet
    /// are rejected up front: a pattern that can never match would make the
    /// grind loop burn its whole budget for nothing.
    pub fn new(
        kind: MatchKind,
        pattern: impl Into<String>,
        ignore_case: bool,
    ) -> Result<Self, PatternError> {
        let pattern: String = pattern.into();
        if pattern.is_empty() {
            return Err(PatternError::Empty);
        }
        let len = pattern.chars().count();
        if len > MAX_SIGNATURE_CHARS {
            return Err(PatternError::TooLong(len));
        }
        if let Some(bad) = pattern
            .chars()
            .find(|c| case_variants_in_alphabet(*c, ignore_case) == 0)
        {
            return Err(PatternError::InvalidCharacter(bad));
        }
        let pattern = if ignore_case {
            pattern.to_ascii_lowercase()
        } else {
            pattern
        };
        Ok(Self {
            kind,
            pattern,
            ignore_case,
        })
    }

    pub fn prefix(pattern: impl Into<String>) -> Result<Self, PatternError> {
        Self::new(MatchKind::Prefix, pattern, false)
    }

    pub fn suffix(pattern: impl Into<String>) -> Result<Self, PatternError> {
        Self::new(MatchKind::Suffix, pattern, false)
    }

    pub fn contains(pattern: impl Into<String>) -> Result<Self, PatternError> {
        Self::new(MatchKind::Contains, pattern, false)
    }

    pub fn kind(&self) -> MatchKind {
        self.kind
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Match against the base58 text of a signature.
    pub fn matches_str(&self, encoded: &str) -> bool {
        let lowered;
        let haystack = if self.ignore_case {
            lowered = encoded.to_ascii_lowercase();
            lowered.as_str()
        } else {
            encoded
        };
        match self.kind {
            MatchKind::Prefix => haystack.starts_with(&self.pattern),
            MatchKind::Suffix => haystack.ends_with(&self.pattern),
            MatchKind::Contains => haystack.contains(&self.pattern),
        }
    }

    pub fn matches(&self, signature: &Signature) -> bool {
        self.matches_str(&signature.to_string())
    }

    /// Rough number of attempts before the first match, treating base58
    /// digits as uniform. They aren't quite (the leading digit of a 64-byte
    /// value is skewed), so read this as an order of magnitude.
    pub fn expected_attempts(&self) -> f64 {
        let per_char: f64 = self
            .pattern
            .chars()
            .map(|c| 58.0 / case_variants_in_alphabet(c, self.ignore_case) as f64)
            .product();
        match self.kind {
            MatchKind::Prefix | MatchKind::Suffix => per_char,
            MatchKind::Contains => {
                let positions = (MAX_SIGNATURE_CHARS + 1).saturating_sub(self.pattern.len()).max(1);
                (per_char / positions as f64).max(1.0)
            }
        }
    }

    /// Turn into a closure the engine can take.
    pub fn into_predicate(self) -> impl Fn(&Signature) -> bool + Send + Sync {
        move |sig| self.matches(sig)
    }
}

impl fmt::Display for SignaturePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}", self.kind, self.pattern)?;
        if self.ignore_case {
            f.write_str(" (ignore case)")?;
        }
        Ok(())
    }
}

/// Accept when any pattern matches.
pub fn any_of(patterns: Vec<SignaturePattern>) -> impl Fn(&Signature) -> bool + Send + Sync {
    move |sig| {
        let encoded = sig.to_string();
        patterns.iter().any(|p| p.matches_str(&encoded))
    }
}

/// Accept when every pattern matches.
pub fn all_of(patterns: Vec<SignaturePattern>) -> impl Fn(&Signature) -> bool + Send + Sync {
    move |sig| {
        let encoded = sig.to_string();
        patterns.iter().all(|p| p.matches_str(&encoded))
    }
}

/// How many spellings of `c` exist in the alphabet: 0, 1 or (case
/// insensitive letters) 2.
fn case_variants_in_alphabet(c: char, ignore_case: bool) -> usize {
    if !ignore_case {
        return usize::from(BASE58_ALPHABET.contains(c));
    }
    let lower = c.to_ascii_lowercase();
    let upper = c.to_ascii_uppercase();
    if lower == upper {
        usize::from(BASE58_ALPHABET.contains(c))
    } else {
        usize::from(BASE58_ALPHABET.contains(lower)) + usize::from(BASE58_ALPHABET.contains(upper))
    }
}

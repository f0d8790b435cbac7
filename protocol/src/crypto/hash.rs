//! # Hashing Utilities
//!
//! SHA-256 and nothing else. The ledger uses it for program-derived
//! addresses, and that is the only hashing this crate needs to agree with
//! anyone else about.

use sha2::{Digest, Sha256};

/// SHA-256 of a single buffer.
///
/// # Example
///
/// ```
/// use quarry_protocol::crypto::sha256;
///
/// let hash = sha256(b"quarry");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> [u8; 32] {
    sha256v(&[data])
}

/// SHA-256 over the concatenation of several buffers, without actually
/// concatenating them. Program-address derivation hashes seeds, program id
/// and a marker back to back, which is exactly this.
pub fn sha256v(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        // SHA-256("abc") from FIPS 180-2.
        let expected: [u8; 32] = [
            0xba, 0x78, 0x16, 0xbf, 0x8f, 0x01, 0xcf, 0xea, 0x41, 0x41, 0x40, 0xde, 0x5d, 0xae,
            0x22, 0x23, 0xb0, 0x03, 0x61, 0xa3, 0x96, 0x17, 0x7a, 0x9c, 0xb4, 0x10, 0xff, 0x61,
            0xf2, 0x00, 0x15, 0xad,
        ];
        assert_eq!(sha256(b"abc"), expected);
    }

    #[test]
    fn test_sha256v_matches_concatenation() {
        let joined = sha256(b"hello world");
        let parts = sha256v(&[b"hello", b" ", b"world"]);
        assert_eq!(joined, parts);
    }

    #[test]
    fn test_empty_parts() {
        assert_eq!(sha256v(&[]), sha256(b""));
    }
}

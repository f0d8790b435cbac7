//! # Cryptographic Primitives
//!
//! Thin, type-safe wrappers around audited implementations:
//!
//! - **Ed25519** (`ed25519-dalek`) for identities and signatures.
//! - **Curve25519** (`curve25519-dalek`) for the on-curve check that
//!   program-derived addresses rely on.
//! - **SHA-256** (`sha2`) for address derivation.
//!
//! We don't roll our own. If you're tempted to optimize these functions,
//! please reconsider. Then reconsider again.

pub mod hash;
pub mod keys;

pub use hash::{sha256, sha256v};
pub use keys::{KeyError, Keypair, Pubkey, Signature};

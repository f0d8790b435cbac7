//! # Vault Module
//!
//! Where the money is, read-only edition: which token we move on each
//! network, and how much of it (and of the native currency) an address
//! holds.
//!
//! ```text
//! token.rs   - per-network token registry (mint, symbol, decimals)
//! balance.rs - native and token balance queries in human units
//! ```

pub mod balance;
pub mod token;

pub use balance::{BalanceError, BalanceQuery};
pub use token::{usdc, TokenDescriptor, TokenInfo};

//! # Network Module
//!
//! Everything that crosses the process boundary: the [`LedgerGateway`]
//! capability the rest of the crate is written against, and its two
//! implementations.
//!
//! ## Architecture
//!
//! ```text
//! gateway.rs - LedgerGateway trait, AccountInfo, GatewayError
//! rpc.rs     - JSON-RPC 2.0 request/response types and error-code mapping
//! client.rs  - RpcGateway: the trait over HTTP with reqwest
//! memory.rs  - InMemoryGateway: deterministic test double
//! ```
//!
//! ## Design Decisions
//!
//! - The gateway is always injected (`&dyn LedgerGateway` or
//!   `Arc<dyn LedgerGateway>`), never a global. Swapping the real cluster
//!   for the in-memory one is a constructor argument.
//! - No gateway method retries. A transient failure is reported as
//!   [`GatewayError::NetworkUnavailable`] or [`GatewayError::RateLimited`]
//!   and the grind loop owns the backoff policy.
//! - `InMemoryGateway` uses `parking_lot::Mutex` for its state: every
//!   critical section is a handful of map operations and never spans an
//!   `.await`.

pub mod client;
pub mod gateway;
pub mod memory;
pub mod rpc;

pub use client::RpcGateway;
pub use gateway::{AccountInfo, GatewayError, LedgerGateway};
pub use memory::{InMemoryGateway, Operation};
pub use rpc::{RpcError, RpcMethod, RpcRequest, RpcResponse};

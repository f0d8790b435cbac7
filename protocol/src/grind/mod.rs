//! # Grind Module
//!
//! Rebuild a transfer until its signature satisfies a predicate, then
//! submit it once.
//!
//! ```text
//! policy.rs    - GrindPolicy: attempt budget and pacing
//! predicate.rs - SignaturePattern and friends
//! engine.rs    - GrindEngine, the loop itself, and submit_if_accepted
//! ```

pub mod engine;
pub mod policy;
pub mod predicate;

pub use engine::{
    submit_if_accepted, GrindEngine, GrindError, GrindOutcome, GrindState, TransferRequest,
};
pub use policy::GrindPolicy;
pub use predicate::{all_of, any_of, MatchKind, PatternError, SignaturePattern};

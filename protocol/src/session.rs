//! # Session
//!
//! The one-stop handle: pick a network, get identities, build, grind,
//! check balances. Everything here is a thin layer over the modules that
//! do the work; the session just remembers which network you're on and
//! which gateway talks to it.
//!
//! ```no_run
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! use quarry_protocol::grind::{SignaturePattern, TransferRequest};
//! use quarry_protocol::{Network, Session};
//!
//! let session = Session::connect(Network::Devnet)?;
//! let me = session.create_identity();
//! let request = TransferRequest::native("9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin", 100_000);
//! let pattern = SignaturePattern::prefix("ab")?;
//! let outcome = session.grind(&me, &request, pattern.into_predicate(), 500).await?;
//! println!("{:?}", outcome.signature);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use crate::config::Network;
use crate::crypto::keys::{Pubkey, Signature};
use crate::grind::{
    submit_if_accepted, GrindEngine, GrindError, GrindOutcome, GrindPolicy, TransferRequest,
};
use crate::identity::{Identity, IdentityError};
use crate::network::client::RpcGateway;
use crate::network::gateway::{GatewayError, LedgerGateway};
use crate::transaction::builder::{BuildError, SignedTransaction, TransactionBuilder};
use crate::vault::balance::{BalanceError, BalanceQuery};

/// Makes a gateway for a network. Called once at construction and again on
/// every [`Session::switch_network`].
pub type GatewayFactory =
    Arc<dyn Fn(Network) -> Result<Arc<dyn LedgerGateway>, GatewayError> + Send + Sync>;

/// Wrap a closure as a [`GatewayFactory`].
pub fn gateway_factory<F>(f: F) -> GatewayFactory
where
    F: Fn(Network) -> Result<Arc<dyn LedgerGateway>, GatewayError> + Send + Sync + 'static,
{
    Arc::new(f)
}

pub struct Session {
    network: Network,
    gateway: Arc<dyn LedgerGateway>,
    factory: GatewayFactory,
    policy: GrindPolicy,
}

impl Session {
    /// A session over the network's public JSON-RPC endpoint.
    pub fn connect(network: Network) -> Result<Self, GatewayError> {
        Self::with_factory(
            network,
            gateway_factory(|network| {
                Ok(Arc::new(RpcGateway::new(network)?) as Arc<dyn LedgerGateway>)
            }),
        )
    }

    /// A session whose gateways come from `factory` (a custom RPC URL, an
    /// in-memory ledger, ...).
    pub fn with_factory(network: Network, factory: GatewayFactory) -> Result<Self, GatewayError> {
        let gateway = factory(network)?;
        Ok(Self {
            network,
            gateway,
            factory,
            policy: GrindPolicy::default(),
        })
    }

    /// Replace the grind policy used by [`Session::grind`].
    pub fn with_policy(mut self, policy: GrindPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn gateway(&self) -> &dyn LedgerGateway {
        self.gateway.as_ref()
    }

    pub fn policy(&self) -> &GrindPolicy {
        &self.policy
    }

    /// Point the session at another network. The gateway is rebuilt; if
    /// that fails the session stays where it was.
    pub fn switch_network(&mut self, network: Network) -> Result<(), GatewayError> {
        let gateway = (self.factory)(network)?;
        info!(from = %self.network, to = %network, "switching network");
        self.network = network;
        self.gateway = gateway;
        Ok(())
    }

    // -- identities ---------------------------------------------------------

    pub fn create_identity(&self) -> Identity {
        Identity::create()
    }

    pub fn restore_identity(&self, encoded_secret: &str) -> Result<Identity, IdentityError> {
        Identity::restore(encoded_secret)
    }

    // -- building and submitting -------------------------------------------

    pub async fn build_native_transfer(
        &self,
        identity: &Identity,
        recipient: &str,
        lamports: u64,
    ) -> Result<SignedTransaction, BuildError> {
        TransactionBuilder::new(self.gateway())
            .native_transfer(identity, recipient, lamports)
            .await
    }

    pub async fn build_token_transfer(
        &self,
        identity: &Identity,
        recipient: &str,
        amount: f64,
    ) -> Result<SignedTransaction, BuildError> {
        TransactionBuilder::new(self.gateway())
            .token_transfer(identity, recipient, amount)
            .await
    }

    /// Broadcast `signed` only if `predicate` accepts its signature.
    pub async fn submit_if_accepted<F>(
        &self,
        signed: &SignedTransaction,
        predicate: F,
    ) -> Result<Option<Signature>, GatewayError>
    where
        F: Fn(&Signature) -> bool,
    {
        submit_if_accepted(self.gateway(), signed, predicate).await
    }

    /// Grind with the session policy, overriding its attempt budget.
    pub async fn grind<F>(
        &self,
        identity: &Identity,
        request: &TransferRequest,
        predicate: F,
        attempt_budget: u32,
    ) -> Result<GrindOutcome, GrindError>
    where
        F: Fn(&Signature) -> bool,
    {
        self.grind_with_shutdown(identity, request, predicate, attempt_budget, None)
            .await
    }

    /// [`Session::grind`] that also stops when `shutdown` flips to `true`.
    pub async fn grind_with_shutdown<F>(
        &self,
        identity: &Identity,
        request: &TransferRequest,
        predicate: F,
        attempt_budget: u32,
        shutdown: Option<watch::Receiver<bool>>,
    ) -> Result<GrindOutcome, GrindError>
    where
        F: Fn(&Signature) -> bool,
    {
        let policy = self.policy.clone().with_attempt_budget(attempt_budget);
        GrindEngine::new(self.gateway(), policy)
            .grind_until(identity, request, predicate, shutdown)
            .await
    }

    // -- balances -----------------------------------------------------------

    /// Native balance of `address` in whole units.
    pub async fn native_balance(&self, address: &str) -> Result<f64, BalanceError> {
        let owner = parse_owner(address)?;
        BalanceQuery::new(self.gateway()).native_balance(&owner).await
    }

    /// Token balance of `address` in whole tokens. Zero if it never held
    /// any.
    pub async fn token_balance(&self, address: &str) -> Result<f64, BalanceError> {
        let owner = parse_owner(address)?;
        BalanceQuery::new(self.gateway()).token_balance(&owner).await
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("network", &self.network)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

fn parse_owner(address: &str) -> Result<Pubkey, BalanceError> {
    address
        .trim()
        .parse()
        .map_err(|_| BalanceError::InvalidAddress(address.to_string()))
}

//! # The Grind Loop
//!
//! Build, sign, look at the signature, and either broadcast or try again.
//!
//! ## How it works
//!
//! Each iteration:
//!
//! 1. **Building**: build and sign the transfer with a fresh blockhash.
//! 2. **Evaluating**: hand the signature to the caller's predicate.
//! 3. **Submitting**: if the predicate said yes, broadcast exactly once and
//!    finish **Accepted**.
//! 4. Otherwise pause (short, or long every Nth rejection) and go again,
//!    until the attempt budget runs out and the loop finishes **Exhausted**.
//!
//! A transient gateway failure while building (endpoint down, rate
//! limited) does not use up an attempt: the loop pauses longer and retries
//! the same attempt. Those retries have their own budget so a dead
//! endpoint can't keep the loop alive forever.
//!
//! Anything else that goes wrong (bad recipient, bad amount, a rejected
//! broadcast) ends the run in **Failing** and is returned as an error.
//!
//! ## Invariants
//!
//! - `broadcast` is called at most once per run, and only with the
//!   transaction whose signature was just accepted. Nothing from an
//!   earlier iteration is ever replayed.
//! - Once `broadcast` has been issued, the run is committed: cancellation
//!   is only observed before it.
//!
//! ## Shutdown
//!
//! [`GrindEngine::grind_until`] takes an optional `tokio::sync::watch`
//! receiver. The loop checks it before every build, after every build, and
//! races it against every pause. Sending `true` or dropping the sender
//! stops the loop with [`GrindError::Cancelled`].

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use super::policy::GrindPolicy;
use crate::crypto::keys::Signature;
use crate::identity::Identity;
use crate::network::gateway::{GatewayError, LedgerGateway};
use crate::transaction::builder::{parse_address, BuildError, SignedTransaction, TransactionBuilder};
use crate::transaction::types::TokenAmount;
use crate::vault::token::usdc;

// ---------------------------------------------------------------------------
// State, request, outcome
// ---------------------------------------------------------------------------

/// Where the loop is. Only `Accepted` and `Exhausted` are terminal
/// successes; `Failing` is what an error looks like from the inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrindState {
    Building,
    Evaluating,
    Submitting,
    Accepted,
    Exhausted,
    Failing,
}

impl fmt::Display for GrindState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GrindState::Building => "building",
            GrindState::Evaluating => "evaluating",
            GrindState::Submitting => "submitting",
            GrindState::Accepted => "accepted",
            GrindState::Exhausted => "exhausted",
            GrindState::Failing => "failing",
        })
    }
}

/// What to build on every attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TransferRequest {
    /// Native currency, amount in lamports.
    Native { recipient: String, lamports: u64 },
    /// The network's token, amount in whole tokens (truncated to its
    /// decimals).
    Token { recipient: String, amount: f64 },
}

impl TransferRequest {
    pub fn native(recipient: impl Into<String>, lamports: u64) -> Self {
        TransferRequest::Native {
            recipient: recipient.into(),
            lamports,
        }
    }

    pub fn token(recipient: impl Into<String>, amount: f64) -> Self {
        TransferRequest::Token {
            recipient: recipient.into(),
            amount,
        }
    }

    pub fn recipient(&self) -> &str {
        match self {
            TransferRequest::Native { recipient, .. } | TransferRequest::Token { recipient, .. } => {
                recipient
            }
        }
    }

    pub fn is_token(&self) -> bool {
        matches!(self, TransferRequest::Token { .. })
    }

    /// Check everything that can be checked without a network. The loop
    /// runs this first so bad input fails fast instead of on attempt one
    /// (or never, with a zero budget).
    fn validate(&self, gateway: &dyn LedgerGateway) -> Result<(), BuildError> {
        parse_address(self.recipient())?;
        if let TransferRequest::Token { amount, .. } = self {
            TokenAmount::from_ui(*amount, usdc(gateway.network()).decimals)?;
        }
        Ok(())
    }
}

/// How a run ended, when it ended without an error.
#[derive(Debug, Clone)]
pub struct GrindOutcome {
    /// `Accepted` or `Exhausted`.
    pub state: GrindState,
    /// The last transaction built. On acceptance this is what was
    /// broadcast; on exhaustion it was never sent anywhere.
    pub last_build: Option<SignedTransaction>,
    /// The signature `broadcast` returned. `Some` iff accepted.
    pub signature: Option<Signature>,
    /// Builds that reached the predicate.
    pub attempts: u32,
    /// Transient gateway failures absorbed along the way.
    pub transient_failures: u32,
    pub elapsed: Duration,
}

impl GrindOutcome {
    pub fn is_accepted(&self) -> bool {
        self.state == GrindState::Accepted
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrindError {
    /// A build failed for a reason retrying won't fix.
    #[error("build failed: {0}")]
    Build(#[from] BuildError),

    /// The accepted transaction was refused (or lost) at broadcast. Not
    /// retried: a new run builds a new transaction.
    #[error("broadcast of {signature} failed: {error}")]
    Broadcast {
        signature: Signature,
        #[source]
        error: GatewayError,
    },

    #[error("cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Drives grind runs against one gateway with one policy.
///
/// The engine holds no per-run state, so one engine can serve many runs,
/// one after another. Concurrent runs want one engine (and one gateway)
/// each.
pub struct GrindEngine<'a> {
    gateway: &'a dyn LedgerGateway,
    policy: GrindPolicy,
}

impl<'a> GrindEngine<'a> {
    pub fn new(gateway: &'a dyn LedgerGateway, policy: GrindPolicy) -> Self {
        Self { gateway, policy }
    }

    pub fn policy(&self) -> &GrindPolicy {
        &self.policy
    }

    /// One build, no predicate, no broadcast.
    pub async fn build(
        &self,
        identity: &Identity,
        request: &TransferRequest,
    ) -> Result<SignedTransaction, BuildError> {
        let builder = TransactionBuilder::new(self.gateway);
        match request {
            TransferRequest::Native {
                recipient,
                lamports,
            } => builder.native_transfer(identity, recipient, *lamports).await,
            TransferRequest::Token { recipient, amount } => {
                builder.token_transfer(identity, recipient, *amount).await
            }
        }
    }

    /// Grind without a shutdown signal.
    pub async fn grind<F>(
        &self,
        identity: &Identity,
        request: &TransferRequest,
        predicate: F,
    ) -> Result<GrindOutcome, GrindError>
    where
        F: Fn(&Signature) -> bool,
    {
        self.grind_until(identity, request, predicate, None).await
    }

    /// Rebuild until `predicate` accepts a signature or the budget runs
    /// out, then broadcast the accepted transaction once.
    pub async fn grind_until<F>(
        &self,
        identity: &Identity,
        request: &TransferRequest,
        predicate: F,
        mut shutdown: Option<watch::Receiver<bool>>,
    ) -> Result<GrindOutcome, GrindError>
    where
        F: Fn(&Signature) -> bool,
    {
        request.validate(self.gateway)?;

        let started = Instant::now();
        let budget = self.policy.attempt_budget;
        let mut state = GrindState::Building;
        let mut attempts: u32 = 0;
        let mut transient_failures: u32 = 0;
        let mut last_build: Option<SignedTransaction> = None;

        info!(
            from = %identity.address(),
            recipient = request.recipient(),
            token = request.is_token(),
            budget,
            network = %self.gateway.network(),
            "grind starting"
        );

        while attempts < budget {
            if is_cancelled(&shutdown) {
                return Err(self.cancelled(attempts));
            }

            transition(&mut state, GrindState::Building);
            let built = match self.build(identity, request).await {
                Ok(built) => built,
                Err(e) if e.is_transient() => {
                    transient_failures += 1;
                    if transient_failures > self.policy.transient_retry_budget {
                        warn!(
                            error = %e,
                            transient_failures,
                            "transient retry budget spent, giving up"
                        );
                        break;
                    }
                    warn!(error = %e, attempt = attempts + 1, "transient build failure, backing off");
                    if self
                        .pause(self.policy.transient_delay(), &mut shutdown)
                        .await
                    {
                        return Err(self.cancelled(attempts));
                    }
                    continue;
                }
                Err(e) => {
                    transition(&mut state, GrindState::Failing);
                    warn!(error = %e, attempt = attempts + 1, "build failed");
                    return Err(e.into());
                }
            };
            attempts += 1;

            if is_cancelled(&shutdown) {
                return Err(self.cancelled(attempts));
            }

            transition(&mut state, GrindState::Evaluating);
            let signature = built.signature;
            if predicate(&signature) {
                transition(&mut state, GrindState::Submitting);
                info!(%signature, attempts, "predicate accepted, broadcasting");
                let broadcast = match self.gateway.broadcast(&built.serialized).await {
                    Ok(sig) => sig,
                    Err(error) => {
                        transition(&mut state, GrindState::Failing);
                        warn!(%signature, error = %error, "broadcast failed");
                        return Err(GrindError::Broadcast { signature, error });
                    }
                };
                transition(&mut state, GrindState::Accepted);
                info!(signature = %broadcast, attempts, "transaction broadcast");
                return Ok(GrindOutcome {
                    state,
                    last_build: Some(built),
                    signature: Some(broadcast),
                    attempts,
                    transient_failures,
                    elapsed: started.elapsed(),
                });
            }

            debug!(%signature, attempt = attempts, budget, "predicate rejected");
            last_build = Some(built);

            if attempts < budget {
                let delay = self.policy.delay_after_rejection(attempts);
                if self.pause(delay, &mut shutdown).await {
                    return Err(self.cancelled(attempts));
                }
            }
        }

        transition(&mut state, GrindState::Exhausted);
        info!(attempts, transient_failures, "grind exhausted without acceptance");
        Ok(GrindOutcome {
            state,
            last_build,
            signature: None,
            attempts,
            transient_failures,
            elapsed: started.elapsed(),
        })
    }

    /// Sleep for `delay`, waking early on shutdown. Returns `true` if the
    /// run should stop.
    async fn pause(&self, delay: Duration, shutdown: &mut Option<watch::Receiver<bool>>) -> bool {
        if delay.is_zero() {
            return is_cancelled(shutdown);
        }
        let deadline = Instant::now() + delay;
        let Some(rx) = shutdown.as_mut() else {
            tokio::time::sleep_until(deadline).await;
            return false;
        };
        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => return false,
                changed = rx.changed() => {
                    if changed.is_err() || *rx.borrow() {
                        return true;
                    }
                }
            }
        }
    }

    fn cancelled(&self, attempts: u32) -> GrindError {
        info!(attempts, "grind received shutdown signal");
        GrindError::Cancelled { attempts }
    }
}

/// Shutdown was requested, or the sender is gone.
fn is_cancelled(shutdown: &Option<watch::Receiver<bool>>) -> bool {
    shutdown
        .as_ref()
        .is_some_and(|rx| *rx.borrow() || rx.has_changed().is_err())
}

fn transition(state: &mut GrindState, next: GrindState) {
    if *state != next {
        trace!(from = %state, to = %next, "grind state");
        *state = next;
    }
}

/// Build-once flavour: broadcast `signed` if `predicate` accepts its
/// signature. `Ok(None)` means the predicate said no and nothing was sent.
pub async fn submit_if_accepted<F>(
    gateway: &dyn LedgerGateway,
    signed: &SignedTransaction,
    predicate: F,
) -> Result<Option<Signature>, GatewayError>
where
    F: Fn(&Signature) -> bool,
{
    if !predicate(&signed.signature) {
        debug!(signature = %signed.signature, "predicate rejected, not submitting");
        return Ok(None);
    }
    let signature = gateway.broadcast(&signed.serialized).await?;
    info!(%signature, "transaction broadcast");
    Ok(Some(signature))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::config::Network;
    use crate::network::memory::{InMemoryGateway, Operation};

    fn native_to_stranger() -> TransferRequest {
        TransferRequest::Native {
            recipient: Identity::create().address().to_string(),
            lamports: 100_000,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn always_false_runs_exactly_the_budget() {
        let gw = InMemoryGateway::new(Network::Devnet);
        let engine = GrindEngine::new(&gw, GrindPolicy::default().with_attempt_budget(25));
        let seen = AtomicU32::new(0);

        let outcome = engine
            .grind(&Identity::create(), &native_to_stranger(), |_| {
                seen.fetch_add(1, Ordering::SeqCst);
                false
            })
            .await
            .unwrap();

        assert_eq!(outcome.state, GrindState::Exhausted);
        assert_eq!(outcome.attempts, 25);
        assert_eq!(seen.load(Ordering::SeqCst), 25);
        assert_eq!(gw.calls(Operation::Blockhash), 25);
        assert!(outcome.signature.is_none());
        assert!(outcome.last_build.is_some());
        assert_eq!(gw.calls(Operation::Broadcast), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn always_true_builds_once_and_broadcasts_once() {
        let gw = InMemoryGateway::new(Network::Devnet);
        let engine = GrindEngine::new(&gw, GrindPolicy::default());

        let outcome = engine
            .grind(&Identity::create(), &native_to_stranger(), |_| true)
            .await
            .unwrap();

        assert!(outcome.is_accepted());
        assert_eq!(outcome.attempts, 1);
        assert_eq!(gw.calls(Operation::Blockhash), 1);
        assert_eq!(gw.calls(Operation::Broadcast), 1);
        let built = outcome.last_build.unwrap();
        assert_eq!(outcome.signature, Some(built.signature));
        assert_eq!(gw.broadcasts(), vec![built.serialized]);
    }

    #[tokio::test(start_paused = true)]
    async fn accepts_on_the_nth_attempt() {
        let gw = InMemoryGateway::new(Network::Devnet);
        let engine = GrindEngine::new(&gw, GrindPolicy::default());
        let calls = AtomicU32::new(0);

        let outcome = engine
            .grind(&Identity::create(), &native_to_stranger(), |_| {
                calls.fetch_add(1, Ordering::SeqCst) + 1 == 12
            })
            .await
            .unwrap();

        assert!(outcome.is_accepted());
        assert_eq!(outcome.attempts, 12);
        assert_eq!(gw.broadcast_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn pacing_follows_policy() {
        let gw = InMemoryGateway::new(Network::Devnet);
        let engine = GrindEngine::new(&gw, GrindPolicy::default().with_attempt_budget(10));

        let outcome = engine
            .grind(&Identity::create(), &native_to_stranger(), |_| false)
            .await
            .unwrap();

        // Nine 10 ms pauses; no pause after the last attempt.
        assert_eq!(outcome.elapsed, Duration::from_millis(90));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_do_not_consume_attempts() {
        let gw = InMemoryGateway::new(Network::Devnet);
        for _ in 0..3 {
            gw.fail_next(
                Operation::Blockhash,
                GatewayError::NetworkUnavailable("blip".into()),
            );
        }
        let engine = GrindEngine::new(&gw, GrindPolicy::default().with_attempt_budget(5));

        let outcome = engine
            .grind(&Identity::create(), &native_to_stranger(), |_| false)
            .await
            .unwrap();

        assert_eq!(outcome.attempts, 5);
        assert_eq!(outcome.transient_failures, 3);
        assert_eq!(gw.calls(Operation::Blockhash), 8);
        assert!(outcome.elapsed >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_retry_budget_ends_the_run() {
        let gw = InMemoryGateway::new(Network::Devnet);
        for _ in 0..10 {
            gw.fail_next(
                Operation::Blockhash,
                GatewayError::RateLimited("429".into()),
            );
        }
        let policy = GrindPolicy::default().with_transient_retry_budget(2);
        let engine = GrindEngine::new(&gw, policy);

        let outcome = engine
            .grind(&Identity::create(), &native_to_stranger(), |_| true)
            .await
            .unwrap();

        assert_eq!(outcome.state, GrindState::Exhausted);
        assert_eq!(outcome.attempts, 0);
        assert_eq!(outcome.transient_failures, 3);
        assert!(outcome.last_build.is_none());
        assert_eq!(gw.broadcast_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_recipient_fails_immediately() {
        let gw = InMemoryGateway::new(Network::Devnet);
        let engine = GrindEngine::new(&gw, GrindPolicy::default().with_attempt_budget(0));
        let request = TransferRequest::Native {
            recipient: "nope".into(),
            lamports: 1,
        };

        let err = engine
            .grind(&Identity::create(), &request, |_| true)
            .await
            .unwrap_err();

        assert!(matches!(err, GrindError::Build(BuildError::InvalidAddress(_))));
        assert_eq!(gw.calls(Operation::Blockhash), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_budget_is_immediately_exhausted() {
        let gw = InMemoryGateway::new(Network::Devnet);
        let engine = GrindEngine::new(&gw, GrindPolicy::default().with_attempt_budget(0));

        let outcome = engine
            .grind(&Identity::create(), &native_to_stranger(), |_| true)
            .await
            .unwrap();

        assert_eq!(outcome.state, GrindState::Exhausted);
        assert_eq!(outcome.attempts, 0);
        assert_eq!(gw.calls(Operation::Blockhash), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_broadcast_is_surfaced_not_retried() {
        let gw = InMemoryGateway::new(Network::Devnet);
        gw.fail_next(
            Operation::Broadcast,
            GatewayError::SubmissionRejected("insufficient funds".into()),
        );
        let engine = GrindEngine::new(&gw, GrindPolicy::default());

        let err = engine
            .grind(&Identity::create(), &native_to_stranger(), |_| true)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            GrindError::Broadcast {
                error: GatewayError::SubmissionRejected(_),
                ..
            }
        ));
        assert_eq!(gw.calls(Operation::Broadcast), 1);
        assert_eq!(gw.calls(Operation::Blockhash), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_during_pause_cancels() {
        let gw = InMemoryGateway::new(Network::Devnet);
        let engine = GrindEngine::new(&gw, GrindPolicy::default());
        let (tx, rx) = watch::channel(false);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(35)).await;
            let _ = tx.send(true);
        });

        let err = engine
            .grind_until(&Identity::create(), &native_to_stranger(), |_| false, Some(rx))
            .await
            .unwrap_err();

        match err {
            GrindError::Cancelled { attempts } => assert!((3..=5).contains(&attempts)),
            other => panic!("expected cancellation, got {other:?}"),
        }
        assert_eq!(gw.broadcast_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_before_start_builds_nothing() {
        let gw = InMemoryGateway::new(Network::Devnet);
        let engine = GrindEngine::new(&gw, GrindPolicy::default());
        let (_tx, rx) = watch::channel(true);

        let err = engine
            .grind_until(&Identity::create(), &native_to_stranger(), |_| true, Some(rx))
            .await
            .unwrap_err();

        assert_eq!(err, GrindError::Cancelled { attempts: 0 });
        assert_eq!(gw.calls(Operation::Blockhash), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_sender_cancels_without_delays() {
        let gw = InMemoryGateway::new(Network::Devnet);
        let policy = GrindPolicy::default().no_delays().with_attempt_budget(50);
        let engine = GrindEngine::new(&gw, policy);
        let (tx, rx) = watch::channel(false);
        drop(tx);

        let err = engine
            .grind_until(&Identity::create(), &native_to_stranger(), |_| false, Some(rx))
            .await
            .unwrap_err();

        assert_eq!(err, GrindError::Cancelled { attempts: 0 });
        assert_eq!(gw.calls(Operation::Blockhash), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn sender_dropped_mid_run_cancels_without_delays() {
        let gw = InMemoryGateway::new(Network::Devnet);
        let policy = GrindPolicy::default().no_delays().with_attempt_budget(50);
        let engine = GrindEngine::new(&gw, policy);
        let (tx, rx) = watch::channel(false);
        let tx = parking_lot::Mutex::new(Some(tx));

        let err = engine
            .grind_until(
                &Identity::create(),
                &native_to_stranger(),
                |_| {
                    // Hang up after the third rejection.
                    if gw.calls(Operation::Blockhash) == 3 {
                        tx.lock().take();
                    }
                    false
                },
                Some(rx),
            )
            .await
            .unwrap_err();

        assert_eq!(err, GrindError::Cancelled { attempts: 3 });
        assert_eq!(gw.calls(Operation::Blockhash), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn token_grind_creates_holding_account_each_build() {
        let gw = InMemoryGateway::new(Network::Devnet);
        let engine = GrindEngine::new(&gw, GrindPolicy::default().with_attempt_budget(3));
        let request = TransferRequest::Token {
            recipient: Identity::create().address().to_string(),
            amount: 1.5,
        };

        let outcome = engine
            .grind(&Identity::create(), &request, |_| false)
            .await
            .unwrap();

        assert_eq!(outcome.last_build.unwrap().instruction_count(), 2);
        assert_eq!(gw.calls(Operation::AccountInfo), 3);
    }

    #[tokio::test]
    async fn submit_if_accepted_respects_predicate() {
        let gw = InMemoryGateway::new(Network::Devnet);
        let engine = GrindEngine::new(&gw, GrindPolicy::default());
        let signed = engine
            .build(&Identity::create(), &native_to_stranger())
            .await
            .unwrap();

        assert_eq!(submit_if_accepted(&gw, &signed, |_| false).await.unwrap(), None);
        assert_eq!(gw.broadcast_count(), 0);

        let sig = submit_if_accepted(&gw, &signed, |_| true).await.unwrap();
        assert_eq!(sig, Some(signed.signature));
        assert_eq!(gw.broadcast_count(), 1);
    }
}

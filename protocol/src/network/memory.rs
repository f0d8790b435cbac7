//! An in-process ledger gateway.
//!
//! [`InMemoryGateway`] behaves like a very small, very obliging cluster:
//! every `latest_blockhash` call hands out a brand-new hash, accounts and
//! balances are whatever you put in the table, and `broadcast` really does
//! decode and signature-check what it is given before logging it.
//!
//! Failures can be scripted per operation so the grind loop's error paths
//! can be driven deterministically:
//!
//! ```
//! use quarry_protocol::network::{GatewayError, InMemoryGateway, Operation};
//! use quarry_protocol::Network;
//!
//! let gw = InMemoryGateway::new(Network::Devnet);
//! gw.fail_next(Operation::Blockhash, GatewayError::NetworkUnavailable("blip".into()));
//! ```

use std::collections::{HashMap, HashSet, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use super::gateway::{AccountInfo, GatewayError, LedgerGateway};
use crate::config::Network;
use crate::crypto::hash::sha256v;
use crate::crypto::keys::{Pubkey, Signature};
use crate::transaction::instructions::{associated_token_address, TOKEN_PROGRAM_ID};
use crate::transaction::signing::Transaction;
use crate::transaction::types::Hash;

/// Size of an SPL token account. Only used to make the fake account look
/// plausible.
const TOKEN_ACCOUNT_LEN: usize = 165;

/// Gateway operations a failure can be scripted against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Blockhash,
    AccountInfo,
    NativeBalance,
    TokenBalance,
    Broadcast,
}

#[derive(Default)]
struct State {
    blockhash_counter: u64,
    issued_blockhashes: HashSet<Hash>,
    accounts: HashMap<Pubkey, AccountInfo>,
    token_balances: HashMap<Pubkey, u64>,
    scripted: HashMap<Operation, VecDeque<GatewayError>>,
    calls: HashMap<Operation, u64>,
    broadcasts: Vec<Vec<u8>>,
}

impl State {
    /// Count the call and pop a scripted failure for it, if any.
    fn enter(&mut self, op: Operation) -> Result<(), GatewayError> {
        *self.calls.entry(op).or_default() += 1;
        match self.scripted.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// A deterministic, thread-safe [`LedgerGateway`] test double.
pub struct InMemoryGateway {
    network: Network,
    state: Mutex<State>,
}

impl InMemoryGateway {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            state: Mutex::new(State::default()),
        }
    }

    // -- setup --------------------------------------------------------------

    /// Give `address` a system-owned account holding `lamports`.
    pub fn set_native_balance(&self, address: Pubkey, lamports: u64) {
        let mut state = self.state.lock();
        let account = state.accounts.entry(address).or_insert_with(|| AccountInfo {
            lamports: 0,
            owner: Pubkey::default(),
            data: Vec::new(),
            executable: false,
        });
        account.lamports = lamports;
    }

    /// Create `wallet`'s holding account for this network's token with a
    /// balance of `amount` base units. Returns the holding account address.
    pub fn set_token_balance(&self, wallet: &Pubkey, amount: u64) -> Result<Pubkey, GatewayError> {
        let holding = associated_token_address(wallet, &self.network.token_mint())
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        let mut state = self.state.lock();
        state.accounts.insert(
            holding,
            AccountInfo {
                lamports: 2_039_280,
                owner: TOKEN_PROGRAM_ID,
                data: vec![0u8; TOKEN_ACCOUNT_LEN],
                executable: false,
            },
        );
        state.token_balances.insert(holding, amount);
        Ok(holding)
    }

    /// Make the next call to `op` fail with `err`. Calls queue up: script
    /// three failures and the next three calls fail.
    pub fn fail_next(&self, op: Operation, err: GatewayError) {
        self.state
            .lock()
            .scripted
            .entry(op)
            .or_default()
            .push_back(err);
    }

    // -- inspection ---------------------------------------------------------

    /// How many times `op` has been called, failures included.
    pub fn calls(&self, op: Operation) -> u64 {
        self.state.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// Every transaction accepted by `broadcast`, in order.
    pub fn broadcasts(&self) -> Vec<Vec<u8>> {
        self.state.lock().broadcasts.clone()
    }

    pub fn broadcast_count(&self) -> usize {
        self.state.lock().broadcasts.len()
    }
}

#[async_trait]
impl LedgerGateway for InMemoryGateway {
    fn network(&self) -> Network {
        self.network
    }

    async fn latest_blockhash(&self) -> Result<Hash, GatewayError> {
        let mut state = self.state.lock();
        state.enter(Operation::Blockhash)?;
        state.blockhash_counter += 1;
        let hash = Hash::new_from_array(sha256v(&[
            &b"quarry-memory-blockhash"[..],
            self.network.name().as_bytes(),
            &state.blockhash_counter.to_le_bytes(),
        ]));
        state.issued_blockhashes.insert(hash);
        Ok(hash)
    }

    async fn account_info(&self, address: &Pubkey) -> Result<Option<AccountInfo>, GatewayError> {
        let mut state = self.state.lock();
        state.enter(Operation::AccountInfo)?;
        Ok(state.accounts.get(address).cloned())
    }

    async fn native_balance(&self, address: &Pubkey) -> Result<u64, GatewayError> {
        let mut state = self.state.lock();
        state.enter(Operation::NativeBalance)?;
        Ok(state.accounts.get(address).map_or(0, |a| a.lamports))
    }

    async fn token_balance(&self, holding_account: &Pubkey) -> Result<u64, GatewayError> {
        let mut state = self.state.lock();
        state.enter(Operation::TokenBalance)?;
        state
            .token_balances
            .get(holding_account)
            .copied()
            .ok_or_else(|| GatewayError::AccountNotFound(holding_account.to_string()))
    }

    async fn broadcast(&self, signed_transaction: &[u8]) -> Result<Signature, GatewayError> {
        let mut state = self.state.lock();
        state.enter(Operation::Broadcast)?;

        let tx = Transaction::deserialize(signed_transaction)
            .map_err(|e| GatewayError::SubmissionRejected(format!("malformed: {}", e)))?;
        if !tx.verify() {
            return Err(GatewayError::SubmissionRejected(
                "signature verification failed".to_string(),
            ));
        }
        if !state.issued_blockhashes.contains(&tx.message.recent_blockhash) {
            return Err(GatewayError::SubmissionRejected(
                "blockhash not found".to_string(),
            ));
        }
        let signature = tx
            .signature()
            .copied()
            .ok_or_else(|| GatewayError::SubmissionRejected("unsigned".to_string()))?;

        debug!(%signature, "memory gateway accepted transaction");
        state.broadcasts.push(signed_transaction.to_vec());
        Ok(signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::Keypair;
    use crate::transaction::instructions::system_transfer;
    use crate::transaction::message::Message;
    use crate::transaction::signing::sign_transaction;

    async fn signed_transfer(gw: &InMemoryGateway, kp: &Keypair) -> Vec<u8> {
        let hash = gw.latest_blockhash().await.unwrap();
        let ix = system_transfer(&kp.pubkey(), &Pubkey::new_from_array([2; 32]), 5);
        let msg = Message::compile(&[ix], &kp.pubkey(), hash).unwrap();
        let mut tx = Transaction::new_unsigned(msg);
        sign_transaction(&mut tx, kp).unwrap();
        tx.serialize().unwrap()
    }

    #[tokio::test]
    async fn blockhashes_rotate() {
        let gw = InMemoryGateway::new(Network::Devnet);
        let a = gw.latest_blockhash().await.unwrap();
        let b = gw.latest_blockhash().await.unwrap();
        assert_ne!(a, b);
        assert_eq!(gw.calls(Operation::Blockhash), 2);
    }

    #[tokio::test]
    async fn scripted_failures_fire_once_each() {
        let gw = InMemoryGateway::new(Network::Devnet);
        gw.fail_next(
            Operation::Blockhash,
            GatewayError::NetworkUnavailable("down".into()),
        );
        assert!(gw.latest_blockhash().await.is_err());
        assert!(gw.latest_blockhash().await.is_ok());
        assert_eq!(gw.calls(Operation::Blockhash), 2);
    }

    #[tokio::test]
    async fn missing_token_account_is_not_found() {
        let gw = InMemoryGateway::new(Network::Devnet);
        let err = gw
            .token_balance(&Pubkey::new_from_array([4; 32]))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::AccountNotFound(_)));
    }

    #[tokio::test]
    async fn token_accounts_exist_after_funding() {
        let gw = InMemoryGateway::new(Network::Devnet);
        let wallet = Keypair::generate().pubkey();
        let holding = gw.set_token_balance(&wallet, 42).unwrap();
        assert_eq!(gw.token_balance(&holding).await.unwrap(), 42);
        let info = gw.account_info(&holding).await.unwrap().unwrap();
        assert_eq!(info.owner, TOKEN_PROGRAM_ID);
    }

    #[tokio::test]
    async fn broadcast_checks_and_logs() {
        let gw = InMemoryGateway::new(Network::Devnet);
        let kp = Keypair::generate();
        let bytes = signed_transfer(&gw, &kp).await;
        let sig = gw.broadcast(&bytes).await.unwrap();
        assert_eq!(
            Transaction::deserialize(&bytes).unwrap().signature(),
            Some(&sig)
        );
        assert_eq!(gw.broadcasts(), vec![bytes]);
    }

    #[tokio::test]
    async fn broadcast_rejects_garbage_and_tampering() {
        let gw = InMemoryGateway::new(Network::Devnet);
        let kp = Keypair::generate();
        assert!(matches!(
            gw.broadcast(&[1, 2, 3]).await,
            Err(GatewayError::SubmissionRejected(_))
        ));

        let mut bytes = signed_transfer(&gw, &kp).await;
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        assert!(matches!(
            gw.broadcast(&bytes).await,
            Err(GatewayError::SubmissionRejected(_))
        ));
        assert_eq!(gw.broadcast_count(), 0);
    }

    #[tokio::test]
    async fn broadcast_rejects_foreign_blockhash() {
        let gw = InMemoryGateway::new(Network::Devnet);
        let other = InMemoryGateway::new(Network::Mainnet);
        let kp = Keypair::generate();
        let bytes = signed_transfer(&other, &kp).await;
        assert!(matches!(
            gw.broadcast(&bytes).await,
            Err(GatewayError::SubmissionRejected(_))
        ));
    }
}

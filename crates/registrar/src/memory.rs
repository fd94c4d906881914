//! In-memory chain implementing the wallet and both contracts.
//!
//! Used by the tests and by the CLI's simulation mode. It enforces the same
//! rules the registrar controller does (commitment age window, availability,
//! payment) so flows can be exercised end to end without a node.

use crate::contracts::{
    RegistrarController, RegistrationParams, RentPrice, ResolverContract, TxOptions, TxReceipt,
    Wallet, WalletEvent,
};
use crate::errors::ChainError;
use crate::network::Network;
use async_trait::async_trait;
use edx_types::{
    fully_qualified, keccak256, namehash, reverse_node, Address, CommitmentHash, NameHash, TxHash,
    Wei,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;

/// Shortest registration the controller accepts (28 days).
const MIN_REGISTRATION_DURATION_SECS: u64 = 28 * 24 * 3600;

/// Collaborator calls, for call counting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainOp {
    RequestAccounts,
    ListAccounts,
    ChainId,
    WaitForReceipt,
    ForwardAddress,
    SetForwardAddress,
    ReverseName,
    CommitmentHash,
    SubmitCommitment,
    RentPrice,
    Register,
}

#[derive(Default)]
struct ChainState {
    chain_id: u64,
    accounts: Vec<Address>,
    block_number: u64,
    tx_counter: u64,
    /// (resolver, node) -> address
    forward: HashMap<(Address, NameHash), Address>,
    /// (resolver, reverse node) -> name
    reverse: HashMap<(Address, NameHash), String>,
    /// (resolver, node) -> registrant
    owners: HashMap<(Address, NameHash), Address>,
    /// (controller, commitment) -> time mined
    commitments: HashMap<(Address, CommitmentHash), Instant>,
    receipts: HashMap<TxHash, TxReceipt>,
    price: RentPrice,
    calls: HashMap<ChainOp, usize>,
    failures: HashMap<ChainOp, VecDeque<ChainError>>,
    reverts: HashSet<ChainOp>,
}

impl ChainState {
    fn begin(&mut self, op: ChainOp) -> Result<(), ChainError> {
        *self.calls.entry(op).or_default() += 1;
        match self.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Record a mined transaction. Returns `false` in the receipt when a revert
    /// was scheduled for `op`.
    fn mine(&mut self, op: ChainOp) -> (TxHash, bool) {
        self.tx_counter += 1;
        self.block_number += 1;
        let mut seed = b"edx-sim-tx".to_vec();
        seed.extend_from_slice(&self.tx_counter.to_be_bytes());
        let tx_hash = TxHash(keccak256(&seed));
        let success = !self.reverts.remove(&op);
        self.receipts.insert(
            tx_hash,
            TxReceipt {
                tx_hash,
                block_number: self.block_number,
                success,
            },
        );
        (tx_hash, success)
    }
}

#[derive(Clone)]
pub struct InMemoryChain {
    state: Arc<Mutex<ChainState>>,
    events: broadcast::Sender<WalletEvent>,
    suffix: Arc<str>,
    latency: Duration,
    min_commitment_age: Duration,
    max_commitment_age: Duration,
}

impl InMemoryChain {
    pub fn new(chain_id: u64, suffix: &str) -> Self {
        let (events, _receiver) = broadcast::channel(16);
        let state = ChainState {
            chain_id,
            ..ChainState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            events,
            suffix: Arc::from(suffix),
            latency: Duration::ZERO,
            min_commitment_age: Duration::from_secs(60),
            max_commitment_age: Duration::from_secs(24 * 3600),
        }
    }

    pub fn with_account(self, account: Address) -> Self {
        self.state.lock().accounts = vec![account];
        self
    }

    /// Delay applied to every call before it is served.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_commitment_age(mut self, min: Duration, max: Duration) -> Self {
        self.min_commitment_age = min;
        self.max_commitment_age = max;
        self
    }

    pub fn set_rent_price(&self, base: Wei, premium: Wei) {
        self.state.lock().price = RentPrice { base, premium };
    }

    /// Register `fqdn` to `owner` and point its forward record at it.
    pub fn seed_name(&self, network: &Network, fqdn: &str, owner: Address) {
        let key = (network.resolver, namehash(fqdn));
        let mut state = self.state.lock();
        state.owners.insert(key, owner);
        state.forward.insert(key, owner);
    }

    pub fn set_reverse_name(&self, network: &Network, account: Address, name: &str) {
        self.state
            .lock()
            .reverse
            .insert((network.resolver, reverse_node(&account)), name.to_string());
    }

    pub fn forward_record(&self, network: &Network, fqdn: &str) -> Address {
        self.state
            .lock()
            .forward
            .get(&(network.resolver, namehash(fqdn)))
            .copied()
            .unwrap_or(Address::ZERO)
    }

    pub fn registrant(&self, network: &Network, fqdn: &str) -> Option<Address> {
        self.state
            .lock()
            .owners
            .get(&(network.resolver, namehash(fqdn)))
            .copied()
    }

    /// Fail the next call of `op` with `err`. Calls queue up in order.
    pub fn fail_next(&self, op: ChainOp, err: ChainError) {
        self.state
            .lock()
            .failures
            .entry(op)
            .or_default()
            .push_back(err);
    }

    /// Mine the next `op` transaction with a failed status and no effect.
    pub fn revert_next(&self, op: ChainOp) {
        self.state.lock().reverts.insert(op);
    }

    pub fn call_count(&self, op: ChainOp) -> usize {
        self.state.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// Simulate the user switching chains in the wallet.
    pub fn switch_chain(&self, chain_id: u64) {
        self.state.lock().chain_id = chain_id;
        let _ = self.events.send(WalletEvent::ChainChanged(chain_id));
    }

    /// Simulate the user switching (or disconnecting) accounts.
    pub fn switch_accounts(&self, accounts: Vec<Address>) {
        self.state.lock().accounts = accounts.clone();
        let _ = self.events.send(WalletEvent::AccountsChanged(accounts));
    }

    async fn pause(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl Wallet for InMemoryChain {
    async fn request_accounts(&self) -> Result<Vec<Address>, ChainError> {
        self.pause().await;
        let mut state = self.state.lock();
        state.begin(ChainOp::RequestAccounts)?;
        if state.accounts.is_empty() {
            return Err(ChainError::Rejected("User rejected the request.".into()));
        }
        Ok(state.accounts.clone())
    }

    async fn list_accounts(&self) -> Result<Vec<Address>, ChainError> {
        self.pause().await;
        let mut state = self.state.lock();
        state.begin(ChainOp::ListAccounts)?;
        Ok(state.accounts.clone())
    }

    async fn chain_id(&self) -> Result<u64, ChainError> {
        let mut state = self.state.lock();
        state.begin(ChainOp::ChainId)?;
        Ok(state.chain_id)
    }

    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<TxReceipt, ChainError> {
        self.pause().await;
        let mut state = self.state.lock();
        state.begin(ChainOp::WaitForReceipt)?;
        state
            .receipts
            .get(&tx_hash)
            .cloned()
            .ok_or_else(|| ChainError::Provider(format!("unknown transaction {tx_hash}")))
    }

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }
}

#[async_trait]
impl ResolverContract for InMemoryChain {
    async fn forward_address(
        &self,
        resolver: Address,
        node: NameHash,
    ) -> Result<Address, ChainError> {
        self.pause().await;
        let mut state = self.state.lock();
        state.begin(ChainOp::ForwardAddress)?;
        Ok(state
            .forward
            .get(&(resolver, node))
            .copied()
            .unwrap_or(Address::ZERO))
    }

    async fn set_forward_address(
        &self,
        resolver: Address,
        from: Address,
        node: NameHash,
        target: Address,
    ) -> Result<TxHash, ChainError> {
        self.pause().await;
        let mut state = self.state.lock();
        state.begin(ChainOp::SetForwardAddress)?;
        if state.owners.get(&(resolver, node)) != Some(&from) {
            return Err(ChainError::Rejected(
                "execution reverted: caller is not authorised for this node".into(),
            ));
        }
        let (tx_hash, success) = state.mine(ChainOp::SetForwardAddress);
        if success {
            state.forward.insert((resolver, node), target);
        }
        Ok(tx_hash)
    }

    async fn reverse_name(&self, resolver: Address, node: NameHash) -> Result<String, ChainError> {
        self.pause().await;
        let mut state = self.state.lock();
        state.begin(ChainOp::ReverseName)?;
        Ok(state
            .reverse
            .get(&(resolver, node))
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl RegistrarController for InMemoryChain {
    async fn commitment_hash(
        &self,
        _controller: Address,
        params: &RegistrationParams,
    ) -> Result<CommitmentHash, ChainError> {
        self.pause().await;
        self.state.lock().begin(ChainOp::CommitmentHash)?;
        Ok(params.commitment())
    }

    async fn submit_commitment(
        &self,
        controller: Address,
        _from: Address,
        commitment: CommitmentHash,
    ) -> Result<TxHash, ChainError> {
        self.pause().await;
        let now = Instant::now();
        let mut state = self.state.lock();
        state.begin(ChainOp::SubmitCommitment)?;
        if let Some(at) = state.commitments.get(&(controller, commitment)) {
            if now.saturating_duration_since(*at) <= self.max_commitment_age {
                return Err(ChainError::Rejected(
                    "execution reverted: UnexpiredCommitmentExists".into(),
                ));
            }
        }
        let (tx_hash, success) = state.mine(ChainOp::SubmitCommitment);
        if success {
            state.commitments.insert((controller, commitment), now);
        }
        Ok(tx_hash)
    }

    async fn rent_price(
        &self,
        _controller: Address,
        _name: &str,
        _duration_secs: u64,
    ) -> Result<RentPrice, ChainError> {
        self.pause().await;
        let mut state = self.state.lock();
        state.begin(ChainOp::RentPrice)?;
        Ok(state.price)
    }

    async fn register(
        &self,
        controller: Address,
        from: Address,
        params: &RegistrationParams,
        options: TxOptions,
    ) -> Result<TxHash, ChainError> {
        self.pause().await;
        let now = Instant::now();
        let mut state = self.state.lock();
        state.begin(ChainOp::Register)?;

        let commitment = params.commitment();
        let committed_at = state
            .commitments
            .get(&(controller, commitment))
            .copied()
            .ok_or_else(|| ChainError::Rejected("execution reverted: CommitmentTooOld".into()))?;
        let age = now.saturating_duration_since(committed_at);
        if age < self.min_commitment_age {
            return Err(ChainError::Rejected("execution reverted: CommitmentTooNew".into()));
        }
        if age > self.max_commitment_age {
            return Err(ChainError::Rejected("execution reverted: CommitmentTooOld".into()));
        }

        let fqdn = fully_qualified(&params.name, &self.suffix);
        let key = (params.resolver, namehash(&fqdn));
        if state.owners.contains_key(&key) {
            return Err(ChainError::Rejected("execution reverted: NameNotAvailable".into()));
        }
        if params.duration_secs < MIN_REGISTRATION_DURATION_SECS {
            return Err(ChainError::Rejected("execution reverted: DurationTooShort".into()));
        }
        let cost = state.price.base.saturating_add(state.price.premium);
        if options.value < cost {
            return Err(ChainError::Rejected("execution reverted: InsufficientValue".into()));
        }

        let (tx_hash, success) = state.mine(ChainOp::Register);
        if success {
            state.commitments.remove(&(controller, commitment));
            state.owners.insert(key, params.owner);
            if params.reverse_record {
                state
                    .reverse
                    .insert((params.resolver, reverse_node(&from)), fqdn);
            }
        }
        Ok(tx_hash)
    }
}

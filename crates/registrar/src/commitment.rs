//! First half of a claim: reserve the name with a hidden commitment.

use crate::availability::{Availability, AvailabilityChecker};
use crate::config::RegistrarConfig;
use crate::contracts::{RegistrarController, RegistrationParams, TxReceipt, Wallet};
use crate::errors::{CommitError, RegistrarError, Result};
use crate::network::Network;
use crate::registration::PaidRegistration;
use crate::validation::Candidate;
use edx_types::{Address, CommitmentHash, TxHash};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::info;

/// A confirmed commitment waiting for its reveal window.
#[derive(Debug, Clone)]
pub struct PendingCommitment {
    pub candidate: Candidate,
    pub owner: Address,
    pub network: Network,
    /// Exact arguments the registration must repeat.
    pub params: RegistrationParams,
    pub commitment: CommitmentHash,
    pub tx_hash: TxHash,
    pub confirmed_at: Instant,
    pub reveal_at: Instant,
    /// Set once `register` is mined.
    pub paid: Option<PaidRegistration>,
}

impl PendingCommitment {
    pub fn is_revealable(&self, now: Instant) -> bool {
        now >= self.reveal_at
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        self.reveal_at.saturating_duration_since(now)
    }
}

/// Fails with `TransactionRejected` when a mined transaction reverted.
pub(crate) fn ensure_success(receipt: &TxReceipt) -> Result<()> {
    if receipt.success {
        Ok(())
    } else {
        Err(RegistrarError::TransactionRejected(format!(
            "transaction {} reverted in block {}",
            receipt.tx_hash, receipt.block_number
        )))
    }
}

#[derive(Clone)]
pub struct CommitmentFlow {
    availability: AvailabilityChecker,
    wallet: Arc<dyn Wallet>,
    controller: Arc<dyn RegistrarController>,
    config: Arc<RegistrarConfig>,
}

impl CommitmentFlow {
    pub fn new(
        availability: AvailabilityChecker,
        wallet: Arc<dyn Wallet>,
        controller: Arc<dyn RegistrarController>,
        config: Arc<RegistrarConfig>,
    ) -> Self {
        Self {
            availability,
            wallet,
            controller,
            config,
        }
    }

    /// Check ownership, obtain the commitment value, submit it and wait for
    /// confirmation. The returned commitment becomes revealable after the
    /// configured wait.
    pub async fn commit(
        &self,
        candidate: &Candidate,
        owner: Address,
        network: &Network,
    ) -> std::result::Result<PendingCommitment, CommitError> {
        if let Availability::Taken(current) =
            self.availability.check(candidate, owner, network).await?
        {
            info!(name = %candidate, owner = %current, "name already registered");
            return Err(RegistrarError::AlreadyRegistered { owner: current });
        }

        let params = RegistrationParams::new(candidate, owner, network, &self.config);
        let controller = network.registrar_controller;
        let commitment = self.controller.commitment_hash(controller, &params).await?;

        let tx_hash = self
            .controller
            .submit_commitment(controller, owner, commitment)
            .await?;
        info!(name = %candidate, %commitment, tx = %tx_hash, "commitment submitted");

        let receipt = self.wallet.wait_for_receipt(tx_hash).await?;
        ensure_success(&receipt)?;

        let confirmed_at = Instant::now();
        let reveal_at = confirmed_at + self.config.reveal_wait();
        info!(
            name = %candidate,
            block = receipt.block_number,
            wait_secs = self.config.reveal_wait_secs,
            "commitment confirmed"
        );

        Ok(PendingCommitment {
            candidate: candidate.clone(),
            owner,
            network: network.clone(),
            params,
            commitment,
            tx_hash,
            confirmed_at,
            reveal_at,
            paid: None,
        })
    }
}

/// Scheduled end of a reveal wait. Dropping or cancelling the timer aborts
/// the scheduled callback.
#[derive(Debug)]
pub struct RevealTimer {
    handle: JoinHandle<()>,
}

impl RevealTimer {
    pub fn schedule<F>(reveal_at: Instant, on_elapsed: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(reveal_at).await;
            on_elapsed();
        });
        Self { handle }
    }

    pub fn cancel(self) {
        drop(self);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for RevealTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{ChainOp, InMemoryChain};
    use crate::validation::validate;
    use crate::ChainError;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn flow(chain: &InMemoryChain) -> CommitmentFlow {
        let chain = Arc::new(chain.clone());
        CommitmentFlow::new(
            AvailabilityChecker::new(chain.clone(), "edx"),
            chain.clone(),
            chain,
            Arc::new(RegistrarConfig::default()),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn commit_waits_for_confirmation_and_schedules_reveal() {
        let network = Network::edexa_testnet();
        let owner = Address([1u8; 20]);
        let chain = InMemoryChain::new(network.chain_id, "edx").with_account(owner);

        let pending = flow(&chain)
            .commit(&validate("alice").unwrap(), owner, &network)
            .await
            .unwrap();

        assert_eq!(pending.commitment, pending.params.commitment());
        assert_eq!(pending.reveal_at - pending.confirmed_at, Duration::from_secs(62));
        assert!(!pending.is_revealable(Instant::now()));
        assert_eq!(chain.call_count(ChainOp::SubmitCommitment), 1);
        assert_eq!(chain.call_count(ChainOp::WaitForReceipt), 1);
    }

    #[tokio::test]
    async fn taken_name_never_reaches_the_registrar() {
        let network = Network::edexa_testnet();
        let owner = Address([1u8; 20]);
        let other = Address([2u8; 20]);
        let chain = InMemoryChain::new(network.chain_id, "edx").with_account(owner);
        chain.seed_name(&network, "alice.edx", other);

        let err = flow(&chain)
            .commit(&validate("alice").unwrap(), owner, &network)
            .await
            .unwrap_err();

        assert_eq!(err, RegistrarError::AlreadyRegistered { owner: other });
        assert_eq!(chain.call_count(ChainOp::CommitmentHash), 0);
        assert_eq!(chain.call_count(ChainOp::SubmitCommitment), 0);
    }

    #[tokio::test]
    async fn reverted_commit_is_rejected() {
        let network = Network::edexa_testnet();
        let owner = Address([1u8; 20]);
        let chain = InMemoryChain::new(network.chain_id, "edx").with_account(owner);
        chain.revert_next(ChainOp::SubmitCommitment);

        let err = flow(&chain)
            .commit(&validate("alice").unwrap(), owner, &network)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistrarError::TransactionRejected(_)));
    }

    #[tokio::test]
    async fn user_declining_the_commit_is_rejected() {
        let network = Network::edexa_testnet();
        let owner = Address([1u8; 20]);
        let chain = InMemoryChain::new(network.chain_id, "edx").with_account(owner);
        chain.fail_next(
            ChainOp::SubmitCommitment,
            ChainError::Rejected("User denied transaction signature".into()),
        );

        let err = flow(&chain)
            .commit(&validate("alice").unwrap(), owner, &network)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RegistrarError::TransactionRejected("User denied transaction signature".into())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn reveal_timer_fires_once_deadline_passes() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let timer = RevealTimer::schedule(Instant::now() + Duration::from_secs(62), move || {
            flag.store(true, Ordering::SeqCst)
        });

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(!fired.load(Ordering::SeqCst));
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(fired.load(Ordering::SeqCst));
        assert!(timer.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_never_fires() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let timer = RevealTimer::schedule(Instant::now() + Duration::from_secs(62), move || {
            flag.store(true, Ordering::SeqCst)
        });
        timer.cancel();

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }
}

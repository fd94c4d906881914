//! Second half of a claim: reveal, pay, and bind the forward record.

use crate::commitment::{ensure_success, PendingCommitment};
use crate::config::RegistrarConfig;
use crate::contracts::{RegistrarController, ResolverContract, TxOptions, Wallet};
use crate::errors::{RegisterError, RegistrarError};
use edx_types::{namehash, Address, NameHash, TxHash, Wei};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::info;

/// A completed registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registered {
    pub name: String,
    pub node: NameHash,
    pub owner: Address,
    pub price_paid: Wei,
    pub register_tx: TxHash,
    pub set_addr_tx: TxHash,
}

/// A mined `register` transaction. The commitment is consumed at this point,
/// so only the forward-record binding may be retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaidRegistration {
    pub register_tx: TxHash,
    pub price_paid: Wei,
}

#[derive(Clone)]
pub struct RegistrationFlow {
    wallet: Arc<dyn Wallet>,
    controller: Arc<dyn RegistrarController>,
    resolver: Arc<dyn ResolverContract>,
    config: Arc<RegistrarConfig>,
}

impl RegistrationFlow {
    pub fn new(
        wallet: Arc<dyn Wallet>,
        controller: Arc<dyn RegistrarController>,
        resolver: Arc<dyn ResolverContract>,
        config: Arc<RegistrarConfig>,
    ) -> Self {
        Self {
            wallet,
            controller,
            resolver,
            config,
        }
    }

    /// Register the committed name and point its forward record at the owner.
    ///
    /// Resumes at the binding step when `pending` already carries a paid
    /// registration.
    pub async fn register(
        &self,
        pending: &PendingCommitment,
    ) -> std::result::Result<Registered, RegisterError> {
        let paid = match &pending.paid {
            Some(paid) => paid.clone(),
            None => self.reveal(pending).await?,
        };
        self.bind_forward_record(pending, &paid).await
    }

    /// Pay for and register the committed name.
    ///
    /// Refuses to submit anything before the commitment's reveal instant.
    pub async fn reveal(
        &self,
        pending: &PendingCommitment,
    ) -> std::result::Result<PaidRegistration, RegisterError> {
        let now = Instant::now();
        if !pending.is_revealable(now) {
            return Err(RegistrarError::RevealPending {
                remaining: pending.remaining(now),
            });
        }

        let controller = pending.network.registrar_controller;
        let name = pending.candidate.fully_qualified(&self.config.domain_suffix);
        let price = self
            .controller
            .rent_price(
                controller,
                pending.candidate.as_str(),
                pending.params.duration_secs,
            )
            .await?;
        let payment = price.base_fee();
        let options =
            TxOptions::paying(payment).with_gas(self.config.gas_limit, self.config.gas_price_wei);

        let register_tx = self
            .controller
            .register(controller, pending.owner, &pending.params, options)
            .await?;
        info!(%name, tx = %register_tx, payment = %payment, "registration submitted");
        ensure_success(&self.wallet.wait_for_receipt(register_tx).await?)?;

        Ok(PaidRegistration {
            register_tx,
            price_paid: payment,
        })
    }

    /// Point the registered name's forward record at its owner.
    pub async fn bind_forward_record(
        &self,
        pending: &PendingCommitment,
        paid: &PaidRegistration,
    ) -> std::result::Result<Registered, RegisterError> {
        let owner = pending.owner;
        let name = pending.candidate.fully_qualified(&self.config.domain_suffix);
        let node = namehash(&name);

        let set_addr_tx = self
            .resolver
            .set_forward_address(pending.network.resolver, owner, node, owner)
            .await?;
        ensure_success(&self.wallet.wait_for_receipt(set_addr_tx).await?)?;
        info!(%name, %owner, "registration confirmed and forward record set");

        Ok(Registered {
            name,
            node,
            owner,
            price_paid: paid.price_paid,
            register_tx: paid.register_tx,
            set_addr_tx,
        })
    }
}

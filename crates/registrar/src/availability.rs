//! Ownership lookups against the resolver.

use crate::contracts::ResolverContract;
use crate::errors::{RegistrarError, Result};
use crate::network::Network;
use crate::validation::Candidate;
use edx_types::{reverse_node, Address};
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of an ownership check from the requester's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Available,
    /// Already points at the requesting wallet; committing again is allowed.
    OwnedByRequester,
    Taken(Address),
}

/// Read-only resolver queries. Every call is side-effect free and may be
/// retried.
#[derive(Clone)]
pub struct AvailabilityChecker {
    resolver: Arc<dyn ResolverContract>,
    suffix: String,
}

impl AvailabilityChecker {
    pub fn new(resolver: Arc<dyn ResolverContract>, suffix: impl Into<String>) -> Self {
        Self {
            resolver,
            suffix: suffix.into(),
        }
    }

    /// Forward record of `candidate.suffix`; the zero address when unowned.
    pub async fn owner_of(&self, candidate: &Candidate, network: &Network) -> Result<Address> {
        let node = candidate.node(&self.suffix);
        let owner = self
            .resolver
            .forward_address(network.resolver, node)
            .await
            .map_err(|err| {
                warn!(name = %candidate, network = %network, "ownership lookup failed: {err}");
                RegistrarError::from(err)
            })?;
        debug!(name = %candidate, %owner, "ownership lookup");
        Ok(owner)
    }

    pub async fn check(
        &self,
        candidate: &Candidate,
        requester: Address,
        network: &Network,
    ) -> Result<Availability> {
        let owner = self.owner_of(candidate, network).await?;
        Ok(if owner.is_zero() {
            Availability::Available
        } else if owner == requester {
            Availability::OwnedByRequester
        } else {
            Availability::Taken(owner)
        })
    }

    /// Name the account's reverse record points at, if any. Lookup failures
    /// are logged and treated as "no name".
    pub async fn primary_name(&self, account: Address, network: &Network) -> Option<String> {
        match self
            .resolver
            .reverse_name(network.resolver, reverse_node(&account))
            .await
        {
            Ok(name) if !name.is_empty() => Some(name),
            Ok(_) => None,
            Err(err) => {
                warn!(%account, "reverse name lookup failed: {err}");
                None
            }
        }
    }
}

//! Registration parameters and client policy.

use crate::errors::{RegistrarError, Result};
use crate::network::Network;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Minimum commitment age enforced by the registrar controller.
pub const MIN_COMMITMENT_AGE: Duration = Duration::from_secs(60);

/// What happens to the commit action after a transient commit failure.
///
/// A name that is already owned always keeps commit disabled for that name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitRetryPolicy {
    /// Re-enable commit so the user can try again.
    #[default]
    AllowRetry,
    /// Keep commit disabled until the session is reset by a wallet change.
    DisableAfterFailure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrarConfig {
    /// Appended to every candidate, without the leading dot.
    pub domain_suffix: String,
    pub registration_duration_secs: u64,
    /// Wait between commit confirmation and enabling registration. Kept a
    /// little above [`MIN_COMMITMENT_AGE`].
    pub reveal_wait_secs: u64,
    pub min_name_length: usize,
    pub gas_limit: u64,
    pub gas_price_wei: u64,
    pub commit_retry: CommitRetryPolicy,
    pub extra_networks: Vec<Network>,
}

impl Default for RegistrarConfig {
    fn default() -> Self {
        Self {
            domain_suffix: "edx".to_string(),
            registration_duration_secs: 31_536_000,
            reveal_wait_secs: 62,
            min_name_length: 4,
            gas_limit: 1_000_000,
            gas_price_wei: 1_000_000_000,
            commit_retry: CommitRetryPolicy::AllowRetry,
            extra_networks: Vec::new(),
        }
    }
}

impl RegistrarConfig {
    pub fn registration_duration(&self) -> Duration {
        Duration::from_secs(self.registration_duration_secs)
    }

    pub fn reveal_wait(&self) -> Duration {
        Duration::from_secs(self.reveal_wait_secs)
    }

    /// Reject values that would make every registration fail.
    pub fn validate(&self) -> Result<()> {
        if self.domain_suffix.is_empty() || self.domain_suffix.contains('.') {
            return Err(RegistrarError::InvalidConfig(format!(
                "domain_suffix must be a single label, got {:?}",
                self.domain_suffix
            )));
        }
        if self.registration_duration_secs == 0 {
            return Err(RegistrarError::InvalidConfig(
                "registration_duration_secs must be positive".into(),
            ));
        }
        if self.reveal_wait() < MIN_COMMITMENT_AGE {
            return Err(RegistrarError::InvalidConfig(format!(
                "reveal_wait_secs must be at least {}, got {}",
                MIN_COMMITMENT_AGE.as_secs(),
                self.reveal_wait_secs
            )));
        }
        if self.min_name_length == 0 {
            return Err(RegistrarError::InvalidConfig(
                "min_name_length must be positive".into(),
            ));
        }
        if self.gas_limit == 0 {
            return Err(RegistrarError::InvalidConfig("gas_limit must be positive".into()));
        }
        Ok(())
    }
}

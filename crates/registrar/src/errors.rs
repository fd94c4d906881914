//! Error types for the registration flows

use crate::session::Phase;
use edx_types::Address;
use std::time::Duration;
use thiserror::Error;

/// Local, syntactic rejection of a candidate name. Shown inline next to the
/// input field and never reaches the chain.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Domain name is required")]
    Required,

    #[error("Domain name must be at least {min} characters")]
    TooShort { min: usize },

    #[error("Domain name cannot contain dots")]
    ContainsDot,
}

impl ValidationError {
    /// Stable machine-readable reason code.
    pub fn reason(&self) -> &'static str {
        match self {
            ValidationError::Required => "required",
            ValidationError::TooShort { .. } => "min_length",
            ValidationError::ContainsDot => "contains_dot",
        }
    }
}

/// Failure reported by a wallet or contract collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// Wallet or node unreachable, malformed response, timeout.
    #[error("provider error: {0}")]
    Provider(String),

    /// The user declined the request or the contract reverted.
    #[error("transaction rejected: {0}")]
    Rejected(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrarError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Domain already registered by: {owner}")]
    AlreadyRegistered { owner: Address },

    #[error("provider error: {0}")]
    Provider(String),

    #[error("transaction rejected: {0}")]
    TransactionRejected(String),

    #[error("unsupported network (chain id {chain_id})")]
    UnsupportedNetwork { chain_id: u64 },

    #[error("wallet is not connected")]
    NotConnected,

    #[error("reveal delay has not elapsed yet ({} s remaining)", .remaining.as_secs())]
    RevealPending { remaining: Duration },

    #[error("{action} is not available while {phase}")]
    ActionUnavailable { action: &'static str, phase: Phase },

    #[error("name {entered} does not match the committed name {committed}")]
    CandidateMismatch { entered: String, committed: String },

    #[error("session was invalidated by a wallet change")]
    SessionInvalidated,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl RegistrarError {
    /// Whether re-submitting the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RegistrarError::Provider(_)
                | RegistrarError::TransactionRejected(_)
                | RegistrarError::RevealPending { .. }
                | RegistrarError::SessionInvalidated
        )
    }
}

impl From<ChainError> for RegistrarError {
    fn from(value: ChainError) -> Self {
        match value {
            ChainError::Provider(message) => RegistrarError::Provider(message),
            ChainError::Rejected(message) => RegistrarError::TransactionRejected(message),
        }
    }
}

/// Error returned by [`crate::CommitmentFlow::commit`].
pub type CommitError = RegistrarError;
/// Error returned by [`crate::RegistrationFlow::register`].
pub type RegisterError = RegistrarError;

pub type Result<T> = std::result::Result<T, RegistrarError>;

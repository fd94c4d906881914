//! Commit-reveal registration of `.edx` names.
//!
//! A name is claimed in two transactions separated by a mandatory reveal
//! delay: a commitment that hides the name, then the paid registration that
//! reveals it. [`RegistrationSession`] sequences the flows and exposes the
//! observable state a UI shell renders; the chain itself is reached through
//! the collaborator traits in [`contracts`].

pub mod availability;
pub mod commitment;
pub mod config;
pub mod contracts;
pub mod errors;
pub mod memory;
pub mod network;
pub mod registration;
pub mod session;
pub mod validation;

pub use availability::{Availability, AvailabilityChecker};
pub use commitment::{CommitmentFlow, PendingCommitment, RevealTimer};
pub use config::{CommitRetryPolicy, RegistrarConfig};
pub use contracts::*;
pub use errors::*;
pub use memory::{ChainOp, InMemoryChain};
pub use network::{Network, NetworkTable};
pub use registration::{PaidRegistration, Registered, RegistrationFlow};
pub use session::{Phase, RegistrationSession, SessionSnapshot, Submitted};
pub use validation::{normalize_input, validate, Candidate, NameValidator, ValidationReport};

/// Re-export commonly used primitives
pub use edx_types::{Address, CommitmentHash, NameHash, TxHash, Wei};

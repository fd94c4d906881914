//! The claim state machine driven by a UI shell.
//!
//! ```text
//! Idle ──submit──▶ Committing ──confirmed──▶ AwaitingReveal ──timer──▶ ReadyToRegister
//!  ▲                  │ error                                             │ submit
//!  └──────────────────┘                                                   ▼
//! Registered ◀──────────────────confirmed─────────────────────────── Registering
//!                                                                  (error: back to ReadyToRegister)
//! ```
//!
//! Action flags change synchronously when a submission is accepted, before
//! any chain call is awaited, so a second submit while one is in flight is
//! refused. A wallet account or chain change bumps the session generation,
//! aborts the reveal timer and resets the phase; flow results that arrive for
//! an older generation are dropped. Once `register` is mined, a failed
//! forward-record binding leaves the session in `ReadyToRegister` and the
//! next register only repeats the binding.

use crate::availability::AvailabilityChecker;
use crate::commitment::{CommitmentFlow, PendingCommitment, RevealTimer};
use crate::config::{CommitRetryPolicy, RegistrarConfig};
use crate::contracts::{RegistrarController, ResolverContract, Wallet, WalletEvent};
use crate::errors::{RegistrarError, Result};
use crate::network::{Network, NetworkTable, WRONG_NETWORK_MESSAGE};
use crate::registration::{Registered, RegistrationFlow};
use crate::validation::{normalize_input, NameValidator, ValidationReport};
use edx_types::Address;
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub const MSG_COMMITTING: &str = "Committing...";
pub const MSG_READY: &str = "Register now...";
pub const MSG_REGISTERING: &str = "Registration in progress...";
pub const MSG_REGISTERED: &str = "Registration Successful.. !";
pub const MSG_COMMIT_FAILED: &str = "Error while committing. Please try again";
pub const MSG_REGISTER_FAILED: &str = "Error occurred while registering.. Try again later";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Committing,
    AwaitingReveal,
    ReadyToRegister,
    Registering,
    Registered,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Phase::Idle => "idle",
            Phase::Committing => "committing",
            Phase::AwaitingReveal => "awaiting reveal",
            Phase::ReadyToRegister => "ready to register",
            Phase::Registering => "registering",
            Phase::Registered => "registered",
        };
        f.write_str(value)
    }
}

/// Observable fields rendered by the shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub status_message: String,
    /// Inline error keyed to the name field.
    pub field_error: Option<String>,
    pub commit_enabled: bool,
    pub commit_visible: bool,
    pub register_enabled: bool,
    pub register_visible: bool,
    pub account: Option<Address>,
    pub network: Option<Network>,
    /// Chain id the wallet reported, supported or not.
    pub chain_id: Option<u64>,
    pub primary_name: Option<String>,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            status_message: String::new(),
            field_error: None,
            commit_enabled: false,
            commit_visible: true,
            register_enabled: false,
            register_visible: false,
            account: None,
            network: None,
            chain_id: None,
            primary_name: None,
        }
    }
}

/// Why commit is held disabled outside of an in-flight submission.
#[derive(Debug, Clone, PartialEq, Eq)]
enum CommitLock {
    /// The name is owned by someone else; lifted when the input changes.
    NameTaken(String),
    /// Transient failure under [`CommitRetryPolicy::DisableAfterFailure`].
    Failed,
}

struct SessionState {
    generation: u64,
    snapshot: SessionSnapshot,
    pending: Option<PendingCommitment>,
    commit_lock: Option<CommitLock>,
    reveal_timer: Option<RevealTimer>,
}

impl SessionState {
    fn connection(&self) -> Result<(Address, Network)> {
        let account = self.snapshot.account.ok_or(RegistrarError::NotConnected)?;
        match &self.snapshot.network {
            Some(network) => Ok((account, network.clone())),
            None => match self.snapshot.chain_id {
                Some(chain_id) => Err(RegistrarError::UnsupportedNetwork { chain_id }),
                None => Err(RegistrarError::NotConnected),
            },
        }
    }

    /// Recompute action flags for phases that are not in flight.
    fn refresh_actions(&mut self) {
        let connected = self.snapshot.account.is_some() && self.snapshot.network.is_some();
        let snapshot = &mut self.snapshot;
        match snapshot.phase {
            Phase::Idle | Phase::Registered => {
                snapshot.commit_visible = true;
                snapshot.commit_enabled = connected && self.commit_lock.is_none();
                snapshot.register_visible = false;
                snapshot.register_enabled = false;
            }
            Phase::ReadyToRegister => {
                snapshot.commit_visible = false;
                snapshot.commit_enabled = false;
                snapshot.register_visible = true;
                snapshot.register_enabled = connected;
            }
            Phase::Committing | Phase::AwaitingReveal | Phase::Registering => {
                snapshot.commit_enabled = false;
                snapshot.register_enabled = false;
            }
        }
    }

    /// Drop everything tied to the current attempt.
    fn invalidate(&mut self, reason: &str) {
        self.generation += 1;
        if let Some(timer) = self.reveal_timer.take() {
            timer.cancel();
        }
        if self.pending.take().is_some() || self.snapshot.phase != Phase::Idle {
            info!(generation = self.generation, "session invalidated: {reason}");
        }
        self.snapshot.phase = Phase::Idle;
        self.snapshot.field_error = None;
        self.snapshot.status_message.clear();
        self.commit_lock = None;
    }

    fn apply_chain(&mut self, chain_id: u64, networks: &NetworkTable) {
        self.snapshot.chain_id = Some(chain_id);
        match networks.resolve(chain_id) {
            Ok(network) => {
                debug!(%network, "network resolved");
                self.snapshot.network = Some(network);
                if self.snapshot.status_message == WRONG_NETWORK_MESSAGE {
                    self.snapshot.status_message.clear();
                }
            }
            Err(_) => {
                warn!(chain_id, "connected to an unsupported network");
                self.snapshot.network = None;
                self.snapshot.status_message = WRONG_NETWORK_MESSAGE.to_string();
            }
        }
    }
}

struct SessionInner {
    state: Mutex<SessionState>,
    updates: watch::Sender<SessionSnapshot>,
}

impl SessionInner {
    fn publish(&self, state: &SessionState) {
        self.updates.send_replace(state.snapshot.clone());
    }

    fn reveal_elapsed(&self, generation: u64) {
        let mut state = self.state.lock();
        if state.generation != generation || state.snapshot.phase != Phase::AwaitingReveal {
            return;
        }
        state.snapshot.phase = Phase::ReadyToRegister;
        state.snapshot.status_message = MSG_READY.to_string();
        state.refresh_actions();
        info!(generation, "reveal delay elapsed, registration enabled");
        self.publish(&state);
    }
}

/// Result of [`RegistrationSession::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submitted {
    Committed,
    Registered(Registered),
}

/// One claim attempt at a time. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct RegistrationSession {
    inner: Arc<SessionInner>,
    wallet: Arc<dyn Wallet>,
    networks: Arc<NetworkTable>,
    validator: NameValidator,
    availability: AvailabilityChecker,
    commitments: CommitmentFlow,
    registrations: RegistrationFlow,
    config: Arc<RegistrarConfig>,
}

impl RegistrationSession {
    pub fn new(
        wallet: Arc<dyn Wallet>,
        resolver: Arc<dyn ResolverContract>,
        controller: Arc<dyn RegistrarController>,
        config: RegistrarConfig,
    ) -> Self {
        let config = Arc::new(config);
        let networks = Arc::new(NetworkTable::with_extra(&config.extra_networks));
        let availability = AvailabilityChecker::new(resolver.clone(), config.domain_suffix.clone());
        let commitments = CommitmentFlow::new(
            availability.clone(),
            wallet.clone(),
            controller.clone(),
            config.clone(),
        );
        let registrations =
            RegistrationFlow::new(wallet.clone(), controller, resolver, config.clone());

        let snapshot = SessionSnapshot::default();
        let (updates, _receiver) = watch::channel(snapshot.clone());
        let state = SessionState {
            generation: 0,
            snapshot,
            pending: None,
            commit_lock: None,
            reveal_timer: None,
        };

        Self {
            inner: Arc::new(SessionInner {
                state: Mutex::new(state),
                updates,
            }),
            wallet,
            networks,
            validator: NameValidator::new(config.min_name_length),
            availability,
            commitments,
            registrations,
            config,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.state.lock().snapshot.clone()
    }

    /// Receive a new snapshot after every transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.updates.subscribe()
    }

    pub fn networks(&self) -> &NetworkTable {
        &self.networks
    }

    pub fn config(&self) -> &RegistrarConfig {
        &self.config
    }

    /// Read-only ownership lookups on the session's resolver binding.
    pub fn availability(&self) -> &AvailabilityChecker {
        &self.availability
    }

    /// Commitment currently waiting for (or past) its reveal window.
    pub fn pending(&self) -> Option<PendingCommitment> {
        self.inner.state.lock().pending.clone()
    }

    pub fn validate(&self, input: &str) -> ValidationReport {
        self.validator.report(input)
    }

    /// Apply the keystroke filter to a field edit and return the value to
    /// display. Editing away from a name that was found taken re-enables
    /// commit.
    pub fn input_changed(&self, raw: &str) -> String {
        let normalized = normalize_input(raw);
        let mut state = self.inner.state.lock();
        if let Some(CommitLock::NameTaken(name)) = &state.commit_lock {
            if *name != normalized {
                state.commit_lock = None;
                state.snapshot.field_error = None;
                state.refresh_actions();
                self.inner.publish(&state);
            }
        }
        normalized
    }

    /// Prompt the wallet for accounts and resolve the connected network.
    pub async fn connect(&self) -> Result<SessionSnapshot> {
        let accounts = self.wallet.request_accounts().await?;
        self.apply_connection(accounts).await
    }

    /// Re-read accounts and chain without prompting.
    pub async fn refresh_connection(&self) -> Result<SessionSnapshot> {
        let accounts = self.wallet.list_accounts().await?;
        self.apply_connection(accounts).await
    }

    async fn apply_connection(&self, accounts: Vec<Address>) -> Result<SessionSnapshot> {
        let chain_id = self.wallet.chain_id().await?;
        let account = accounts.first().copied();
        {
            let mut state = self.inner.state.lock();
            let account_changed = state.snapshot.account != account;
            let chain_changed = state.snapshot.chain_id != Some(chain_id);
            if account_changed || chain_changed {
                state.invalidate("wallet connection changed");
                state.snapshot.primary_name = None;
            }
            state.snapshot.account = account;
            state.apply_chain(chain_id, &self.networks);
            state.refresh_actions();
            self.inner.publish(&state);
            state.connection()?;
        }
        self.refresh_primary_name().await;
        Ok(self.snapshot())
    }

    async fn refresh_primary_name(&self) {
        let (generation, connection) = {
            let state = self.inner.state.lock();
            (state.generation, state.connection())
        };
        let Ok((account, network)) = connection else {
            return;
        };
        let name = self.availability.primary_name(account, &network).await;
        let mut state = self.inner.state.lock();
        if state.generation == generation && state.snapshot.account == Some(account) {
            state.snapshot.primary_name = name;
            self.inner.publish(&state);
        }
    }

    /// React to an account or chain change reported by the wallet.
    pub async fn handle_wallet_event(&self, event: WalletEvent) {
        match event {
            WalletEvent::AccountsChanged(accounts) => {
                let account = accounts.first().copied();
                {
                    let mut state = self.inner.state.lock();
                    if state.snapshot.account == account {
                        return;
                    }
                    state.invalidate("wallet account changed");
                    state.snapshot.account = account;
                    state.snapshot.primary_name = None;
                    state.refresh_actions();
                    self.inner.publish(&state);
                }
                self.refresh_primary_name().await;
            }
            WalletEvent::ChainChanged(chain_id) => {
                {
                    let mut state = self.inner.state.lock();
                    state.invalidate("wallet network changed");
                    state.snapshot.network = None;
                    state.snapshot.primary_name = None;
                    state.refresh_actions();
                    self.inner.publish(&state);

                    state.apply_chain(chain_id, &self.networks);
                    state.refresh_actions();
                    self.inner.publish(&state);
                }
                self.refresh_primary_name().await;
            }
        }
    }

    /// Forward wallet notifications into [`Self::handle_wallet_event`] until
    /// the wallet closes its channel.
    pub fn watch_wallet(&self) -> JoinHandle<()> {
        let mut events = self.wallet.subscribe();
        let session = self.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => session.handle_wallet_event(event).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "missed wallet events, re-reading connection");
                        if let Err(err) = session.refresh_connection().await {
                            warn!("failed to refresh wallet connection: {err}");
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Dispatch a form submission according to the current phase. The input
    /// goes through the keystroke filter before validation, as the field
    /// value would.
    pub async fn submit(&self, input: &str) -> Result<Submitted> {
        let phase = self.inner.state.lock().snapshot.phase;
        match phase {
            Phase::Idle | Phase::Registered | Phase::Committing => {
                self.commit(input).await.map(|_| Submitted::Committed)
            }
            Phase::ReadyToRegister | Phase::Registering | Phase::AwaitingReveal => {
                self.register(input).await.map(Submitted::Registered)
            }
        }
    }

    /// Start a new attempt: check availability, commit, and schedule the
    /// reveal timer.
    pub async fn commit(&self, input: &str) -> Result<()> {
        let (generation, candidate, owner, network) = {
            let mut state = self.inner.state.lock();
            let phase = state.snapshot.phase;
            if !matches!(phase, Phase::Idle | Phase::Registered) {
                return Err(RegistrarError::ActionUnavailable {
                    action: "commit",
                    phase,
                });
            }
            let (owner, network) = state.connection()?;
            if !state.snapshot.commit_enabled {
                return Err(RegistrarError::ActionUnavailable {
                    action: "commit",
                    phase,
                });
            }
            let candidate = match self.validator.validate(&normalize_input(input)) {
                Ok(candidate) => candidate,
                Err(err) => {
                    state.snapshot.field_error = Some(err.to_string());
                    self.inner.publish(&state);
                    return Err(err.into());
                }
            };

            state.snapshot.phase = Phase::Committing;
            state.snapshot.field_error = None;
            state.snapshot.status_message = MSG_COMMITTING.to_string();
            state.snapshot.commit_enabled = false;
            state.snapshot.register_enabled = false;
            state.snapshot.register_visible = false;
            self.inner.publish(&state);
            (state.generation, candidate, owner, network)
        };

        let outcome = self.commitments.commit(&candidate, owner, &network).await;

        let mut state = self.inner.state.lock();
        if state.generation != generation {
            debug!(name = %candidate, "dropping commit result from an invalidated session");
            return Err(RegistrarError::SessionInvalidated);
        }

        match outcome {
            Ok(pending) => {
                let reveal_at = pending.reveal_at;
                state.snapshot.phase = Phase::AwaitingReveal;
                state.snapshot.status_message = format!(
                    "Commitment Successful. Please wait {} seconds for registration.",
                    self.config.reveal_wait_secs
                );
                state.pending = Some(pending);

                let inner: Weak<SessionInner> = Arc::downgrade(&self.inner);
                state.reveal_timer = Some(RevealTimer::schedule(reveal_at, move || {
                    if let Some(inner) = inner.upgrade() {
                        inner.reveal_elapsed(generation);
                    }
                }));
                state.refresh_actions();
                self.inner.publish(&state);
                Ok(())
            }
            Err(err) => {
                warn!(name = %candidate, "commit failed: {err}");
                state.snapshot.phase = Phase::Idle;
                state.snapshot.field_error = Some(match &err {
                    RegistrarError::AlreadyRegistered { .. } => err.to_string(),
                    _ => MSG_COMMIT_FAILED.to_string(),
                });
                state.snapshot.status_message.clear();
                state.commit_lock = match (&err, self.config.commit_retry) {
                    (RegistrarError::AlreadyRegistered { .. }, _) => {
                        Some(CommitLock::NameTaken(candidate.as_str().to_string()))
                    }
                    (_, CommitRetryPolicy::DisableAfterFailure) => Some(CommitLock::Failed),
                    (_, CommitRetryPolicy::AllowRetry) => None,
                };
                state.refresh_actions();
                self.inner.publish(&state);
                Err(err)
            }
        }
    }

    /// Reveal the pending commitment once the wait has elapsed.
    pub async fn register(&self, input: &str) -> Result<Registered> {
        let (generation, pending) = {
            let mut state = self.inner.state.lock();
            let phase = state.snapshot.phase;
            match phase {
                Phase::ReadyToRegister => {}
                Phase::AwaitingReveal => {
                    let remaining = state
                        .pending
                        .as_ref()
                        .map(|p| p.remaining(Instant::now()))
                        .unwrap_or_default();
                    return Err(RegistrarError::RevealPending { remaining });
                }
                _ => {
                    return Err(RegistrarError::ActionUnavailable {
                        action: "register",
                        phase,
                    })
                }
            }
            state.connection()?;
            if !state.snapshot.register_enabled {
                return Err(RegistrarError::ActionUnavailable {
                    action: "register",
                    phase,
                });
            }
            let candidate = match self.validator.validate(&normalize_input(input)) {
                Ok(candidate) => candidate,
                Err(err) => {
                    state.snapshot.field_error = Some(err.to_string());
                    self.inner.publish(&state);
                    return Err(err.into());
                }
            };
            let Some(pending) = state.pending.clone() else {
                return Err(RegistrarError::ActionUnavailable {
                    action: "register",
                    phase,
                });
            };
            if pending.candidate != candidate {
                let err = RegistrarError::CandidateMismatch {
                    entered: candidate.as_str().to_string(),
                    committed: pending.candidate.as_str().to_string(),
                };
                state.snapshot.field_error = Some(err.to_string());
                self.inner.publish(&state);
                return Err(err);
            }

            state.snapshot.phase = Phase::Registering;
            state.snapshot.field_error = None;
            state.snapshot.status_message = MSG_REGISTERING.to_string();
            state.snapshot.register_enabled = false;
            self.inner.publish(&state);
            (state.generation, pending)
        };

        let paid = match pending.paid.clone() {
            Some(paid) => {
                info!(
                    name = %pending.candidate,
                    tx = %paid.register_tx,
                    "name already paid for, binding forward record"
                );
                paid
            }
            None => {
                let outcome = self.registrations.reveal(&pending).await;
                let mut state = self.inner.state.lock();
                if state.generation != generation {
                    debug!(name = %pending.candidate, "dropping register result from an invalidated session");
                    return Err(RegistrarError::SessionInvalidated);
                }
                match outcome {
                    Ok(paid) => {
                        if let Some(stored) = state.pending.as_mut() {
                            stored.paid = Some(paid.clone());
                        }
                        paid
                    }
                    Err(err) => return Err(self.registration_failed(&mut state, &pending, err)),
                }
            }
        };

        let outcome = self.registrations.bind_forward_record(&pending, &paid).await;

        let mut state = self.inner.state.lock();
        if state.generation != generation {
            debug!(name = %pending.candidate, "dropping register result from an invalidated session");
            return Err(RegistrarError::SessionInvalidated);
        }

        match outcome {
            Ok(registered) => {
                state.snapshot.phase = Phase::Registered;
                state.snapshot.status_message = MSG_REGISTERED.to_string();
                state.pending = None;
                state.reveal_timer = None;
                state.refresh_actions();
                self.inner.publish(&state);
                Ok(registered)
            }
            Err(err) => Err(self.registration_failed(&mut state, &pending, err)),
        }
    }

    fn registration_failed(
        &self,
        state: &mut SessionState,
        pending: &PendingCommitment,
        err: RegistrarError,
    ) -> RegistrarError {
        warn!(name = %pending.candidate, "registration failed: {err}");
        state.snapshot.phase = Phase::ReadyToRegister;
        state.snapshot.status_message = MSG_REGISTER_FAILED.to_string();
        state.refresh_actions();
        self.inner.publish(state);
        err
    }
}

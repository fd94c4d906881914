//! End-to-end claim flows against the in-memory chain.

use edx_registrar::{
    Address, ChainError, ChainOp, CommitRetryPolicy, InMemoryChain, Network, Phase,
    RegistrarConfig, RegistrarError, RegistrationSession, SessionSnapshot, Submitted, Wei,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

const OWNER: Address = Address([0x5a; 20]);

fn setup(config: RegistrarConfig) -> (InMemoryChain, RegistrationSession, Network) {
    let network = Network::edexa_testnet();
    let chain = InMemoryChain::new(network.chain_id, "edx").with_account(OWNER);
    chain.set_rent_price(Wei::from(3_170_979_198_376u64), Wei::zero());
    let shared = Arc::new(chain.clone());
    let session = RegistrationSession::new(shared.clone(), shared.clone(), shared, config);
    (chain, session, network)
}

async fn until(
    updates: &mut watch::Receiver<SessionSnapshot>,
    predicate: impl FnMut(&SessionSnapshot) -> bool,
) -> SessionSnapshot {
    updates.wait_for(predicate).await.unwrap().clone()
}

#[tokio::test(start_paused = true)]
async fn claims_testname_end_to_end() {
    let (chain, session, network) = setup(RegistrarConfig::default());
    session.connect().await.unwrap();
    let mut updates = session.subscribe();

    assert_eq!(session.submit("testname").await.unwrap(), Submitted::Committed);
    let snapshot = session.snapshot();
    assert_eq!(snapshot.phase, Phase::AwaitingReveal);
    assert_eq!(
        snapshot.status_message,
        "Commitment Successful. Please wait 62 seconds for registration."
    );
    assert!(!snapshot.commit_enabled);
    assert!(!snapshot.register_enabled);

    let ready = until(&mut updates, |s| s.phase == Phase::ReadyToRegister).await;
    assert!(ready.register_enabled && ready.register_visible);
    assert!(!ready.commit_visible);

    let Submitted::Registered(registered) = session.submit("testname").await.unwrap() else {
        panic!("expected a registration");
    };
    assert_eq!(registered.name, "testname.edx");
    assert_eq!(registered.owner, OWNER);
    assert_eq!(
        registered.node.to_string(),
        "0x6dd142fe8c306951ddac6979ff935fe7e2dd19661932b426fe3207e01940cfb0"
    );
    assert_eq!(chain.forward_record(&network, "testname.edx"), OWNER);
    assert_eq!(chain.registrant(&network, "testname.edx"), Some(OWNER));

    let done = session.snapshot();
    assert_eq!(done.phase, Phase::Registered);
    assert_eq!(done.status_message, "Registration Successful.. !");
    assert!(session.pending().is_none());
}

#[tokio::test(start_paused = true)]
async fn register_enables_only_after_reveal_wait() {
    let (chain, session, _) = setup(RegistrarConfig::default());
    session.connect().await.unwrap();
    session.commit("testname").await.unwrap();

    tokio::time::sleep(Duration::from_secs(61)).await;
    assert!(!session.snapshot().register_enabled);

    let err = session.register("testname").await.unwrap_err();
    assert!(matches!(err, RegistrarError::RevealPending { remaining } if remaining <= Duration::from_secs(1)));
    assert_eq!(chain.call_count(ChainOp::RentPrice), 0);
    assert_eq!(chain.call_count(ChainOp::Register), 0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    let snapshot = session.snapshot();
    assert_eq!(snapshot.phase, Phase::ReadyToRegister);
    assert!(snapshot.register_enabled);
}

#[tokio::test(start_paused = true)]
async fn owned_name_never_submits_a_commitment() {
    let (chain, session, network) = setup(RegistrarConfig::default());
    let other = Address([0x77; 20]);
    chain.seed_name(&network, "testname.edx", other);
    session.connect().await.unwrap();

    let err = session.submit("testname").await.unwrap_err();
    assert_eq!(err, RegistrarError::AlreadyRegistered { owner: other });
    assert_eq!(chain.call_count(ChainOp::SubmitCommitment), 0);
    assert_eq!(session.snapshot().phase, Phase::Idle);
}

#[tokio::test(start_paused = true)]
async fn name_owned_by_requester_can_be_committed_again() {
    let (chain, session, network) = setup(RegistrarConfig::default());
    chain.seed_name(&network, "testname.edx", OWNER);
    session.connect().await.unwrap();

    session.commit("testname").await.unwrap();
    assert_eq!(chain.call_count(ChainOp::SubmitCommitment), 1);
}

#[tokio::test(start_paused = true)]
async fn network_switch_during_wait_invalidates_the_attempt() {
    let (chain, session, _) = setup(RegistrarConfig::default());
    session.connect().await.unwrap();
    let watcher = session.watch_wallet();
    let mut updates = session.subscribe();

    session.commit("testname").await.unwrap();
    chain.switch_chain(1);

    let snapshot = until(&mut updates, |s| s.chain_id == Some(1)).await;
    assert_eq!(snapshot.phase, Phase::Idle);
    assert_eq!(snapshot.network, None);
    assert_eq!(
        snapshot.status_message,
        "Please Connect to edeXa Testnet or Mainnet"
    );
    assert!(!snapshot.commit_enabled);
    assert!(!snapshot.register_enabled);
    assert!(session.pending().is_none());

    tokio::time::sleep(Duration::from_secs(120)).await;
    let snapshot = session.snapshot();
    assert_eq!(snapshot.phase, Phase::Idle);
    assert!(!snapshot.register_enabled);

    chain.switch_chain(5424);
    let snapshot = until(&mut updates, |s| s.chain_id == Some(5424)).await;
    assert_eq!(snapshot.network, Some(Network::edexa_mainnet()));
    assert!(snapshot.commit_enabled);
    watcher.abort();
}

#[tokio::test(start_paused = true)]
async fn account_switch_mid_commit_drops_the_result() {
    let network = Network::edexa_testnet();
    let chain = InMemoryChain::new(network.chain_id, "edx")
        .with_account(OWNER)
        .with_latency(Duration::from_secs(1));
    let shared = Arc::new(chain.clone());
    let session =
        RegistrationSession::new(shared.clone(), shared.clone(), shared, RegistrarConfig::default());
    session.connect().await.unwrap();

    let commit = {
        let session = session.clone();
        tokio::spawn(async move { session.commit("testname").await })
    };
    tokio::task::yield_now().await;
    assert_eq!(session.snapshot().phase, Phase::Committing);

    let newcomer = Address([0x66; 20]);
    session
        .handle_wallet_event(edx_registrar::WalletEvent::AccountsChanged(vec![newcomer]))
        .await;

    let err = commit.await.unwrap().unwrap_err();
    assert_eq!(err, RegistrarError::SessionInvalidated);
    let snapshot = session.snapshot();
    assert_eq!(snapshot.phase, Phase::Idle);
    assert_eq!(snapshot.account, Some(newcomer));
    assert!(session.pending().is_none());
}

#[tokio::test(start_paused = true)]
async fn transient_commit_failure_allows_retry_by_default() {
    let (chain, session, _) = setup(RegistrarConfig::default());
    session.connect().await.unwrap();
    chain.fail_next(
        ChainOp::SubmitCommitment,
        ChainError::Rejected("User denied transaction signature".into()),
    );

    assert!(session.commit("testname").await.is_err());
    let snapshot = session.snapshot();
    assert_eq!(snapshot.phase, Phase::Idle);
    assert_eq!(
        snapshot.field_error.as_deref(),
        Some("Error while committing. Please try again")
    );
    assert!(snapshot.commit_enabled);

    session.commit("testname").await.unwrap();
    assert_eq!(session.snapshot().phase, Phase::AwaitingReveal);
}

#[tokio::test(start_paused = true)]
async fn disable_after_failure_policy_keeps_commit_locked() {
    let config = RegistrarConfig {
        commit_retry: CommitRetryPolicy::DisableAfterFailure,
        ..RegistrarConfig::default()
    };
    let (chain, session, _) = setup(config);
    session.connect().await.unwrap();
    chain.fail_next(ChainOp::ForwardAddress, ChainError::Provider("node offline".into()));

    assert!(session.commit("testname").await.is_err());
    assert!(!session.snapshot().commit_enabled);
    assert!(matches!(
        session.commit("testname").await.unwrap_err(),
        RegistrarError::ActionUnavailable { action: "commit", .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn failed_registration_can_be_retried() {
    let (chain, session, network) = setup(RegistrarConfig::default());
    session.connect().await.unwrap();
    let mut updates = session.subscribe();
    session.commit("testname").await.unwrap();
    until(&mut updates, |s| s.phase == Phase::ReadyToRegister).await;

    chain.fail_next(ChainOp::Register, ChainError::Provider("gateway timeout".into()));
    let err = session.register("testname").await.unwrap_err();
    assert_eq!(err, RegistrarError::Provider("gateway timeout".into()));
    let snapshot = session.snapshot();
    assert_eq!(snapshot.phase, Phase::ReadyToRegister);
    assert_eq!(
        snapshot.status_message,
        "Error occurred while registering.. Try again later"
    );
    assert!(snapshot.register_enabled);

    session.register("testname").await.unwrap();
    assert_eq!(chain.forward_record(&network, "testname.edx"), OWNER);
}

#[tokio::test(start_paused = true)]
async fn reverted_forward_binding_is_retried_on_its_own() {
    let (chain, session, network) = setup(RegistrarConfig::default());
    session.connect().await.unwrap();
    let mut updates = session.subscribe();
    session.commit("testname").await.unwrap();
    until(&mut updates, |s| s.phase == Phase::ReadyToRegister).await;

    chain.revert_next(ChainOp::SetForwardAddress);
    let err = session.register("testname").await.unwrap_err();
    assert!(matches!(err, RegistrarError::TransactionRejected(_)));
    assert_eq!(chain.registrant(&network, "testname.edx"), Some(OWNER));
    assert!(session.snapshot().register_enabled);

    for _ in 0..2 {
        chain.revert_next(ChainOp::SetForwardAddress);
        assert!(session.register("testname").await.is_err());
    }
    let registered = session.register("testname").await.unwrap();
    assert_eq!(registered.price_paid, Wei::from(3_170_979_198_376u64));
    assert_eq!(chain.call_count(ChainOp::Register), 1);
    assert_eq!(chain.forward_record(&network, "testname.edx"), OWNER);
    assert_eq!(session.snapshot().phase, Phase::Registered);
}

#[tokio::test(start_paused = true)]
async fn rent_above_128_bits_is_paid_in_full() {
    let (chain, session, network) = setup(RegistrarConfig::default());
    let base = Wei::from(u128::MAX) + Wei::from(5u64);
    chain.set_rent_price(base, Wei::from(1u64));
    session.connect().await.unwrap();
    let mut updates = session.subscribe();
    session.commit("testname").await.unwrap();
    until(&mut updates, |s| s.phase == Phase::ReadyToRegister).await;

    let err = session.register("testname").await.unwrap_err();
    assert!(matches!(err, RegistrarError::TransactionRejected(msg) if msg.contains("InsufficientValue")));
    assert_eq!(chain.registrant(&network, "testname.edx"), None);

    chain.set_rent_price(base, Wei::zero());
    let registered = session.register("testname").await.unwrap();
    assert_eq!(registered.price_paid, base);
    assert_eq!(chain.registrant(&network, "testname.edx"), Some(OWNER));
}

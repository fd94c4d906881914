use crate::config::AppConfig;
use anyhow::{bail, Context, Result};
use edx_provider::{session_for_endpoint, JsonRpcWallet, WalletOptions};
use edx_registrar::{
    network::EDEXA_TESTNET_CHAIN_ID, normalize_input, Availability, InMemoryChain, NameValidator,
    Network, NetworkTable, Phase, RegistrationSession, SessionSnapshot,
};
use edx_types::{Address, Wei};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Account the simulated wallet exposes.
const SIMULATED_ACCOUNT: Address = Address([0xed; 20]);
/// Base rent quoted by the simulated controller (about 0.1 EDX per year).
const SIMULATED_BASE_PRICE: u64 = 3_170_979_198_376;

/// A session plus whatever keeps its wallet updated.
pub struct Backend {
    pub session: RegistrationSession,
    rpc_wallet: Option<JsonRpcWallet>,
}

impl Backend {
    fn start_watching(&self) {
        if let Some(wallet) = &self.rpc_wallet {
            wallet.start_watching();
        }
    }

    fn stop_watching(&self) {
        if let Some(wallet) = &self.rpc_wallet {
            wallet.stop_watching();
        }
    }
}

pub fn backend(config: &AppConfig, simulate: bool) -> Result<Backend> {
    let registrar = config.registrar.clone();
    if simulate {
        let testnet = Network::edexa_testnet();
        let chain = InMemoryChain::new(EDEXA_TESTNET_CHAIN_ID, &registrar.domain_suffix)
            .with_account(SIMULATED_ACCOUNT);
        chain.set_rent_price(Wei::from(SIMULATED_BASE_PRICE), Wei::zero());
        chain.seed_name(
            &testnet,
            &format!("edexa.{}", registrar.domain_suffix),
            Address([0x01; 20]),
        );
        info!(account = %SIMULATED_ACCOUNT, "using simulated chain");

        let shared = Arc::new(chain);
        let session = RegistrationSession::new(shared.clone(), shared.clone(), shared, registrar);
        return Ok(Backend {
            session,
            rpc_wallet: None,
        });
    }

    let (session, wallet) = session_for_endpoint(&config.rpc_url, WalletOptions::default(), registrar)
        .with_context(|| format!("cannot use RPC endpoint {}", config.rpc_url))?;
    info!(endpoint = %config.rpc_url, "using JSON-RPC endpoint");
    Ok(Backend {
        session,
        rpc_wallet: Some(wallet),
    })
}

/// The name as the registration form would hold it after typing `raw`.
fn field_value(raw: &str) -> String {
    let value = normalize_input(raw);
    if value != raw.trim() {
        warn!(entered = raw, using = %value, "dropped characters outside [A-Za-z0-9_]");
    }
    value
}

pub fn validate(config: &AppConfig, name: &str) -> Result<()> {
    let validator = NameValidator::new(config.registrar.min_name_length);
    let report = validator.report(name);
    match report.error {
        None => {
            println!(
                "{} is a valid name",
                edx_types::fully_qualified(&report.normalized, &config.registrar.domain_suffix)
            );
            Ok(())
        }
        Some(err) => bail!("{err} ({})", err.reason()),
    }
}

pub fn networks(config: &AppConfig) {
    let table = NetworkTable::with_extra(&config.registrar.extra_networks);
    for network in table.iter() {
        println!("{network}");
        println!("  resolver:             {}", network.resolver);
        println!("  registrar controller: {}", network.registrar_controller);
    }
}

fn connected(snapshot: &SessionSnapshot) -> Result<(Address, Network)> {
    match (snapshot.account, &snapshot.network) {
        (Some(account), Some(network)) => Ok((account, network.clone())),
        _ => bail!("wallet is not connected to a supported network"),
    }
}

pub async fn whoami(backend: &Backend) -> Result<()> {
    let snapshot = backend.session.connect().await?;
    let (account, network) = connected(&snapshot)?;
    println!("account: {account}");
    println!("network: {network}");
    match snapshot.primary_name {
        Some(name) => println!("primary name: {name}"),
        None => println!("primary name: (none)"),
    }
    Ok(())
}

pub async fn check(backend: &Backend, name: &str) -> Result<()> {
    let config = backend.session.config();
    let candidate = NameValidator::new(config.min_name_length).validate(&field_value(name))?;
    let snapshot = backend.session.connect().await?;
    let (account, network) = connected(&snapshot)?;
    let fqdn = candidate.fully_qualified(&config.domain_suffix);

    match backend.session.availability().check(&candidate, account, &network).await? {
        Availability::Available => println!("{fqdn} is available on {network}"),
        Availability::OwnedByRequester => println!("{fqdn} already points at your account"),
        Availability::Taken(owner) => println!("{fqdn} is registered by {owner}"),
    }
    Ok(())
}

fn print_status(mut updates: watch::Receiver<SessionSnapshot>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last = String::new();
        while updates.changed().await.is_ok() {
            let message = updates.borrow_and_update().status_message.clone();
            if !message.is_empty() && message != last {
                println!("{message}");
                last = message;
            }
        }
    })
}

pub async fn claim(backend: &Backend, name: &str) -> Result<()> {
    let session = &backend.session;
    session.connect().await?;
    let wallet_events = session.watch_wallet();
    backend.start_watching();
    let printer = print_status(session.subscribe());

    let name = field_value(name);
    let outcome = tokio::select! {
        outcome = commit_and_register(session, &name) => outcome,
        _ = tokio::signal::ctrl_c() => Err(anyhow::anyhow!("interrupted")),
    };

    backend.stop_watching();
    wallet_events.abort();
    printer.abort();
    outcome
}

async fn commit_and_register(session: &RegistrationSession, name: &str) -> Result<()> {
    let mut updates = session.subscribe();
    session.commit(name).await?;

    let phase = updates
        .wait_for(|s| matches!(s.phase, Phase::ReadyToRegister | Phase::Idle))
        .await
        .context("session closed")?
        .phase;
    if phase == Phase::Idle {
        bail!("claim was reset by a wallet change; run the command again");
    }

    let registered = session.register(name).await?;
    println!("registered {} to {}", registered.name, registered.owner);
    println!("  node:     {}", registered.node);
    println!("  paid:     {} wei", registered.price_paid);
    println!("  register: {}", registered.register_tx);
    println!("  setAddr:  {}", registered.set_addr_tx);
    Ok(())
}

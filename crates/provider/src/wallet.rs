//! Wallet over JSON-RPC: accounts, chain id, receipts, change polling.

use crate::error::{ProviderError, METHOD_NOT_FOUND_CODE};
use crate::rpc::{parse_u64_quantity, JsonRpcClient};
use async_trait::async_trait;
use edx_registrar::{ChainError, TxReceipt, Wallet, WalletEvent};
use edx_types::{Address, TxHash};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReceipt {
    transaction_hash: TxHash,
    block_number: Option<String>,
    status: Option<String>,
}

impl RawReceipt {
    fn into_receipt(self) -> Result<TxReceipt, ProviderError> {
        let block_number = match self.block_number.as_deref() {
            Some(block) => parse_u64_quantity(block)?,
            None => 0,
        };
        // Pre-Byzantium receipts carry no status; treat them as successful.
        let success = match self.status.as_deref() {
            Some(status) => parse_u64_quantity(status)? == 1,
            None => true,
        };
        Ok(TxReceipt {
            tx_hash: self.transaction_hash,
            block_number,
            success,
        })
    }
}

#[derive(Debug, Clone)]
pub struct WalletOptions {
    /// Give up waiting for a receipt after this long.
    pub receipt_timeout: Duration,
    pub receipt_poll_interval: Duration,
    /// How often the change watcher re-reads accounts and chain id.
    pub watch_interval: Duration,
}

impl Default for WalletOptions {
    fn default() -> Self {
        Self {
            receipt_timeout: Duration::from_secs(120),
            receipt_poll_interval: Duration::from_secs(2),
            watch_interval: Duration::from_secs(4),
        }
    }
}

/// [`Wallet`] backed by a node or wallet bridge exposing the `eth_*` API.
///
/// Account and chain changes are detected by polling once
/// [`JsonRpcWallet::start_watching`] has been called.
#[derive(Clone)]
pub struct JsonRpcWallet {
    rpc: JsonRpcClient,
    options: WalletOptions,
    events: broadcast::Sender<WalletEvent>,
    watcher: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl JsonRpcWallet {
    pub fn new(rpc: JsonRpcClient) -> Self {
        Self::with_options(rpc, WalletOptions::default())
    }

    pub fn with_options(rpc: JsonRpcClient, options: WalletOptions) -> Self {
        let (events, _receiver) = broadcast::channel(16);
        Self {
            rpc,
            options,
            events,
            watcher: Arc::new(Mutex::new(None)),
        }
    }

    async fn accounts(&self) -> Result<Vec<Address>, ProviderError> {
        self.rpc.request("eth_accounts", json!([])).await
    }

    async fn current_chain(&self) -> Result<u64, ProviderError> {
        let raw: String = self.rpc.request("eth_chainId", json!([])).await?;
        parse_u64_quantity(&raw)
    }

    async fn receipt(&self, tx_hash: TxHash) -> Result<Option<TxReceipt>, ProviderError> {
        let raw: Option<RawReceipt> = self
            .rpc
            .request("eth_getTransactionReceipt", json!([tx_hash.to_string()]))
            .await?;
        match raw {
            Some(raw) if raw.block_number.is_some() => raw.into_receipt().map(Some),
            _ => Ok(None),
        }
    }

    /// Start polling for account and chain changes. Calling it again while a
    /// watcher is running is a no-op.
    pub fn start_watching(&self) {
        let mut guard = self.watcher.lock();
        if guard.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        let wallet = self.clone();
        let interval = self.options.watch_interval;
        *guard = Some(tokio::spawn(async move {
            wallet.watch_loop(interval).await;
        }));
        info!(endpoint = %self.rpc.endpoint(), "watching wallet for account and chain changes");
    }

    pub fn stop_watching(&self) {
        if let Some(handle) = self.watcher.lock().take() {
            handle.abort();
        }
    }

    async fn watch_loop(&self, interval: Duration) {
        let mut last_accounts = self.accounts().await.ok();
        let mut last_chain = self.current_chain().await.ok();
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;

        loop {
            ticker.tick().await;

            match self.accounts().await {
                Ok(accounts) if last_accounts.as_ref() != Some(&accounts) => {
                    debug!(count = accounts.len(), "wallet accounts changed");
                    last_accounts = Some(accounts.clone());
                    let _ = self.events.send(WalletEvent::AccountsChanged(accounts));
                }
                Ok(_) => {}
                Err(err) => warn!("failed to poll wallet accounts: {err}"),
            }

            match self.current_chain().await {
                Ok(chain_id) if last_chain != Some(chain_id) => {
                    debug!(chain_id, "wallet chain changed");
                    last_chain = Some(chain_id);
                    let _ = self.events.send(WalletEvent::ChainChanged(chain_id));
                }
                Ok(_) => {}
                Err(err) => warn!("failed to poll wallet chain id: {err}"),
            }
        }
    }
}

#[async_trait]
impl Wallet for JsonRpcWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>, ChainError> {
        match self
            .rpc
            .request::<Vec<Address>>("eth_requestAccounts", json!([]))
            .await
        {
            Ok(accounts) => Ok(accounts),
            // Plain nodes do not implement the prompt; their unlocked
            // accounts are already exposed.
            Err(ProviderError::Rpc { code, .. }) if code == METHOD_NOT_FOUND_CODE => {
                debug!("eth_requestAccounts unsupported, falling back to eth_accounts");
                Ok(self.accounts().await?)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn list_accounts(&self) -> Result<Vec<Address>, ChainError> {
        Ok(self.accounts().await?)
    }

    async fn chain_id(&self) -> Result<u64, ChainError> {
        Ok(self.current_chain().await?)
    }

    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<TxReceipt, ChainError> {
        let poll = async {
            loop {
                if let Some(receipt) = self.receipt(tx_hash).await? {
                    debug!(tx = %tx_hash, block = receipt.block_number, success = receipt.success, "transaction mined");
                    return Ok::<_, ProviderError>(receipt);
                }
                tokio::time::sleep(self.options.receipt_poll_interval).await;
            }
        };
        match tokio::time::timeout(self.options.receipt_timeout, poll).await {
            Ok(result) => Ok(result?),
            Err(_) => {
                warn!(tx = %tx_hash, "gave up waiting for receipt");
                Err(ProviderError::Timeout(self.options.receipt_timeout).into())
            }
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receipt_status_is_decoded() {
        let raw: RawReceipt = serde_json::from_value(json!({
            "transactionHash": format!("0x{}", "11".repeat(32)),
            "blockNumber": "0x10",
            "status": "0x0"
        }))
        .unwrap();
        let receipt = raw.into_receipt().unwrap();
        assert_eq!(receipt.block_number, 16);
        assert!(!receipt.success);
    }

    #[test]
    fn legacy_receipt_without_status_is_successful() {
        let raw: RawReceipt = serde_json::from_value(json!({
            "transactionHash": format!("0x{}", "22".repeat(32)),
            "blockNumber": "0x1"
        }))
        .unwrap();
        assert!(raw.into_receipt().unwrap().success);
    }
}

//! Collaborator interfaces: the wallet and the two contracts.
//!
//! Contract calls take the deployment address as their first argument so one
//! binding serves every [`crate::Network`]. Writes take the sending account;
//! the wallet signs on its behalf.

use crate::config::RegistrarConfig;
use crate::errors::ChainError;
use crate::network::Network;
use crate::validation::Candidate;
use async_trait::async_trait;
use edx_types::abi::{self, Token};
use edx_types::{keccak256, labelhash, Address, CommitmentHash, NameHash, TxHash, Wei};
use tokio::sync::broadcast;

/// Commitment secret used for every attempt: `bytes32("")`.
///
/// A constant secret makes commitments for the same name and owner
/// linkable; registrations still work because the reveal repeats it.
pub const EMPTY_SECRET: [u8; 32] = [0u8; 32];

/// Notifications pushed by the wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    AccountsChanged(Vec<Address>),
    ChainChanged(u64),
}

/// Value and gas settings attached to a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TxOptions {
    pub value: Wei,
    pub gas_limit: Option<u64>,
    pub gas_price: Option<u64>,
}

impl TxOptions {
    pub fn paying(value: Wei) -> Self {
        Self {
            value,
            ..Self::default()
        }
    }

    pub fn with_gas(mut self, gas_limit: u64, gas_price: u64) -> Self {
        self.gas_limit = Some(gas_limit);
        self.gas_price = Some(gas_price);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub success: bool,
}

/// Price quote returned by the controller's `rentPrice`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RentPrice {
    pub base: Wei,
    pub premium: Wei,
}

impl RentPrice {
    /// Amount sent with `register`. Only the base component is paid; the
    /// premium is not included.
    pub fn base_fee(&self) -> Wei {
        self.base
    }
}

/// Arguments shared by `makeCommitment` and `register`. Both calls must use
/// identical values or the registrar will not find the commitment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationParams {
    pub name: String,
    pub owner: Address,
    pub duration_secs: u64,
    pub secret: [u8; 32],
    pub resolver: Address,
    pub data: Vec<Vec<u8>>,
    pub reverse_record: bool,
    pub owner_controlled_fuses: u16,
}

impl RegistrationParams {
    pub fn new(
        candidate: &Candidate,
        owner: Address,
        network: &Network,
        config: &RegistrarConfig,
    ) -> Self {
        Self {
            name: candidate.as_str().to_string(),
            owner,
            duration_secs: config.registration_duration_secs,
            secret: EMPTY_SECRET,
            resolver: network.resolver,
            data: Vec::new(),
            reverse_record: true,
            owner_controlled_fuses: 0,
        }
    }

    /// ABI arguments in `(string,address,uint256,bytes32,address,bytes[],bool,uint16)` order.
    pub fn call_tokens(&self) -> Vec<Token> {
        let mut tokens = vec![Token::String(self.name.clone())];
        tokens.extend(self.tail_tokens());
        tokens
    }

    /// Commitment as computed by the registrar controller: the label is
    /// hashed, everything else is ABI-encoded as is.
    pub fn commitment(&self) -> CommitmentHash {
        let mut tokens = vec![Token::FixedBytes(labelhash(&self.name))];
        tokens.extend(self.tail_tokens());
        CommitmentHash(keccak256(abi::encode(&tokens)))
    }

    fn tail_tokens(&self) -> Vec<Token> {
        vec![
            Token::Address(self.owner),
            Token::Uint(Wei::from(self.duration_secs)),
            Token::FixedBytes(self.secret),
            Token::Address(self.resolver),
            Token::Array(self.data.iter().cloned().map(Token::Bytes).collect()),
            Token::Bool(self.reverse_record),
            Token::Uint(Wei::from(self.owner_controlled_fuses)),
        ]
    }
}

/// Wallet provider: active account, chain, confirmations, change events.
#[async_trait]
pub trait Wallet: Send + Sync {
    /// Ask the user to expose accounts (may prompt).
    async fn request_accounts(&self) -> Result<Vec<Address>, ChainError>;

    /// Accounts already exposed, without prompting.
    async fn list_accounts(&self) -> Result<Vec<Address>, ChainError>;

    async fn chain_id(&self) -> Result<u64, ChainError>;

    /// Wait until `tx_hash` is mined.
    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<TxReceipt, ChainError>;

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent>;
}

#[async_trait]
pub trait ResolverContract: Send + Sync {
    /// `addr(bytes32)`; the zero address when no record exists.
    async fn forward_address(&self, resolver: Address, node: NameHash)
        -> Result<Address, ChainError>;

    /// `setAddr(bytes32,address)`
    async fn set_forward_address(
        &self,
        resolver: Address,
        from: Address,
        node: NameHash,
        target: Address,
    ) -> Result<TxHash, ChainError>;

    /// `name(bytes32)`; empty when no reverse record exists.
    async fn reverse_name(&self, resolver: Address, node: NameHash) -> Result<String, ChainError>;
}

#[async_trait]
pub trait RegistrarController: Send + Sync {
    /// `makeCommitment(...)`, read-only.
    async fn commitment_hash(
        &self,
        controller: Address,
        params: &RegistrationParams,
    ) -> Result<CommitmentHash, ChainError>;

    /// `commit(bytes32)`
    async fn submit_commitment(
        &self,
        controller: Address,
        from: Address,
        commitment: CommitmentHash,
    ) -> Result<TxHash, ChainError>;

    /// `rentPrice(string,uint256)`
    async fn rent_price(
        &self,
        controller: Address,
        name: &str,
        duration_secs: u64,
    ) -> Result<RentPrice, ChainError>;

    /// `register(...)`, payable.
    async fn register(
        &self,
        controller: Address,
        from: Address,
        params: &RegistrationParams,
        options: TxOptions,
    ) -> Result<TxHash, ChainError>;
}

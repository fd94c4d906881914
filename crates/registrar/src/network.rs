//! Per-chain contract deployments.

use crate::errors::{RegistrarError, Result};
use edx_types::Address;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

pub const EDEXA_TESTNET_CHAIN_ID: u64 = 1995;
pub const EDEXA_MAINNET_CHAIN_ID: u64 = 5424;

/// Status shown when the wallet is connected to a chain without deployments.
pub const WRONG_NETWORK_MESSAGE: &str = "Please Connect to edeXa Testnet or Mainnet";

const TESTNET_RESOLVER: Address = Address([
    0x61, 0xc7, 0x43, 0xb3, 0xfa, 0x87, 0x14, 0x91, 0x5f, 0xc5, 0x68, 0x7b, 0xb6, 0xb4, 0x90, 0x3d,
    0x11, 0xcf, 0x21, 0x46,
]);
const TESTNET_CONTROLLER: Address = Address([
    0x3f, 0xf5, 0x90, 0x8a, 0xf0, 0x95, 0x30, 0xbd, 0xf7, 0xe3, 0x51, 0xb4, 0x61, 0xe8, 0x88, 0x8f,
    0x38, 0x75, 0xfb, 0x58,
]);
const MAINNET_RESOLVER: Address = Address([
    0x7b, 0xd7, 0xf3, 0x0c, 0xd7, 0x1f, 0x3a, 0x30, 0xd6, 0xb7, 0xdf, 0x61, 0xce, 0x18, 0xb2, 0x20,
    0x01, 0x95, 0x2a, 0x47,
]);
const MAINNET_CONTROLLER: Address = Address([
    0x97, 0xcd, 0x4b, 0xfb, 0xf2, 0xd0, 0xa6, 0xfd, 0x31, 0x63, 0xcd, 0x97, 0x4e, 0xcb, 0x60, 0x77,
    0xe4, 0x42, 0x5d, 0x0d,
]);

/// Contract addresses and display name for one supported chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub chain_id: u64,
    pub name: String,
    pub resolver: Address,
    pub registrar_controller: Address,
}

impl Network {
    pub fn edexa_testnet() -> Self {
        Self {
            chain_id: EDEXA_TESTNET_CHAIN_ID,
            name: "edeXa Testnet".to_string(),
            resolver: TESTNET_RESOLVER,
            registrar_controller: TESTNET_CONTROLLER,
        }
    }

    pub fn edexa_mainnet() -> Self {
        Self {
            chain_id: EDEXA_MAINNET_CHAIN_ID,
            name: "edeXa Mainnet".to_string(),
            resolver: MAINNET_RESOLVER,
            registrar_controller: MAINNET_CONTROLLER,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.chain_id)
    }
}

/// Lookup table from chain id to deployment.
#[derive(Debug, Clone)]
pub struct NetworkTable {
    networks: Vec<Network>,
}

impl NetworkTable {
    /// The edeXa testnet and mainnet deployments.
    pub fn builtin() -> Self {
        Self {
            networks: vec![Network::edexa_testnet(), Network::edexa_mainnet()],
        }
    }

    /// Built-in deployments plus operator supplied ones. Entries whose chain id
    /// is already known are ignored.
    pub fn with_extra(extra: &[Network]) -> Self {
        let mut table = Self::builtin();
        for network in extra {
            if table.networks.iter().any(|n| n.chain_id == network.chain_id) {
                warn!(
                    chain_id = network.chain_id,
                    "ignoring configured network that shadows a known chain id"
                );
                continue;
            }
            table.networks.push(network.clone());
        }
        table
    }

    /// Resolve the deployment for `chain_id`.
    pub fn resolve(&self, chain_id: u64) -> Result<Network> {
        self.networks
            .iter()
            .find(|n| n.chain_id == chain_id)
            .cloned()
            .ok_or(RegistrarError::UnsupportedNetwork { chain_id })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Network> {
        self.networks.iter()
    }

    pub fn len(&self) -> usize {
        self.networks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }
}

impl Default for NetworkTable {
    fn default() -> Self {
        Self::builtin()
    }
}

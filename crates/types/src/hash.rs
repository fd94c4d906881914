//! Keccak-based 32-byte identifiers and EIP-137 name-hashing.

use crate::address::Address;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::fmt;
use std::str::FromStr;

/// Errors raised when parsing a 32-byte hex value.
#[derive(Debug, thiserror::Error)]
pub enum HashParseError {
    #[error("expected 0x-prefixed 64 hex characters, got {0} characters")]
    InvalidLength(usize),
    #[error("hash is not valid hexadecimal")]
    InvalidHex(#[from] hex::FromHexError),
}

/// Keccak-256 of arbitrary bytes.
pub fn keccak256(data: impl AsRef<[u8]>) -> [u8; 32] {
    Keccak256::digest(data.as_ref()).into()
}

fn parse_bytes32(s: &str) -> Result<[u8; 32], HashParseError> {
    let payload = s.strip_prefix("0x").unwrap_or(s);
    if payload.len() != 64 {
        return Err(HashParseError::InvalidLength(s.len()));
    }
    let mut out = [0u8; 32];
    hex::decode_to_slice(payload, &mut out)?;
    Ok(out)
}

macro_rules! bytes32_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(pub [u8; 32]);

        impl $name {
            pub const ZERO: $name = $name([0u8; 32]);

            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = HashParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_bytes32(s.trim()).map($name)
            }
        }

        impl From<[u8; 32]> for $name {
            fn from(value: [u8; 32]) -> Self {
                $name(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.to_string()
            }
        }

        impl TryFrom<String> for $name {
            type Error = HashParseError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }
    };
}

bytes32_type!(
    /// EIP-137 lookup key of a fully qualified name.
    NameHash
);
bytes32_type!(
    /// Transaction hash returned by the wallet.
    TxHash
);
bytes32_type!(
    /// Opaque value submitted to the registrar to reserve a name.
    CommitmentHash
);

/// Keccak-256 of a single label, e.g. `labelhash("alice")`.
pub fn labelhash(label: &str) -> [u8; 32] {
    keccak256(label.as_bytes())
}

/// EIP-137 name-hash of a fully qualified, dot separated name.
///
/// The empty name hashes to all zeroes.
pub fn namehash(name: &str) -> NameHash {
    let mut node = [0u8; 32];
    if name.is_empty() {
        return NameHash(node);
    }
    for label in name.rsplit('.') {
        let mut buf = [0u8; 64];
        buf[..32].copy_from_slice(&node);
        buf[32..].copy_from_slice(&labelhash(label));
        node = keccak256(buf);
    }
    NameHash(node)
}

/// Join a label and a domain suffix, e.g. (`alice`, `edx`) -> `alice.edx`.
pub fn fully_qualified(label: &str, suffix: &str) -> String {
    format!("{label}.{suffix}")
}

/// Name under which the reverse record of `address` is stored.
pub fn reverse_name(address: &Address) -> String {
    format!("{}.addr.reverse", address.to_hex_lower())
}

/// Lookup key of the reverse record of `address`.
pub fn reverse_node(address: &Address) -> NameHash {
    namehash(&reverse_name(address))
}

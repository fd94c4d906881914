use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Rejections from [`decode_address`].
#[derive(Debug, thiserror::Error)]
pub enum AddressError {
    #[error("EVM address is missing its 0x prefix")]
    InvalidPrefix,
    #[error("EVM address has {actual} characters; a 0x prefix and 40 hex digits make {expected}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("EVM address contains a non-hex digit")]
    InvalidHex(#[from] hex::FromHexError),
}

/// An EVM account is the low 20 bytes of a Keccak-256 public key hash.
pub const ADDRESS_BYTES: usize = 20;
/// `0x` followed by two hex digits per byte.
pub const ADDRESS_STRING_LENGTH: usize = 2 + ADDRESS_BYTES * 2;

/// Encode a 20-byte account into its canonical lower-case `0x` form.
pub fn encode_address(bytes: &[u8; ADDRESS_BYTES]) -> String {
    let mut encoded = String::with_capacity(ADDRESS_STRING_LENGTH);
    encoded.push_str("0x");
    encoded.push_str(&hex::encode(bytes));
    encoded
}

/// Decode an `0x`-prefixed address. Mixed-case (checksummed) input is accepted
/// but the checksum itself is not verified.
pub fn decode_address(address: &str) -> Result<[u8; ADDRESS_BYTES], AddressError> {
    let payload = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .ok_or(AddressError::InvalidPrefix)?;

    if address.len() != ADDRESS_STRING_LENGTH {
        return Err(AddressError::InvalidLength {
            expected: ADDRESS_STRING_LENGTH,
            actual: address.len(),
        });
    }

    let mut bytes = [0u8; ADDRESS_BYTES];
    hex::decode_to_slice(payload, &mut bytes)?;
    Ok(bytes)
}

/// Check whether the provided string is a well-formed address.
pub fn is_valid_address(address: &str) -> bool {
    decode_address(address).is_ok()
}

/// Account address. Renders lower-case, which is also the form written into
/// resolver records.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(pub [u8; ADDRESS_BYTES]);

impl Address {
    /// Sentinel returned by resolvers for names without a forward record.
    pub const ZERO: Address = Address([0u8; ADDRESS_BYTES]);

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_BYTES] {
        &self.0
    }

    /// Lower-case hex without the `0x` prefix, as used in reverse node names.
    pub fn to_hex_lower(&self) -> String {
        hex::encode(self.0)
    }

    /// Shortened form for display, e.g. `0x61c7..2146`.
    pub fn short(&self) -> String {
        let full = encode_address(&self.0);
        format!("{}..{}", &full[..6], &full[full.len() - 4..])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_address(&self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_address(s.trim()).map(Address)
    }
}

impl From<[u8; ADDRESS_BYTES]> for Address {
    fn from(value: [u8; ADDRESS_BYTES]) -> Self {
        Address(value)
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        encode_address(&value.0)
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

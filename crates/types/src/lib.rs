//! Primitive types shared by the `.edx` name-service client crates.
//!
//! Accounts are 20-byte EVM addresses, lookup keys are EIP-137 name-hashes,
//! and contract calls are encoded with the small ABI codec in [`abi`].

pub mod abi;
pub mod address;
pub mod hash;

pub use address::*;
pub use hash::*;

pub use primitive_types::U256;

/// Native currency amount in wei.
pub type Wei = U256;

//! Minimal Solidity ABI codec.
//!
//! Covers the argument and return shapes used by the resolver and registrar
//! controller: addresses, `uint256`, `bytes32`, `bool`, `string`, `bytes`
//! and dynamic arrays of those.
//!
//! Offsets and lengths in return data come from the node and are checked
//! before use; a malformed word is an error, never a panic.

use crate::address::{Address, ADDRESS_BYTES};
use crate::hash::keccak256;
use primitive_types::U256;
use thiserror::Error;

const WORD: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AbiError {
    #[error("return data too short: need {needed} bytes, got {actual}")]
    TooShort { needed: usize, actual: usize },
    #[error("dynamic offset at word {0} is out of range")]
    InvalidOffset(usize),
    #[error("string is not valid utf-8")]
    InvalidUtf8,
}

/// A single ABI value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Address(Address),
    Uint(U256),
    FixedBytes([u8; 32]),
    Bool(bool),
    String(String),
    Bytes(Vec<u8>),
    /// Dynamically sized array (`T[]`).
    Array(Vec<Token>),
}

impl Token {
    fn is_dynamic(&self) -> bool {
        matches!(self, Token::String(_) | Token::Bytes(_) | Token::Array(_))
    }
}

/// First four bytes of the Keccak-256 of a canonical function signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Encode `tokens` as a tuple (head/tail layout).
pub fn encode(tokens: &[Token]) -> Vec<u8> {
    let head_len = tokens.len() * WORD;
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for token in tokens {
        if token.is_dynamic() {
            head.extend_from_slice(&uint_word(U256::from(head_len + tail.len())));
            tail.extend_from_slice(&encode_dynamic(token));
        } else {
            head.extend_from_slice(&static_word(token));
        }
    }

    head.extend_from_slice(&tail);
    head
}

/// Selector followed by the encoded arguments.
pub fn encode_call(signature: &str, tokens: &[Token]) -> Vec<u8> {
    let mut data = selector(signature).to_vec();
    data.extend_from_slice(&encode(tokens));
    data
}

fn uint_word(value: U256) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    value.to_big_endian(&mut word);
    word
}

fn static_word(token: &Token) -> [u8; WORD] {
    match token {
        Token::Address(address) => {
            let mut word = [0u8; WORD];
            word[WORD - ADDRESS_BYTES..].copy_from_slice(address.as_bytes());
            word
        }
        Token::Uint(value) => uint_word(*value),
        Token::FixedBytes(bytes) => *bytes,
        Token::Bool(flag) => uint_word(U256::from(u8::from(*flag))),
        Token::String(_) | Token::Bytes(_) | Token::Array(_) => {
            unreachable!("dynamic tokens are encoded in the tail")
        }
    }
}

fn encode_dynamic(token: &Token) -> Vec<u8> {
    match token {
        Token::String(value) => length_prefixed(value.as_bytes()),
        Token::Bytes(value) => length_prefixed(value),
        Token::Array(items) => {
            let mut out = uint_word(U256::from(items.len())).to_vec();
            out.extend_from_slice(&encode(items));
            out
        }
        _ => static_word(token).to_vec(),
    }
}

fn length_prefixed(bytes: &[u8]) -> Vec<u8> {
    let padded = bytes.len().div_ceil(WORD) * WORD;
    let mut out = Vec::with_capacity(WORD + padded);
    out.extend_from_slice(&uint_word(U256::from(bytes.len())));
    out.extend_from_slice(bytes);
    out.resize(WORD + padded, 0);
    out
}

fn word_at(data: &[u8], index: usize) -> Result<&[u8], AbiError> {
    let end = index
        .checked_add(1)
        .and_then(|words| words.checked_mul(WORD))
        .ok_or(AbiError::InvalidOffset(index))?;
    data.get(end - WORD..end).ok_or(AbiError::TooShort {
        needed: end,
        actual: data.len(),
    })
}

/// Read the `index`-th head word as an unsigned integer.
pub fn decode_uint(data: &[u8], index: usize) -> Result<U256, AbiError> {
    Ok(U256::from_big_endian(word_at(data, index)?))
}

/// Read a head word that must be usable as a byte offset or length.
fn decode_usize(data: &[u8], index: usize, origin: usize) -> Result<usize, AbiError> {
    let value = decode_uint(data, index)?;
    if value > U256::from(usize::MAX) {
        return Err(AbiError::InvalidOffset(origin));
    }
    Ok(value.as_usize())
}

/// Read the `index`-th head word as an address (upper 12 bytes ignored).
pub fn decode_address(data: &[u8], index: usize) -> Result<Address, AbiError> {
    let word = word_at(data, index)?;
    let mut bytes = [0u8; ADDRESS_BYTES];
    bytes.copy_from_slice(&word[WORD - ADDRESS_BYTES..]);
    Ok(Address(bytes))
}

/// Read the `index`-th head word verbatim.
pub fn decode_bytes32(data: &[u8], index: usize) -> Result<[u8; 32], AbiError> {
    let word = word_at(data, index)?;
    let mut out = [0u8; 32];
    out.copy_from_slice(word);
    Ok(out)
}

/// Follow the offset stored in the `index`-th head word and read a `string`.
pub fn decode_string(data: &[u8], index: usize) -> Result<String, AbiError> {
    let offset = decode_usize(data, index, index)?;
    if offset % WORD != 0 {
        return Err(AbiError::InvalidOffset(index));
    }
    let len = decode_usize(data, offset / WORD, index)?;
    let end = offset
        .checked_add(WORD)
        .and_then(|start| start.checked_add(len))
        .ok_or(AbiError::InvalidOffset(index))?;
    let bytes = data.get(end - len..end).ok_or(AbiError::TooShort {
        needed: end,
        actual: data.len(),
    })?;
    String::from_utf8(bytes.to_vec()).map_err(|_| AbiError::InvalidUtf8)
}

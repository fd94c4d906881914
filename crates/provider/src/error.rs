use edx_registrar::ChainError;
use edx_types::abi::AbiError;
use std::time::Duration;
use thiserror::Error;

/// JSON-RPC code a wallet uses when the user declines a request (EIP-1193).
pub const USER_REJECTED_CODE: i64 = 4001;
/// Code nodes use for `execution reverted` on `eth_call` / gas estimation.
pub const EXECUTION_REVERTED_CODE: i64 = 3;
/// Standard JSON-RPC "method not found".
pub const METHOD_NOT_FOUND_CODE: i64 = -32601;

/// Errors that can occur when talking to a wallet or node over JSON-RPC.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("invalid endpoint URL: {0}")]
    InvalidBaseUrl(String),
    #[error("url error: {0}")]
    Url(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected HTTP status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("parse error: {0}")]
    Parse(String),
    #[error("abi error: {0}")]
    Abi(#[from] AbiError),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl ProviderError {
    pub(crate) fn parse_error(msg: impl Into<String>) -> Self {
        ProviderError::Parse(msg.into())
    }

    /// Whether the request was refused by the user or reverted by a contract,
    /// as opposed to the transport failing.
    pub fn is_rejection(&self) -> bool {
        match self {
            ProviderError::Rpc { code, message } => {
                *code == USER_REJECTED_CODE
                    || *code == EXECUTION_REVERTED_CODE
                    || message.contains("execution reverted")
            }
            _ => false,
        }
    }
}

impl From<ProviderError> for ChainError {
    fn from(err: ProviderError) -> Self {
        if err.is_rejection() {
            match err {
                ProviderError::Rpc { message, .. } => ChainError::Rejected(message),
                other => ChainError::Rejected(other.to_string()),
            }
        } else {
            ChainError::Provider(err.to_string())
        }
    }
}

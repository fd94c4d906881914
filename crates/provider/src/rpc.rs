//! Thin JSON-RPC 2.0 client over HTTP.

use crate::error::ProviderError;
use edx_types::U256;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;
use url::Url;

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

impl RpcErrorObject {
    /// Nodes put the revert reason in `data` either as a string or nested
    /// under `message`.
    fn into_error(self) -> ProviderError {
        let detail = match &self.data {
            Some(Value::String(data)) if !self.message.contains(data.as_str()) => {
                Some(data.clone())
            }
            Some(Value::Object(map)) => map
                .get("message")
                .and_then(Value::as_str)
                .filter(|m| !self.message.contains(*m))
                .map(str::to_string),
            _ => None,
        };
        let message = match detail {
            Some(detail) => format!("{}: {detail}", self.message),
            None => self.message,
        };
        ProviderError::Rpc {
            code: self.code,
            message,
        }
    }
}

/// JSON-RPC client for an EVM node or wallet bridge.
#[derive(Clone)]
pub struct JsonRpcClient {
    endpoint: Url,
    http: Client,
    next_id: Arc<AtomicU64>,
}

impl JsonRpcClient {
    /// Create a client for `endpoint` (e.g. `http://127.0.0.1:8545`).
    pub fn new(endpoint: impl AsRef<str>) -> Result<Self, ProviderError> {
        Self::with_http_client(
            endpoint,
            Client::builder().timeout(Duration::from_secs(30)).build()?,
        )
    }

    pub fn with_http_client(endpoint: impl AsRef<str>, http: Client) -> Result<Self, ProviderError> {
        let endpoint = Url::parse(endpoint.as_ref())
            .map_err(|_| ProviderError::InvalidBaseUrl(endpoint.as_ref().to_string()))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ProviderError::InvalidBaseUrl(endpoint.to_string()));
        }
        Ok(Self {
            endpoint,
            http,
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Call `method` and deserialize its `result`. A JSON `null` result is
    /// passed to `T` as-is, so callers that expect one should ask for an
    /// `Option`.
    pub async fn request<T>(&self, method: &str, params: Value) -> Result<T, ProviderError>
    where
        T: DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = RpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };
        trace!(id, method, "rpc request");

        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).to_string(),
            });
        }

        let envelope: RpcResponse = serde_json::from_slice(&bytes)
            .map_err(|err| ProviderError::parse_error(format!("{method}: {err}")))?;
        if let Some(error) = envelope.error {
            return Err(error.into_error());
        }
        serde_json::from_value(envelope.result.unwrap_or(Value::Null))
            .map_err(|err| ProviderError::parse_error(format!("{method} result: {err}")))
    }
}

/// Parse a hex quantity such as `0x7cb`.
pub fn parse_quantity(value: &str) -> Result<U256, ProviderError> {
    let digits = value
        .strip_prefix("0x")
        .ok_or_else(|| ProviderError::parse_error(format!("quantity without 0x prefix: {value}")))?;
    if digits.is_empty() {
        return Err(ProviderError::parse_error("empty quantity"));
    }
    U256::from_str_radix(digits, 16)
        .map_err(|_| ProviderError::parse_error(format!("invalid quantity: {value}")))
}

/// Parse a quantity that must fit a `u64`: chain ids, block numbers, status.
pub fn parse_u64_quantity(value: &str) -> Result<u64, ProviderError> {
    let quantity = parse_quantity(value)?;
    if quantity > U256::from(u64::MAX) {
        return Err(ProviderError::parse_error(format!("quantity out of range: {value}")));
    }
    Ok(quantity.low_u64())
}

/// Format a quantity without leading zeros, as JSON-RPC requires.
pub fn format_quantity(value: U256) -> String {
    if value.is_zero() {
        return "0x0".to_string();
    }
    format!("0x{value:x}")
}

pub fn parse_data(value: &str) -> Result<Vec<u8>, ProviderError> {
    let digits = value
        .strip_prefix("0x")
        .ok_or_else(|| ProviderError::parse_error(format!("data without 0x prefix: {value}")))?;
    hex::decode(digits).map_err(|_| ProviderError::parse_error(format!("invalid hex data: {value}")))
}

pub fn format_data(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantities() {
        assert_eq!(parse_u64_quantity("0x7cb").unwrap(), 1995);
        assert_eq!(parse_u64_quantity("0x1530").unwrap(), 5424);
        assert_eq!(format_quantity(U256::zero()), "0x0");
        assert_eq!(format_quantity(U256::from(1_000_000u64)), "0xf4240");
        assert!(parse_quantity("7cb").is_err());
        assert!(parse_quantity("0x").is_err());
        assert!(parse_quantity("0xzz").is_err());
    }

    #[test]
    fn quantities_span_256_bits() {
        let max = format!("0x{}", "f".repeat(64));
        assert_eq!(parse_quantity(&max).unwrap(), U256::MAX);
        assert_eq!(format_quantity(U256::MAX), max);
        assert!(parse_quantity(&format!("0x1{}", "0".repeat(64))).is_err());

        let wide = U256::from(u128::MAX) + U256::from(1u64);
        assert_eq!(format_quantity(wide), format!("0x1{}", "0".repeat(32)));
        assert!(parse_u64_quantity("0x10000000000000000").is_err());
    }

    #[test]
    fn data() {
        assert_eq!(parse_data("0x").unwrap(), Vec::<u8>::new());
        assert_eq!(parse_data("0x0a0b").unwrap(), vec![0x0a, 0x0b]);
        assert_eq!(format_data(&[0xde, 0xad]), "0xdead");
        assert!(parse_data("0xzz").is_err());
    }

    #[test]
    fn rejects_non_http_endpoints() {
        assert!(matches!(
            JsonRpcClient::new("ws://127.0.0.1:8546"),
            Err(ProviderError::InvalidBaseUrl(_))
        ));
        assert!(matches!(
            JsonRpcClient::new("not a url"),
            Err(ProviderError::InvalidBaseUrl(_))
        ));
    }

    #[test]
    fn revert_data_is_folded_into_message() {
        let error = RpcErrorObject {
            code: 3,
            message: "execution reverted".into(),
            data: Some(serde_json::json!({ "message": "CommitmentTooNew" })),
        };
        assert!(matches!(
            error.into_error(),
            ProviderError::Rpc { code: 3, message } if message == "execution reverted: CommitmentTooNew"
        ));
    }
}

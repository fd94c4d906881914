//! Resolver and registrar controller bindings over `eth_call` and
//! `eth_sendTransaction`.

use crate::error::ProviderError;
use crate::rpc::{format_data, format_quantity, parse_data, JsonRpcClient};
use async_trait::async_trait;
use edx_registrar::{
    ChainError, RegistrarController, RegistrationParams, RentPrice, ResolverContract, TxOptions,
};
use edx_types::abi::{self, Token};
use edx_types::{Address, CommitmentHash, NameHash, TxHash, Wei};
use serde_json::{json, Map, Value};
use tracing::debug;

pub const ADDR: &str = "addr(bytes32)";
pub const SET_ADDR: &str = "setAddr(bytes32,address)";
pub const NAME: &str = "name(bytes32)";
pub const COMMIT: &str = "commit(bytes32)";
pub const RENT_PRICE: &str = "rentPrice(string,uint256)";
pub const MAKE_COMMITMENT: &str =
    "makeCommitment(string,address,uint256,bytes32,address,bytes[],bool,uint16)";
pub const REGISTER: &str =
    "register(string,address,uint256,bytes32,address,bytes[],bool,uint16)";

/// Contract calls routed through a JSON-RPC endpoint. Transactions are
/// signed by the endpoint (`eth_sendTransaction`), so `from` must be an
/// account it controls.
#[derive(Clone)]
pub struct RpcContracts {
    rpc: JsonRpcClient,
}

impl RpcContracts {
    pub fn new(rpc: JsonRpcClient) -> Self {
        Self { rpc }
    }

    async fn call(&self, to: Address, data: Vec<u8>) -> Result<Vec<u8>, ProviderError> {
        let raw: String = self
            .rpc
            .request(
                "eth_call",
                json!([{ "to": to.to_string(), "data": format_data(&data) }, "latest"]),
            )
            .await?;
        parse_data(&raw)
    }

    async fn send(
        &self,
        from: Address,
        to: Address,
        data: Vec<u8>,
        options: TxOptions,
    ) -> Result<TxHash, ProviderError> {
        let tx = transaction_object(from, to, &data, &options);
        let raw: String = self.rpc.request("eth_sendTransaction", json!([tx])).await?;
        let tx_hash: TxHash = raw
            .parse()
            .map_err(|err| ProviderError::parse_error(format!("transaction hash {raw}: {err}")))?;
        debug!(%from, %to, tx = %tx_hash, "transaction sent");
        Ok(tx_hash)
    }
}

pub(crate) fn transaction_object(
    from: Address,
    to: Address,
    data: &[u8],
    options: &TxOptions,
) -> Value {
    let mut tx = Map::new();
    tx.insert("from".into(), json!(from.to_string()));
    tx.insert("to".into(), json!(to.to_string()));
    tx.insert("data".into(), json!(format_data(data)));
    if !options.value.is_zero() {
        tx.insert("value".into(), json!(format_quantity(options.value)));
    }
    if let Some(gas) = options.gas_limit {
        tx.insert("gas".into(), json!(format_quantity(Wei::from(gas))));
    }
    if let Some(price) = options.gas_price {
        tx.insert("gasPrice".into(), json!(format_quantity(Wei::from(price))));
    }
    Value::Object(tx)
}

#[async_trait]
impl ResolverContract for RpcContracts {
    async fn forward_address(
        &self,
        resolver: Address,
        node: NameHash,
    ) -> Result<Address, ChainError> {
        let data = abi::encode_call(ADDR, &[Token::FixedBytes(node.0)]);
        let output = self.call(resolver, data).await?;
        if output.is_empty() {
            return Ok(Address::ZERO);
        }
        Ok(abi::decode_address(&output, 0).map_err(ProviderError::from)?)
    }

    async fn set_forward_address(
        &self,
        resolver: Address,
        from: Address,
        node: NameHash,
        target: Address,
    ) -> Result<TxHash, ChainError> {
        let data = abi::encode_call(SET_ADDR, &[Token::FixedBytes(node.0), Token::Address(target)]);
        Ok(self.send(from, resolver, data, TxOptions::default()).await?)
    }

    async fn reverse_name(&self, resolver: Address, node: NameHash) -> Result<String, ChainError> {
        let data = abi::encode_call(NAME, &[Token::FixedBytes(node.0)]);
        let output = self.call(resolver, data).await?;
        if output.is_empty() {
            return Ok(String::new());
        }
        Ok(abi::decode_string(&output, 0).map_err(ProviderError::from)?)
    }
}

#[async_trait]
impl RegistrarController for RpcContracts {
    async fn commitment_hash(
        &self,
        controller: Address,
        params: &RegistrationParams,
    ) -> Result<CommitmentHash, ChainError> {
        let data = abi::encode_call(MAKE_COMMITMENT, &params.call_tokens());
        let output = self.call(controller, data).await?;
        let word = abi::decode_bytes32(&output, 0).map_err(ProviderError::from)?;
        Ok(CommitmentHash(word))
    }

    async fn submit_commitment(
        &self,
        controller: Address,
        from: Address,
        commitment: CommitmentHash,
    ) -> Result<TxHash, ChainError> {
        let data = abi::encode_call(COMMIT, &[Token::FixedBytes(commitment.0)]);
        Ok(self.send(from, controller, data, TxOptions::default()).await?)
    }

    async fn rent_price(
        &self,
        controller: Address,
        name: &str,
        duration_secs: u64,
    ) -> Result<RentPrice, ChainError> {
        let data = abi::encode_call(
            RENT_PRICE,
            &[Token::String(name.to_string()), Token::Uint(Wei::from(duration_secs))],
        );
        let output = self.call(controller, data).await?;
        let base = abi::decode_uint(&output, 0).map_err(ProviderError::from)?;
        let premium = abi::decode_uint(&output, 1).map_err(ProviderError::from)?;
        Ok(RentPrice { base, premium })
    }

    async fn register(
        &self,
        controller: Address,
        from: Address,
        params: &RegistrationParams,
        options: TxOptions,
    ) -> Result<TxHash, ChainError> {
        let data = abi::encode_call(REGISTER, &params.call_tokens());
        Ok(self.send(from, controller, data, options).await?)
    }
}

//! JSON-RPC implementations of the registrar's wallet and contract traits.
//!
//! [`JsonRpcWallet`] and [`RpcContracts`] share one [`JsonRpcClient`]; the
//! endpoint must be able to sign for the connected account
//! (`eth_sendTransaction`), as a browser wallet bridge or a development node
//! with unlocked accounts does.

mod contracts;
mod error;
mod rpc;
mod wallet;

pub use crate::contracts::{
    RpcContracts, ADDR, COMMIT, MAKE_COMMITMENT, NAME, REGISTER, RENT_PRICE, SET_ADDR,
};
pub use crate::error::{
    ProviderError, EXECUTION_REVERTED_CODE, METHOD_NOT_FOUND_CODE, USER_REJECTED_CODE,
};
pub use crate::rpc::{
    format_data, format_quantity, parse_data, parse_quantity, parse_u64_quantity, JsonRpcClient,
};
pub use crate::wallet::{JsonRpcWallet, WalletOptions};

use edx_registrar::{RegistrarConfig, RegistrationSession};
use std::sync::Arc;

/// Wire a [`RegistrationSession`] to `endpoint`.
pub fn session_for_endpoint(
    endpoint: &str,
    options: WalletOptions,
    config: RegistrarConfig,
) -> Result<(RegistrationSession, JsonRpcWallet), ProviderError> {
    let rpc = JsonRpcClient::new(endpoint)?;
    let wallet = JsonRpcWallet::with_options(rpc.clone(), options);
    let contracts = Arc::new(RpcContracts::new(rpc));
    let session = RegistrationSession::new(
        Arc::new(wallet.clone()),
        contracts.clone(),
        contracts,
        config,
    );
    Ok((session, wallet))
}

use edx_provider::{JsonRpcClient, JsonRpcWallet, RpcContracts, WalletOptions};
use edx_registrar::{
    validate, ChainError, Network, RegistrarConfig, RegistrarController, RegistrationParams,
    ResolverContract, TxOptions, Wallet,
};
use edx_types::abi::{self, Token};
use edx_types::{namehash, Address, TxHash, Wei};
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn ok(result: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "jsonrpc": "2.0", "id": 1, "result": result }))
}

fn rpc_error(code: i64, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "error": { "code": code, "message": message }
    }))
}

async fn mock_method(server: &MockServer, name: &str, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": name })))
        .respond_with(response)
        .mount(server)
        .await;
}

async fn last_params(server: &MockServer) -> Value {
    let requests = server.received_requests().await.unwrap_or_default();
    let last = requests.last().expect("at least one request");
    let body: Value = serde_json::from_slice(&last.body).unwrap();
    body["params"].clone()
}

fn fast_wallet(server: &MockServer, timeout: Duration) -> JsonRpcWallet {
    JsonRpcWallet::with_options(
        JsonRpcClient::new(server.uri()).unwrap(),
        WalletOptions {
            receipt_timeout: timeout,
            receipt_poll_interval: Duration::from_millis(10),
            watch_interval: Duration::from_millis(20),
        },
    )
}

#[tokio::test]
async fn chain_id_is_parsed_from_hex() {
    let server = MockServer::start().await;
    mock_method(&server, "eth_chainId", ok(json!("0x7cb"))).await;

    let wallet = JsonRpcWallet::new(JsonRpcClient::new(server.uri()).unwrap());
    assert_eq!(wallet.chain_id().await.unwrap(), 1995);
}

#[tokio::test]
async fn request_accounts_falls_back_on_plain_nodes() {
    let server = MockServer::start().await;
    let account = "0x61c743b3fa8714915fc5687bb6b4903d11cf2146";
    mock_method(&server, "eth_requestAccounts", rpc_error(-32601, "method not found")).await;
    mock_method(&server, "eth_accounts", ok(json!([account]))).await;

    let wallet = JsonRpcWallet::new(JsonRpcClient::new(server.uri()).unwrap());
    let accounts = wallet.request_accounts().await.unwrap();
    assert_eq!(accounts, vec![account.parse::<Address>().unwrap()]);
}

#[tokio::test]
async fn declined_request_is_a_rejection() {
    let server = MockServer::start().await;
    mock_method(&server, "eth_requestAccounts", rpc_error(4001, "User rejected the request.")).await;

    let wallet = JsonRpcWallet::new(JsonRpcClient::new(server.uri()).unwrap());
    assert_eq!(
        wallet.request_accounts().await.unwrap_err(),
        ChainError::Rejected("User rejected the request.".into())
    );
}

#[tokio::test]
async fn server_failure_is_a_provider_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;

    let wallet = JsonRpcWallet::new(JsonRpcClient::new(server.uri()).unwrap());
    assert!(matches!(wallet.chain_id().await.unwrap_err(), ChainError::Provider(msg) if msg.contains("503")));
}

#[tokio::test]
async fn receipt_is_polled_until_mined() {
    let server = MockServer::start().await;
    let tx = TxHash([0x42; 32]);
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_getTransactionReceipt" })))
        .respond_with(ok(Value::Null))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    mock_method(
        &server,
        "eth_getTransactionReceipt",
        ok(json!({
            "transactionHash": tx.to_string(),
            "blockNumber": "0x2a",
            "status": "0x1"
        })),
    )
    .await;

    let wallet = fast_wallet(&server, Duration::from_secs(5));
    let receipt = wallet.wait_for_receipt(tx).await.unwrap();
    assert_eq!(receipt.tx_hash, tx);
    assert_eq!(receipt.block_number, 42);
    assert!(receipt.success);
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn receipt_wait_times_out() {
    let server = MockServer::start().await;
    mock_method(&server, "eth_getTransactionReceipt", ok(Value::Null)).await;

    let wallet = fast_wallet(&server, Duration::from_millis(100));
    let err = wallet.wait_for_receipt(TxHash([1; 32])).await.unwrap_err();
    assert!(matches!(err, ChainError::Provider(msg) if msg.contains("timed out")));
}

#[tokio::test]
async fn watcher_reports_chain_switch() {
    let server = MockServer::start().await;
    let account = "0x61c743b3fa8714915fc5687bb6b4903d11cf2146";
    mock_method(&server, "eth_accounts", ok(json!([account]))).await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_chainId" })))
        .respond_with(ok(json!("0x7cb")))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    mock_method(&server, "eth_chainId", ok(json!("0x1530"))).await;

    let wallet = fast_wallet(&server, Duration::from_secs(1));
    let mut events = wallet.subscribe();
    wallet.start_watching();

    let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("watcher should emit")
        .unwrap();
    assert_eq!(event, edx_registrar::WalletEvent::ChainChanged(5424));
    wallet.stop_watching();
}

#[tokio::test]
async fn forward_address_encodes_node_and_decodes_word() {
    let server = MockServer::start().await;
    let owner: Address = "0x97cd4bed8c4d0eb3d1f8c8d6e8d0f7b0e1f2a3b4".parse().unwrap();
    let word = abi::encode(&[Token::Address(owner)]);
    mock_method(&server, "eth_call", ok(json!(format!("0x{}", hex::encode(word))))).await;

    let network = Network::edexa_testnet();
    let contracts = RpcContracts::new(JsonRpcClient::new(server.uri()).unwrap());
    let node = namehash("testname.edx");
    let resolved = contracts.forward_address(network.resolver, node).await.unwrap();
    assert_eq!(resolved, owner);

    let params = last_params(&server).await;
    assert_eq!(params[1], "latest");
    assert_eq!(params[0]["to"], network.resolver.to_string());
    assert_eq!(
        params[0]["data"],
        format!("0x3b3b57de{}", hex::encode(node.0))
    );
}

#[tokio::test]
async fn empty_call_result_means_no_record() {
    let server = MockServer::start().await;
    mock_method(&server, "eth_call", ok(json!("0x"))).await;

    let network = Network::edexa_testnet();
    let contracts = RpcContracts::new(JsonRpcClient::new(server.uri()).unwrap());
    let node = namehash("nobody.edx");
    assert!(contracts
        .forward_address(network.resolver, node)
        .await
        .unwrap()
        .is_zero());
    assert_eq!(contracts.reverse_name(network.resolver, node).await.unwrap(), "");
}

#[tokio::test]
async fn rent_price_reads_base_and_premium() {
    let server = MockServer::start().await;
    let words = abi::encode(&[Token::Uint(Wei::from(3_170_979_198_376u64)), Token::Uint(Wei::from(25u64))]);
    mock_method(&server, "eth_call", ok(json!(format!("0x{}", hex::encode(words))))).await;

    let network = Network::edexa_testnet();
    let contracts = RpcContracts::new(JsonRpcClient::new(server.uri()).unwrap());
    let price = contracts
        .rent_price(network.registrar_controller, "testname", 31_536_000)
        .await
        .unwrap();
    assert_eq!(price.base, Wei::from(3_170_979_198_376u64));
    assert_eq!(price.premium, Wei::from(25u64));
}

#[tokio::test]
async fn rent_price_keeps_full_word_width() {
    let server = MockServer::start().await;
    let mut words = vec![0xffu8; 32];
    words.extend_from_slice(&[0u8; 32]);
    mock_method(&server, "eth_call", ok(json!(format!("0x{}", hex::encode(words))))).await;

    let network = Network::edexa_testnet();
    let contracts = RpcContracts::new(JsonRpcClient::new(server.uri()).unwrap());
    let price = contracts
        .rent_price(network.registrar_controller, "testname", 31_536_000)
        .await
        .unwrap();
    assert_eq!(price.base, Wei::MAX);
    assert!(price.premium.is_zero());
}

#[tokio::test]
async fn hostile_string_offset_is_a_provider_error() {
    let server = MockServer::start().await;
    let mut words = vec![0u8; 24];
    words.extend_from_slice(&(u64::MAX - 31).to_be_bytes());
    words.extend_from_slice(&[0u8; 32]);
    mock_method(&server, "eth_call", ok(json!(format!("0x{}", hex::encode(words))))).await;

    let network = Network::edexa_testnet();
    let contracts = RpcContracts::new(JsonRpcClient::new(server.uri()).unwrap());
    let err = contracts
        .reverse_name(network.resolver, namehash("nobody.edx"))
        .await
        .unwrap_err();
    assert!(matches!(err, ChainError::Provider(_)));
}

#[tokio::test]
async fn register_sends_payable_transaction() {
    let server = MockServer::start().await;
    let tx = TxHash([0x99; 32]);
    mock_method(&server, "eth_sendTransaction", ok(json!(tx.to_string()))).await;

    let network = Network::edexa_testnet();
    let owner = Address([0xab; 20]);
    let params = RegistrationParams::new(
        &validate("testname").unwrap(),
        owner,
        &network,
        &RegistrarConfig::default(),
    );
    let contracts = RpcContracts::new(JsonRpcClient::new(server.uri()).unwrap());
    let sent = contracts
        .register(
            network.registrar_controller,
            owner,
            &params,
            TxOptions::paying(Wei::from(1_000u64)).with_gas(1_000_000, 1_000_000_000),
        )
        .await
        .unwrap();
    assert_eq!(sent, tx);

    let params = last_params(&server).await;
    let object = &params[0];
    assert_eq!(object["from"], owner.to_string());
    assert_eq!(object["to"], network.registrar_controller.to_string());
    assert_eq!(object["value"], "0x3e8");
    assert_eq!(object["gas"], "0xf4240");
    assert!(object["data"].as_str().unwrap().starts_with("0x74694a2b"));
}

#[tokio::test]
async fn reverted_call_is_a_rejection() {
    let server = MockServer::start().await;
    mock_method(&server, "eth_sendTransaction", rpc_error(3, "execution reverted: CommitmentTooNew")).await;

    let network = Network::edexa_testnet();
    let contracts = RpcContracts::new(JsonRpcClient::new(server.uri()).unwrap());
    let err = contracts
        .submit_commitment(network.registrar_controller, Address([1; 20]), Default::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ChainError::Rejected(msg) if msg.contains("CommitmentTooNew")));
}

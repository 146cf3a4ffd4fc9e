//! End-to-end tests driving the Rosetta router in-process with mock
//! repositories behind the services.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use mirror_api::rosetta::types as wire;
use mirror_api::server::AppState;
use mirror_api::services::account::AccountApiService;
use mirror_api::services::block::BlockApiService;
use mirror_api::services::construction::ConstructionApiService;
use mirror_api::services::mempool::MempoolApiService;
use mirror_api::services::network::NetworkApiService;
use mirror_api::services::BaseService;
use mirror_api::{offline_router, online_router};
use mirror_domain::transaction::{Operation, OPERATION_TYPE_CRYPTO_TRANSFER, STATUS_SUCCESS};
use mirror_domain::{
    AccountId, AddressBookEntry, Block, EntityId, HbarAmount, MirrorError, Transaction, BLOCKCHAIN,
};
use mirror_storage::{
    AccountRepository, AddressBookRepository, BlockRepository, TransactionRepository,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

struct FixedBlockRepository {
    blocks: Vec<Block>,
}

#[async_trait]
impl BlockRepository for FixedBlockRepository {
    async fn find_by_hash(&self, hash: &str) -> Result<Block, MirrorError> {
        self.blocks
            .iter()
            .find(|b| b.hash == hash)
            .cloned()
            .ok_or(MirrorError::BlockNotFound)
    }

    async fn find_by_index(&self, index: i64) -> Result<Block, MirrorError> {
        self.blocks
            .iter()
            .find(|b| b.index == index)
            .cloned()
            .ok_or(MirrorError::BlockNotFound)
    }

    async fn find_by_identifier(&self, index: i64, hash: &str) -> Result<Block, MirrorError> {
        let block = self.find_by_hash(hash).await?;
        (block.index == index).then_some(block).ok_or(MirrorError::BlockNotFound)
    }

    async fn retrieve_genesis(&self) -> Result<Block, MirrorError> {
        self.find_by_index(0).await
    }

    async fn retrieve_genesis_transactions(&self) -> Result<Vec<Transaction>, MirrorError> {
        Ok(vec![])
    }

    async fn retrieve_latest(&self) -> Result<Block, MirrorError> {
        if self.blocks.len() < 2 {
            return Err(MirrorError::BlockNotFound);
        }
        Ok(self.blocks[self.blocks.len() - 2].clone())
    }
}

struct FixedTransactionRepository {
    transactions: Vec<(i64, Transaction)>,
}

#[async_trait]
impl TransactionRepository for FixedTransactionRepository {
    async fn find_between(&self, start: i64, end: i64) -> Result<Vec<Transaction>, MirrorError> {
        Ok(self
            .transactions
            .iter()
            .filter(|(t, _)| *t >= start && *t <= end)
            .map(|(_, tx)| tx.clone())
            .collect())
    }

    async fn find_by_hash_in_block(
        &self,
        hash: &str,
        start: i64,
        end: i64,
    ) -> Result<Transaction, MirrorError> {
        self.find_between(start, end)
            .await?
            .into_iter()
            .find(|tx| tx.hash == hash)
            .ok_or(MirrorError::TransactionNotFound)
    }
}

struct FixedAccountRepository {
    balance: i64,
}

#[async_trait]
impl AccountRepository for FixedAccountRepository {
    async fn get_account_alias(&self, account_id: AccountId) -> Result<AccountId, MirrorError> {
        Ok(account_id)
    }

    async fn get_account_id(&self, account_id: AccountId) -> Result<AccountId, MirrorError> {
        Ok(account_id)
    }

    async fn retrieve_balance_at_block(
        &self,
        _account_id: &AccountId,
        _consensus_end: i64,
    ) -> Result<(Vec<HbarAmount>, String, Option<Vec<u8>>), MirrorError> {
        Ok((vec![HbarAmount::new(self.balance)], String::new(), None))
    }
}

struct FixedAddressBookRepository;

#[async_trait]
impl AddressBookRepository for FixedAddressBookRepository {
    async fn entries(&self) -> Result<Vec<AddressBookEntry>, MirrorError> {
        Ok(vec![AddressBookEntry {
            node_id: 0,
            node_account_id: EntityId::of(0, 0, 3).unwrap(),
            endpoints: vec!["10.0.0.1:50211".to_string()],
        }])
    }
}

fn chain(len: usize) -> Vec<Block> {
    (0..len as i64)
        .map(|i| Block {
            index: i,
            hash: format!("aa{i:02x}"),
            parent_index: (i - 1).max(0),
            parent_hash: format!("aa{:02x}", (i - 1).max(0)),
            consensus_start_ns: 1_000 * i + 1,
            consensus_end_ns: 1_000 * (i + 1),
            transactions: vec![],
        })
        .collect()
}

fn network_identifier() -> Value {
    json!({"blockchain": BLOCKCHAIN, "network": "demo"})
}

fn transfer_tx(hash: &str) -> Transaction {
    Transaction {
        hash: hash.to_string(),
        entity_id: None,
        memo: b"hello".to_vec(),
        operations: vec![Operation::new(
            0,
            OPERATION_TYPE_CRYPTO_TRANSFER,
            AccountId::from_entity_id(EntityId::from_encoded(100)),
            Some(HbarAmount::new(-5)),
        )
        .with_status(STATUS_SUCCESS)],
    }
}

fn online_state() -> Arc<AppState> {
    let base = BaseService::online(
        Arc::new(FixedBlockRepository { blocks: chain(6) }),
        Arc::new(FixedTransactionRepository {
            transactions: vec![(2_500, transfer_tx("0xfeed"))],
        }),
    );
    let account_repo = Arc::new(FixedAccountRepository { balance: 12_317 });

    Arc::new(AppState {
        network: NetworkApiService::new(
            base.clone(),
            Some(Arc::new(FixedAddressBookRepository)),
            wire::NetworkIdentifier {
                blockchain: BLOCKCHAIN.to_string(),
                network: "demo".to_string(),
                sub_network_identifier: None,
            },
            vec![],
            "test-node".to_string(),
        ),
        block: Some(BlockApiService::new(base.clone(), account_repo.clone(), 128, 100)),
        account: Some(AccountApiService::new(base.clone(), account_repo)),
        construction: ConstructionApiService::new(true, 0, 0, vec![], None).unwrap(),
        mempool: MempoolApiService,
    })
}

fn offline_state() -> Arc<AppState> {
    let base = BaseService::offline();
    Arc::new(AppState {
        network: NetworkApiService::new(
            base,
            None,
            wire::NetworkIdentifier {
                blockchain: BLOCKCHAIN.to_string(),
                network: "demo".to_string(),
                sub_network_identifier: None,
            },
            vec![],
            "test-node".to_string(),
        ),
        block: None,
        account: None,
        construction: ConstructionApiService::new(false, 0, 0, vec![], None).unwrap(),
        mempool: MempoolApiService,
    })
}

async fn post(router: axum::Router, path: &str, body: Value) -> (StatusCode, Value) {
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(path)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn post_as<T: DeserializeOwned>(router: axum::Router, path: &str, body: Value) -> T {
    let (status, value) = post(router, path, body).await;
    assert_eq!(status, StatusCode::OK, "unexpected failure: {value}");
    serde_json::from_value(value).unwrap()
}

#[tokio::test]
async fn test_network_list() {
    let response: wire::NetworkListResponse = post_as(
        online_router(online_state()),
        "/network/list",
        json!({}),
    )
    .await;
    assert_eq!(response.network_identifiers.len(), 1);
    assert_eq!(response.network_identifiers[0].network, "demo");
}

#[tokio::test]
async fn test_network_options_advertises_errors() {
    let response: wire::NetworkOptionsResponse = post_as(
        online_router(online_state()),
        "/network/options",
        json!({"network_identifier": network_identifier()}),
    )
    .await;
    assert!(response.allow.historical_balance_lookup);
    assert!(response.allow.errors.iter().any(|e| e.retriable));
}

#[tokio::test]
async fn test_network_status() {
    let response: wire::NetworkStatusResponse = post_as(
        online_router(online_state()),
        "/network/status",
        json!({"network_identifier": network_identifier()}),
    )
    .await;
    assert_eq!(response.genesis_block_identifier.index, 0);
    assert_eq!(response.current_block_identifier.index, 4);
    assert_eq!(response.peers[0].peer_id, "0.0.3");
}

#[tokio::test]
async fn test_block_endpoint_returns_prefixed_hashes() {
    let response: wire::BlockResponse = post_as(
        online_router(online_state()),
        "/block",
        json!({
            "network_identifier": network_identifier(),
            "block_identifier": {"index": 2}
        }),
    )
    .await;

    let block = response.block.unwrap();
    assert_eq!(block.block_identifier.index, 2);
    assert!(block.block_identifier.hash.starts_with("0x"));
    assert_eq!(block.transactions.len(), 1);
    assert_eq!(block.transactions[0].transaction_identifier.hash, "0xfeed");
    let metadata = block.transactions[0].metadata.as_ref().unwrap();
    assert_eq!(metadata.get("memo"), Some(&Value::String("hello".to_string())));
}

#[tokio::test]
async fn test_block_transaction_endpoint() {
    let response: wire::BlockTransactionResponse = post_as(
        online_router(online_state()),
        "/block/transaction",
        json!({
            "network_identifier": network_identifier(),
            "block_identifier": {"index": 2, "hash": "0xaa02"},
            "transaction_identifier": {"hash": "0xfeed"}
        }),
    )
    .await;
    assert_eq!(response.transaction.transaction_identifier.hash, "0xfeed");
}

#[tokio::test]
async fn test_account_balance_endpoint() {
    let response: wire::AccountBalanceResponse = post_as(
        online_router(online_state()),
        "/account/balance",
        json!({
            "network_identifier": network_identifier(),
            "account_identifier": {"address": "0.0.9000"}
        }),
    )
    .await;
    assert_eq!(response.balances[0].value, "12317");
    assert_eq!(response.balances[0].currency.symbol, "HBAR");
    assert_eq!(response.block_identifier.index, 4);
}

#[tokio::test]
async fn test_mempool_not_implemented() {
    let (status, body) = post(
        online_router(online_state()),
        "/mempool",
        json!({"network_identifier": network_identifier()}),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Not implemented");
    assert_eq!(body["retriable"], false);
}

#[tokio::test]
async fn test_unknown_block_is_rosetta_error() {
    let (status, body) = post(
        online_router(online_state()),
        "/block",
        json!({
            "network_identifier": network_identifier(),
            "block_identifier": {"index": 999}
        }),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Block not found");
    assert_eq!(body["retriable"], false);
}

#[tokio::test]
async fn test_offline_router_has_no_data_endpoints() {
    let (status, _) = post(
        offline_router(offline_state()),
        "/block",
        json!({
            "network_identifier": network_identifier(),
            "block_identifier": {"index": 1}
        }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // construction still works offline
    let response: wire::ConstructionPreprocessResponse = post_as(
        offline_router(offline_state()),
        "/construction/preprocess",
        json!({
            "network_identifier": network_identifier(),
            "operations": [
                {
                    "operation_identifier": {"index": 0},
                    "type": "CRYPTOTRANSFER",
                    "account": {"address": "0.0.100"},
                    "amount": {"value": "-500", "currency": {"symbol": "HBAR", "decimals": 8}}
                },
                {
                    "operation_identifier": {"index": 1},
                    "type": "CRYPTOTRANSFER",
                    "account": {"address": "0.0.200"},
                    "amount": {"value": "500", "currency": {"symbol": "HBAR", "decimals": 8}}
                }
            ]
        }),
    )
    .await;
    assert_eq!(response.required_public_keys[0].address, "0.0.100");
}

#[tokio::test]
async fn test_construction_flow_over_http() {
    use ed25519_dalek::Signer;

    let signing_key = ed25519_dalek::SigningKey::from_bytes(&[33u8; 32]);
    let public_key_hex = hex::encode(signing_key.verifying_key().as_bytes());

    // derive an alias address from the public key
    let derived: wire::ConstructionDeriveResponse = post_as(
        online_router(online_state()),
        "/construction/derive",
        json!({
            "network_identifier": network_identifier(),
            "public_key": {"hex_bytes": public_key_hex.clone(), "curve_type": "edwards25519"}
        }),
    )
    .await;
    assert!(derived.account_identifier.address.starts_with("0.0.0x1220"));

    let operations = json!([
        {
            "operation_identifier": {"index": 0},
            "type": "CRYPTOTRANSFER",
            "account": {"address": "0.0.100"},
            "amount": {"value": "-500", "currency": {"symbol": "HBAR", "decimals": 8}}
        },
        {
            "operation_identifier": {"index": 1},
            "type": "CRYPTOTRANSFER",
            "account": {"address": "0.0.200"},
            "amount": {"value": "500", "currency": {"symbol": "HBAR", "decimals": 8}}
        }
    ]);

    let preprocessed: wire::ConstructionPreprocessResponse = post_as(
        online_router(online_state()),
        "/construction/preprocess",
        json!({"network_identifier": network_identifier(), "operations": operations.clone()}),
    )
    .await;
    assert_eq!(preprocessed.required_public_keys[0].address, "0.0.100");

    let metadata: wire::ConstructionMetadataResponse = post_as(
        online_router(online_state()),
        "/construction/metadata",
        json!({
            "network_identifier": network_identifier(),
            "options": preprocessed.options
        }),
    )
    .await;
    assert_eq!(metadata.suggested_fee.unwrap()[0].value, "100000000");

    let payloads: wire::ConstructionPayloadsResponse = post_as(
        online_router(online_state()),
        "/construction/payloads",
        json!({
            "network_identifier": network_identifier(),
            "operations": operations,
            "metadata": metadata.metadata
        }),
    )
    .await;
    assert_eq!(payloads.payloads.len(), 1);

    let payload_bytes = hex::decode(&payloads.payloads[0].hex_bytes).unwrap();
    let signature = signing_key.sign(&payload_bytes);

    let combined: wire::ConstructionCombineResponse = post_as(
        online_router(online_state()),
        "/construction/combine",
        json!({
            "network_identifier": network_identifier(),
            "unsigned_transaction": payloads.unsigned_transaction,
            "signatures": [{
                "signing_payload": payloads.payloads[0].clone(),
                "public_key": {"hex_bytes": public_key_hex, "curve_type": "edwards25519"},
                "signature_type": "ed25519",
                "hex_bytes": hex::encode(signature.to_bytes())
            }]
        }),
    )
    .await;

    let parsed: wire::ConstructionParseResponse = post_as(
        online_router(online_state()),
        "/construction/parse",
        json!({
            "network_identifier": network_identifier(),
            "signed": true,
            "transaction": combined.signed_transaction.clone()
        }),
    )
    .await;
    assert_eq!(parsed.operations.len(), 2);
    assert_eq!(parsed.account_identifier_signers.unwrap()[0].address, "0.0.100");

    let hashed: wire::TransactionIdentifierResponse = post_as(
        online_router(online_state()),
        "/construction/hash",
        json!({
            "network_identifier": network_identifier(),
            "signed_transaction": combined.signed_transaction.clone()
        }),
    )
    .await;

    let submitted: wire::TransactionIdentifierResponse = post_as(
        online_router(online_state()),
        "/construction/submit",
        json!({
            "network_identifier": network_identifier(),
            "signed_transaction": combined.signed_transaction
        }),
    )
    .await;
    assert_eq!(submitted.transaction_identifier.hash, hashed.transaction_identifier.hash);
}

#[tokio::test]
async fn test_health_endpoints() {
    let response = online_router(online_state())
        .oneshot(Request::builder().uri("/health/liveness").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = offline_router(offline_state())
        .oneshot(Request::builder().uri("/health/readiness").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

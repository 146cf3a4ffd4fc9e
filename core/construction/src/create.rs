use crate::common::{parse_operation_metadata, validate_operations, AmountPolicy};
use crate::constructor::TransactionConstructor;
use crate::native::{AccountCreateTransaction, NativeTransaction};
use crate::transaction_id::TransactionId;
use mirror_domain::account_id::decode_alias_key;
use mirror_domain::transaction::{Operation, OPERATION_TYPE_CRYPTO_CREATE_ACCOUNT};
use mirror_domain::{AccountId, EntityId, HbarAmount, MirrorError};
use serde::Deserialize;
use serde_json::Value;

const ED25519_KEY_PREFIX: [u8; 2] = [0x12, 0x20];

/// Builds and parses account creation transactions.
///
/// A single operation carries the payer as its account; the new account's key
/// and optional settings travel in operation metadata. The payer funds the
/// opening balance and is the sole required signer.
pub struct CryptoCreateConstructor;

impl CryptoCreateConstructor {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, Deserialize)]
struct CreateAccountMetadata {
    /// Hex public key of the new account, raw ed25519 or protobuf-encoded.
    key: String,
    auto_renew_period: Option<i64>,
    memo: Option<String>,
    max_automatic_token_associations: Option<i32>,
    proxy_account_id: Option<String>,
}

struct ValidatedCreate {
    payer: EntityId,
    initial_balance: i64,
    metadata: CreateAccountMetadata,
    key: Vec<u8>,
}

fn validate_create_operations(operations: &[Operation]) -> Result<ValidatedCreate, MirrorError> {
    // the opening balance may ride in the amount or stay in metadata, so the
    // amount shape is checked here rather than by the shared validator
    validate_operations(operations, 1, OPERATION_TYPE_CRYPTO_CREATE_ACCOUNT, AmountPolicy::Any)?;

    let operation = &operations[0];
    let initial_balance = match operation.amount {
        None => 0,
        Some(amount) if amount.value > 0 => amount.value,
        Some(_) => return Err(MirrorError::InvalidAmount),
    };

    let payer = operation.account_id.entity_id().ok_or(MirrorError::InvalidAccount)?;
    let metadata: CreateAccountMetadata = parse_operation_metadata(&[&operation.metadata])?;
    let key = decode_metadata_key(&metadata.key)?;

    Ok(ValidatedCreate {
        payer,
        initial_balance,
        metadata,
        key,
    })
}

/// Accept a raw 32-byte ed25519 key or an already protobuf-encoded key.
fn decode_metadata_key(key: &str) -> Result<Vec<u8>, MirrorError> {
    let bare = key.strip_prefix("0x").unwrap_or(key);
    let bytes = hex::decode(bare).map_err(|_| MirrorError::InvalidOperationMetadata)?;

    let encoded = if bytes.len() == 32 {
        let mut wrapped = ED25519_KEY_PREFIX.to_vec();
        wrapped.extend_from_slice(&bytes);
        wrapped
    } else {
        bytes
    };

    decode_alias_key(&encoded).map_err(|_| MirrorError::InvalidOperationMetadata)?;
    Ok(encoded)
}

impl TransactionConstructor for CryptoCreateConstructor {
    fn construct(
        &self,
        node_account_id: EntityId,
        operations: &[Operation],
    ) -> Result<(NativeTransaction, Vec<AccountId>), MirrorError> {
        let validated = validate_create_operations(operations)?;

        let proxy_account_id = validated
            .metadata
            .proxy_account_id
            .as_deref()
            .map(|id| id.parse::<EntityId>())
            .transpose()
            .map_err(|_| MirrorError::InvalidOperationMetadata)?;

        let mut create = AccountCreateTransaction::new();
        create.key = validated.key;
        create.initial_balance = validated.initial_balance;
        create.auto_renew_period_seconds = validated.metadata.auto_renew_period;
        create.account_memo = validated.metadata.memo.unwrap_or_default();
        create.max_automatic_token_associations = validated.metadata.max_automatic_token_associations;
        create.proxy_account_id = proxy_account_id;
        create.header.transaction_id = Some(TransactionId::generate(validated.payer));
        create.header.node_account_id = Some(node_account_id);
        create.header.max_transaction_fee = self.default_max_transaction_fee().value;

        let mut transaction = NativeTransaction::AccountCreate(create);
        transaction.freeze()?;

        Ok((transaction, vec![AccountId::from_entity_id(validated.payer)]))
    }

    fn parse(
        &self,
        transaction: &NativeTransaction,
    ) -> Result<(Vec<Operation>, Vec<AccountId>), MirrorError> {
        let NativeTransaction::AccountCreate(create) = transaction else {
            return Err(MirrorError::TransactionInvalidType);
        };

        let payer = create
            .header
            .transaction_id
            .map(|id| id.payer)
            .ok_or(MirrorError::TransactionInvalidType)?;

        let amount = (create.initial_balance > 0).then(|| HbarAmount::new(create.initial_balance));
        let mut operation = Operation::new(
            0,
            OPERATION_TYPE_CRYPTO_CREATE_ACCOUNT,
            AccountId::from_entity_id(payer),
            amount,
        );
        operation
            .metadata
            .insert("key".to_string(), Value::String(format!("0x{}", hex::encode(&create.key))));
        if let Some(period) = create.auto_renew_period_seconds {
            operation.metadata.insert("auto_renew_period".to_string(), Value::from(period));
        }
        if !create.account_memo.is_empty() {
            operation
                .metadata
                .insert("memo".to_string(), Value::String(create.account_memo.clone()));
        }
        if let Some(max) = create.max_automatic_token_associations {
            operation
                .metadata
                .insert("max_automatic_token_associations".to_string(), Value::from(max));
        }
        if let Some(proxy) = create.proxy_account_id {
            operation
                .metadata
                .insert("proxy_account_id".to_string(), Value::String(proxy.to_string()));
        }

        Ok((vec![operation], vec![AccountId::from_entity_id(payer)]))
    }

    fn preprocess(&self, operations: &[Operation]) -> Result<Vec<AccountId>, MirrorError> {
        let validated = validate_create_operations(operations)?;
        Ok(vec![AccountId::from_entity_id(validated.payer)])
    }

    fn default_max_transaction_fee(&self) -> HbarAmount {
        HbarAmount::from_hbar(5)
    }

    fn operation_type(&self) -> &'static str {
        OPERATION_TYPE_CRYPTO_CREATE_ACCOUNT
    }

    fn transaction_type(&self) -> &'static str {
        "AccountCreateTransaction"
    }
}

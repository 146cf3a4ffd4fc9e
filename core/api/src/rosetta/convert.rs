//! Domain → Rosetta wire conversion, including the `0x` hash prefix rules:
//! hashes always carry the prefix on output and are accepted either way on
//! input.

use crate::rosetta::types as wire;
use mirror_domain::amount::{CURRENCY_DECIMALS, CURRENCY_SYMBOL};
use mirror_domain::transaction::{Operation, Transaction};
use mirror_domain::{AccountId, Block, HbarAmount, MirrorError};

/// Add the `0x` prefix if absent.
pub fn add_hex_prefix(hash: &str) -> String {
    if hash.starts_with("0x") {
        hash.to_string()
    } else {
        format!("0x{hash}")
    }
}

/// Strip the `0x` prefix if present.
pub fn remove_hex_prefix(hash: &str) -> &str {
    hash.strip_prefix("0x").unwrap_or(hash)
}

pub fn currency_hbar() -> wire::Currency {
    wire::Currency {
        symbol: CURRENCY_SYMBOL.to_string(),
        decimals: CURRENCY_DECIMALS,
        metadata: None,
    }
}

pub fn amount_to_wire(amount: &HbarAmount) -> wire::Amount {
    wire::Amount {
        value: amount.value.to_string(),
        currency: currency_hbar(),
        metadata: None,
    }
}

/// Parse a wire amount, enforcing the HBAR currency contract.
pub fn amount_from_wire(amount: &wire::Amount) -> Result<HbarAmount, MirrorError> {
    let currency = &amount.currency;
    if currency.symbol != CURRENCY_SYMBOL
        || currency.decimals != CURRENCY_DECIMALS
        || currency.metadata.is_some()
    {
        return Err(MirrorError::InvalidCurrency);
    }

    HbarAmount::parse(&amount.value)
}

pub fn account_to_wire(account_id: &AccountId) -> wire::AccountIdentifier {
    wire::AccountIdentifier::new(account_id.to_string())
}

pub fn operation_to_wire(operation: &Operation) -> wire::Operation {
    wire::Operation {
        operation_identifier: wire::OperationIdentifier {
            index: operation.index,
            network_index: None,
        },
        related_operations: None,
        operation_type: operation.op_type.clone(),
        status: operation.status.clone(),
        account: Some(account_to_wire(&operation.account_id)),
        amount: operation.amount.as_ref().map(amount_to_wire),
        metadata: (!operation.metadata.is_empty()).then(|| operation.metadata.clone()),
    }
}

/// Parse a wire operation into the domain model for construction calls.
pub fn operation_from_wire(operation: &wire::Operation) -> Result<Operation, MirrorError> {
    let account = operation.account.as_ref().ok_or(MirrorError::InvalidAccount)?;
    let account_id = AccountId::parse(&account.address)?;
    let amount = operation.amount.as_ref().map(amount_from_wire).transpose()?;

    let mut parsed = Operation::new(
        operation.operation_identifier.index,
        &operation.operation_type,
        account_id,
        amount,
    );
    parsed.status = operation.status.clone();
    if let Some(metadata) = &operation.metadata {
        parsed.metadata = metadata.clone();
    }
    Ok(parsed)
}

pub fn operations_from_wire(operations: &[wire::Operation]) -> Result<Vec<Operation>, MirrorError> {
    operations.iter().map(operation_from_wire).collect()
}

pub fn transaction_to_wire(transaction: &Transaction) -> wire::Transaction {
    let mut metadata = wire::Metadata::new();
    if let Some(entity_id) = &transaction.entity_id {
        metadata.insert("entity_id".to_string(), serde_json::Value::String(entity_id.to_string()));
    }
    if !transaction.memo.is_empty() {
        metadata.insert(
            "memo".to_string(),
            serde_json::Value::String(String::from_utf8_lossy(&transaction.memo).into_owned()),
        );
    }

    wire::Transaction {
        transaction_identifier: wire::TransactionIdentifier {
            hash: add_hex_prefix(&transaction.hash),
        },
        operations: transaction.operations.iter().map(operation_to_wire).collect(),
        metadata: (!metadata.is_empty()).then_some(metadata),
    }
}

pub fn block_identifier(block: &Block) -> wire::BlockIdentifier {
    wire::BlockIdentifier {
        index: block.index,
        hash: add_hex_prefix(&block.hash),
    }
}

pub fn block_to_wire(block: &Block) -> wire::Block {
    wire::Block {
        block_identifier: block_identifier(block),
        parent_block_identifier: wire::BlockIdentifier {
            index: block.parent_index,
            hash: add_hex_prefix(&block.parent_hash),
        },
        timestamp: block.timestamp_millis(),
        transactions: block.transactions.iter().map(transaction_to_wire).collect(),
        metadata: None,
    }
}

pub fn error_to_wire(error: MirrorError) -> wire::ErrorDetail {
    wire::ErrorDetail {
        code: error.code(),
        message: error.to_string(),
        retriable: error.retriable(),
        details: None,
    }
}

/// The whole catalog, advertised at `/network/options`.
pub fn error_catalog() -> Vec<wire::ErrorDetail> {
    MirrorError::all().iter().copied().map(error_to_wire).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirror_domain::transaction::{OPERATION_TYPE_CRYPTO_TRANSFER, STATUS_SUCCESS};
    use mirror_domain::EntityId;

    #[test]
    fn test_hex_prefix_tools() {
        assert_eq!(add_hex_prefix("abcd"), "0xabcd");
        assert_eq!(add_hex_prefix("0xabcd"), "0xabcd");
        assert_eq!(remove_hex_prefix("0xabcd"), "abcd");
        assert_eq!(remove_hex_prefix("abcd"), "abcd");
    }

    #[test]
    fn test_amount_roundtrip() {
        let wire_amount = amount_to_wire(&HbarAmount::new(12317));
        assert_eq!(wire_amount.value, "12317");
        assert_eq!(wire_amount.currency.symbol, "HBAR");
        assert_eq!(wire_amount.currency.decimals, 8);
        assert_eq!(amount_from_wire(&wire_amount).unwrap().value, 12317);
    }

    #[test]
    fn test_amount_rejects_wrong_currency() {
        let mut amount = amount_to_wire(&HbarAmount::new(1));
        amount.currency.symbol = "BTC".to_string();
        assert_eq!(amount_from_wire(&amount).unwrap_err(), MirrorError::InvalidCurrency);

        let mut amount = amount_to_wire(&HbarAmount::new(1));
        amount.currency.decimals = 6;
        assert_eq!(amount_from_wire(&amount).unwrap_err(), MirrorError::InvalidCurrency);
    }

    #[test]
    fn test_block_to_wire_prefixes_hashes() {
        let block = Block {
            index: 2,
            hash: "aa11".to_string(),
            parent_index: 1,
            parent_hash: "bb22".to_string(),
            consensus_start_ns: 2_000_000_000,
            consensus_end_ns: 3_000_000_000,
            transactions: vec![],
        };

        let wire_block = block_to_wire(&block);
        assert_eq!(wire_block.block_identifier.hash, "0xaa11");
        assert_eq!(wire_block.parent_block_identifier.hash, "0xbb22");
        assert_eq!(wire_block.timestamp, 2_000);
    }

    #[test]
    fn test_operation_roundtrip() {
        let operation = Operation::new(
            3,
            OPERATION_TYPE_CRYPTO_TRANSFER,
            AccountId::from_entity_id(EntityId::of(0, 0, 100).unwrap()),
            Some(HbarAmount::new(-500)),
        )
        .with_status(STATUS_SUCCESS);

        let wire_operation = operation_to_wire(&operation);
        assert_eq!(wire_operation.operation_identifier.index, 3);
        assert_eq!(wire_operation.account.as_ref().unwrap().address, "0.0.100");
        assert_eq!(wire_operation.status.as_deref(), Some("SUCCESS"));

        let parsed = operation_from_wire(&wire_operation).unwrap();
        assert_eq!(parsed, operation);
    }

    #[test]
    fn test_error_catalog_complete() {
        let catalog = error_catalog();
        assert_eq!(catalog.len(), MirrorError::all().len());
        assert!(catalog.iter().any(|e| e.retriable));
    }
}

use crate::common::{validate_operations, AmountPolicy};
use crate::constructor::TransactionConstructor;
use crate::native::{NativeTransaction, TransferTransaction};
use crate::transaction_id::TransactionId;
use mirror_domain::transaction::{Operation, OPERATION_TYPE_CRYPTO_TRANSFER};
use mirror_domain::{AccountId, EntityId, HbarAmount, MirrorError};
use std::collections::BTreeMap;
use tracing::error;

/// Builds and parses hbar transfer transactions.
///
/// An accepted operation list nets to exactly zero, every operation amount is
/// non-zero, and no account's aggregate cancels out to zero. Debit accounts
/// are the required signers.
pub struct CryptoTransferConstructor;

impl CryptoTransferConstructor {
    pub fn new() -> Self {
        Self
    }
}

struct ParsedOperations {
    legs: Vec<(EntityId, i64)>,
    /// Aggregated amount per account, keyed by the canonical id string so
    /// iteration order is deterministic.
    aggregated: BTreeMap<String, (EntityId, i64)>,
}

impl ParsedOperations {
    fn signers(&self) -> Vec<AccountId> {
        self.aggregated
            .values()
            .filter(|(_, amount)| *amount < 0)
            .map(|(id, _)| AccountId::from_entity_id(*id))
            .collect()
    }
}

fn parse_transfer_operations(operations: &[Operation]) -> Result<ParsedOperations, MirrorError> {
    validate_operations(operations, 0, OPERATION_TYPE_CRYPTO_TRANSFER, AmountPolicy::Required)?;

    let mut legs = Vec::with_capacity(operations.len());
    let mut aggregated: BTreeMap<String, (EntityId, i64)> = BTreeMap::new();
    let mut sum = 0i64;

    for operation in operations {
        let Some(entity_id) = operation.account_id.entity_id() else {
            return Err(MirrorError::InvalidAccount);
        };

        let amount = operation.amount.ok_or(MirrorError::InvalidOperations)?.value;
        if amount == 0 {
            return Err(MirrorError::InvalidAmount);
        }

        legs.push((entity_id, amount));
        aggregated.entry(entity_id.to_string()).or_insert((entity_id, 0)).1 += amount;
        sum += amount;
    }

    for (id, (_, amount)) in &aggregated {
        if *amount == 0 {
            error!("Aggregated amount for account {id} is 0");
            return Err(MirrorError::InvalidAmount);
        }
    }

    if sum != 0 {
        return Err(MirrorError::InvalidOperationsTotalAmount);
    }

    Ok(ParsedOperations { legs, aggregated })
}

impl TransactionConstructor for CryptoTransferConstructor {
    fn construct(
        &self,
        node_account_id: EntityId,
        operations: &[Operation],
    ) -> Result<(NativeTransaction, Vec<AccountId>), MirrorError> {
        let parsed = parse_transfer_operations(operations)?;
        let signers = parsed.signers();

        let mut transfer = TransferTransaction::new();
        for (account, amount) in &parsed.legs {
            transfer.add_hbar_transfer(*account, *amount);
        }

        // the lexicographically-smallest signer pays; debit sets are never
        // empty once the net-zero checks pass
        let payer = signers
            .first()
            .and_then(|signer| signer.entity_id())
            .ok_or(MirrorError::InvalidAccount)?;
        transfer.header.transaction_id = Some(TransactionId::generate(payer));
        transfer.header.node_account_id = Some(node_account_id);
        transfer.header.max_transaction_fee = self.default_max_transaction_fee().value;

        let mut transaction = NativeTransaction::Transfer(transfer);
        transaction.freeze()?;

        Ok((transaction, signers))
    }

    fn parse(
        &self,
        transaction: &NativeTransaction,
    ) -> Result<(Vec<Operation>, Vec<AccountId>), MirrorError> {
        let NativeTransaction::Transfer(transfer) = transaction else {
            return Err(MirrorError::TransactionInvalidType);
        };

        // aggregate and emit in stable account order
        let mut aggregated: BTreeMap<String, (EntityId, i64)> = BTreeMap::new();
        for leg in &transfer.transfers {
            aggregated.entry(leg.account.to_string()).or_insert((leg.account, 0)).1 += leg.amount;
        }

        let mut operations = Vec::with_capacity(aggregated.len());
        let mut signers = Vec::new();
        for (_, (account, amount)) in &aggregated {
            operations.push(Operation::new(
                operations.len() as i64,
                OPERATION_TYPE_CRYPTO_TRANSFER,
                AccountId::from_entity_id(*account),
                Some(HbarAmount::new(*amount)),
            ));
            if *amount < 0 {
                signers.push(AccountId::from_entity_id(*account));
            }
        }

        Ok((operations, signers))
    }

    fn preprocess(&self, operations: &[Operation]) -> Result<Vec<AccountId>, MirrorError> {
        Ok(parse_transfer_operations(operations)?.signers())
    }

    fn default_max_transaction_fee(&self) -> HbarAmount {
        HbarAmount::from_hbar(1)
    }

    fn operation_type(&self) -> &'static str {
        OPERATION_TYPE_CRYPTO_TRANSFER
    }

    fn transaction_type(&self) -> &'static str {
        "TransferTransaction"
    }
}

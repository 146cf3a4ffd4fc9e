// core/storage/src/transaction.rs

use crate::db::DbClient;
use crate::errata::ErrataStore;
use crate::BATCH_SIZE;
use async_trait::async_trait;
use mirror_domain::tables::{
    CryptoTransferRow, StakingRewardTransferRow, TransactionRow, ERRATA_DELETE,
};
use mirror_domain::transaction::{
    transaction_result_name, transaction_type_name, Operation, Transaction,
    OPERATION_TYPE_CRYPTO_TRANSFER, OPERATION_TYPE_FEE,
};
use mirror_domain::{AccountId, EntityId, HbarAmount, MirrorError};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

const SELECT_TRANSACTION_COLUMNS: &str = "\
    select consensus_timestamp, charged_tx_fee, entity_id, itemized_transfer, memo, nonce, \
           payer_account_id, result, transaction_hash, type, valid_start_ns \
    from transaction";

const SELECT_CRYPTO_TRANSFERS: &str = "\
    select amount, consensus_timestamp, entity_id, payer_account_id, errata \
    from crypto_transfer where consensus_timestamp = any($1)";

const SELECT_STAKING_REWARD_TRANSFERS: &str = "\
    select account_id, amount, consensus_timestamp, payer_account_id \
    from staking_reward_transfer where consensus_timestamp = any($1)";

/// Batch transaction lookup over a consensus timestamp range.
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// All transactions with `consensus_timestamp` in `[start, end]`, ordered
    /// by timestamp, including curated missing transactions.
    async fn find_between(&self, start: i64, end: i64) -> Result<Vec<Transaction>, MirrorError>;

    /// A single transaction by its `0x`-prefixed (or bare) hex hash within
    /// the block's timestamp range.
    async fn find_by_hash_in_block(
        &self,
        hash: &str,
        start: i64,
        end: i64,
    ) -> Result<Transaction, MirrorError>;
}

pub struct PgTransactionRepository {
    db: DbClient,
    staking_reward_account: EntityId,
}

impl PgTransactionRepository {
    pub fn new(db: DbClient, staking_reward_account: EntityId) -> Self {
        Self {
            db,
            staking_reward_account,
        }
    }

    async fn fetch_transaction_rows(
        &self,
        start: i64,
        end: i64,
    ) -> Result<Vec<TransactionRow>, MirrorError> {
        let mut rows: Vec<TransactionRow> = Vec::new();
        let mut cursor = start;

        loop {
            let batch: Vec<TransactionRow> = self
                .db
                .scoped(
                    sqlx::query_as(&format!(
                        "{SELECT_TRANSACTION_COLUMNS} \
                         where consensus_timestamp >= $1 and consensus_timestamp <= $2 \
                         order by consensus_timestamp limit $3"
                    ))
                    .bind(cursor)
                    .bind(end)
                    .bind(BATCH_SIZE)
                    .fetch_all(self.db.pool()),
                )
                .await?;

            let short = batch.len() < BATCH_SIZE as usize;
            if let Some(last) = batch.last() {
                cursor = last.consensus_timestamp + 1;
            }
            rows.extend(batch);

            if short {
                break;
            }
        }

        Ok(rows)
    }

    async fn fetch_transfers(
        &self,
        timestamps: &[i64],
    ) -> Result<HashMap<i64, Vec<CryptoTransferRow>>, MirrorError> {
        let mut by_timestamp: HashMap<i64, Vec<CryptoTransferRow>> = HashMap::new();
        for chunk in timestamps.chunks(BATCH_SIZE as usize) {
            let rows: Vec<CryptoTransferRow> = self
                .db
                .scoped(
                    sqlx::query_as(SELECT_CRYPTO_TRANSFERS)
                        .bind(chunk.to_vec())
                        .fetch_all(self.db.pool()),
                )
                .await?;
            for row in rows {
                by_timestamp.entry(row.consensus_timestamp).or_default().push(row);
            }
        }
        Ok(by_timestamp)
    }

    async fn fetch_staking_rewards(
        &self,
        timestamps: &[i64],
    ) -> Result<HashMap<i64, Vec<StakingRewardTransferRow>>, MirrorError> {
        let mut by_timestamp: HashMap<i64, Vec<StakingRewardTransferRow>> = HashMap::new();
        for chunk in timestamps.chunks(BATCH_SIZE as usize) {
            let rows: Vec<StakingRewardTransferRow> = self
                .db
                .scoped(
                    sqlx::query_as(SELECT_STAKING_REWARD_TRANSFERS)
                        .bind(chunk.to_vec())
                        .fetch_all(self.db.pool()),
                )
                .await?;
            for row in rows {
                by_timestamp.entry(row.consensus_timestamp).or_default().push(row);
            }
        }
        Ok(by_timestamp)
    }

    /// Resolve rows into domain transactions, keyed by consensus timestamp so
    /// callers can interleave errata records.
    async fn to_transactions(
        &self,
        rows: Vec<TransactionRow>,
    ) -> Result<Vec<(i64, Transaction)>, MirrorError> {
        let timestamps: Vec<i64> = rows.iter().map(|r| r.consensus_timestamp).collect();
        let mut transfers = self.fetch_transfers(&timestamps).await?;
        let mut rewards = self.fetch_staking_rewards(&timestamps).await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let transfers = transfers.remove(&row.consensus_timestamp).unwrap_or_default();
                let rewards = rewards.remove(&row.consensus_timestamp).unwrap_or_default();
                (
                    row.consensus_timestamp,
                    to_transaction(&row, &transfers, &rewards, self.staking_reward_account),
                )
            })
            .collect())
    }
}

#[async_trait]
impl TransactionRepository for PgTransactionRepository {
    async fn find_between(&self, start: i64, end: i64) -> Result<Vec<Transaction>, MirrorError> {
        if start > end {
            return Err(MirrorError::InvalidArgument);
        }

        let rows = self.fetch_transaction_rows(start, end).await?;
        let transactions = self.to_transactions(rows).await?;

        let missing = ErrataStore::global().missing_transactions_between(start, end);
        if !missing.is_empty() {
            debug!("Injecting {} curated missing transactions in [{start}, {end}]", missing.len());
        }

        Ok(merge_missing(transactions, missing))
    }

    async fn find_by_hash_in_block(
        &self,
        hash: &str,
        start: i64,
        end: i64,
    ) -> Result<Transaction, MirrorError> {
        let bare = hash.strip_prefix("0x").unwrap_or(hash);
        let prefixed = format!("0x{}", bare.to_lowercase());

        if let Some(missing) = ErrataStore::global().missing_transaction_by_hash(&prefixed) {
            if missing.consensus_timestamp >= start && missing.consensus_timestamp <= end {
                return Ok(missing.to_transaction());
            }
        }

        let hash_bytes = hex::decode(bare).map_err(|_| MirrorError::InvalidArgument)?;
        let row: Option<TransactionRow> = self
            .db
            .scoped(
                sqlx::query_as(&format!(
                    "{SELECT_TRANSACTION_COLUMNS} \
                     where transaction_hash = $1 \
                       and consensus_timestamp >= $2 and consensus_timestamp <= $3 \
                     order by consensus_timestamp limit 1"
                ))
                .bind(hash_bytes)
                .bind(start)
                .bind(end)
                .fetch_optional(self.db.pool()),
            )
            .await?;

        let row = row.ok_or(MirrorError::TransactionNotFound)?;
        let mut transactions = self.to_transactions(vec![row]).await?;
        Ok(transactions.remove(0).1)
    }
}

/// Interleave curated missing transactions into the timestamp-ordered list.
fn merge_missing(
    transactions: Vec<(i64, Transaction)>,
    missing: &[crate::errata::MissingTransaction],
) -> Vec<Transaction> {
    if missing.is_empty() {
        return transactions.into_iter().map(|(_, tx)| tx).collect();
    }

    let mut merged = transactions;
    for m in missing {
        let at = merged.partition_point(|(t, _)| *t <= m.consensus_timestamp);
        merged.insert(at, (m.consensus_timestamp, m.to_transaction()));
    }
    merged.into_iter().map(|(_, tx)| tx).collect()
}

/// Build the ordered operation list for one transaction row: fee legs first,
/// then the itemized transfer list, then staking reward payouts.
fn to_transaction(
    row: &TransactionRow,
    transfers: &[CryptoTransferRow],
    rewards: &[StakingRewardTransferRow],
    staking_reward_account: EntityId,
) -> Transaction {
    let status = transaction_result_name(row.result).unwrap_or("UNKNOWN");
    let op_type = transaction_type_name(row.transaction_type).unwrap_or("UNKNOWN");

    // total hbar movement per account, errata-deleted rows excluded
    let mut totals: BTreeMap<i64, i64> = BTreeMap::new();
    for transfer in transfers {
        if transfer.errata.as_deref() == Some(ERRATA_DELETE) {
            continue;
        }
        *totals.entry(transfer.entity_id.encoded()).or_default() += transfer.amount;
    }

    // everything the transfer list itemizes is not a fee
    let mut non_fee: BTreeMap<i64, i64> = BTreeMap::new();
    for item in row.itemized() {
        *non_fee.entry(item.entity_id.encoded()).or_default() += item.amount;
    }
    for reward in rewards {
        *non_fee.entry(reward.account_id.encoded()).or_default() += reward.amount;
        *non_fee.entry(staking_reward_account.encoded()).or_default() -= reward.amount;
    }

    let mut operations = Vec::new();
    for (&account, &total) in &totals {
        let fee = total - non_fee.get(&account).copied().unwrap_or(0);
        if fee != 0 {
            operations.push(
                Operation::new(
                    operations.len() as i64,
                    OPERATION_TYPE_FEE,
                    AccountId::from_entity_id(EntityId::from_encoded(account)),
                    Some(HbarAmount::new(fee)),
                )
                .with_status(status),
            );
        }
    }

    for item in row.itemized() {
        let mut operation = Operation::new(
            operations.len() as i64,
            op_type,
            AccountId::from_entity_id(item.entity_id),
            Some(HbarAmount::new(item.amount)),
        )
        .with_status(status);
        if item.is_approval {
            operation
                .metadata
                .insert("is_approval".to_string(), serde_json::Value::Bool(true));
        }
        operations.push(operation);
    }

    for reward in rewards {
        operations.push(
            Operation::new(
                operations.len() as i64,
                OPERATION_TYPE_CRYPTO_TRANSFER,
                AccountId::from_entity_id(reward.account_id),
                Some(HbarAmount::new(reward.amount)),
            )
            .with_status(status),
        );
        operations.push(
            Operation::new(
                operations.len() as i64,
                OPERATION_TYPE_CRYPTO_TRANSFER,
                AccountId::from_entity_id(staking_reward_account),
                Some(HbarAmount::new(-reward.amount)),
            )
            .with_status(status),
        );
    }

    Transaction {
        hash: format!("0x{}", hex::encode(&row.transaction_hash)),
        entity_id: row.entity_id.filter(|id| !id.is_zero()),
        memo: row.memo.clone(),
        operations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirror_domain::tables::ItemizedTransfer;
    use mirror_domain::transaction::transaction_type;

    fn transaction_row(
        timestamp: i64,
        tx_type: i16,
        result: i16,
        itemized: Vec<ItemizedTransfer>,
    ) -> TransactionRow {
        TransactionRow {
            consensus_timestamp: timestamp,
            charged_tx_fee: 100_000,
            entity_id: None,
            itemized_transfer: Some(sqlx::types::Json(itemized)),
            memo: Vec::new(),
            nonce: 0,
            payer_account_id: EntityId::from_encoded(1001),
            result,
            transaction_hash: vec![0xab; 48],
            transaction_type: tx_type,
            valid_start_ns: timestamp - 10,
        }
    }

    fn transfer(entity_id: i64, amount: i64) -> CryptoTransferRow {
        CryptoTransferRow {
            amount,
            consensus_timestamp: 100,
            entity_id: EntityId::from_encoded(entity_id),
            payer_account_id: EntityId::from_encoded(1001),
            errata: None,
        }
    }

    fn itemized(entity_id: i64, amount: i64) -> ItemizedTransfer {
        ItemizedTransfer {
            amount,
            entity_id: EntityId::from_encoded(entity_id),
            is_approval: false,
        }
    }

    fn reward_account() -> EntityId {
        EntityId::of(0, 0, 800).unwrap()
    }

    #[test]
    fn test_fee_operations_precede_itemized() {
        // payer 1001 sends 500 to 2002; fees go to node 3 and treasury 98
        let row = transaction_row(
            100,
            transaction_type::CRYPTO_TRANSFER,
            22,
            vec![itemized(1001, -500), itemized(2002, 500)],
        );
        let transfers = vec![
            transfer(1001, -500 - 100_000),
            transfer(2002, 500),
            transfer(3, 20_000),
            transfer(98, 80_000),
        ];

        let tx = to_transaction(&row, &transfers, &[], reward_account());

        assert_eq!(tx.hash, format!("0x{}", hex::encode(vec![0xab; 48])));
        assert_eq!(tx.operations.len(), 5);

        // dense indices
        for (i, op) in tx.operations.iter().enumerate() {
            assert_eq!(op.index, i as i64);
            assert_eq!(op.status.as_deref(), Some("SUCCESS"));
        }

        // fee legs first, ordered by account id
        assert_eq!(tx.operations[0].op_type, OPERATION_TYPE_FEE);
        assert_eq!(tx.operations[0].account_id.encoded(), 3);
        assert_eq!(tx.operations[0].amount.unwrap().value, 20_000);
        assert_eq!(tx.operations[1].account_id.encoded(), 98);
        assert_eq!(tx.operations[2].account_id.encoded(), 1001);
        assert_eq!(tx.operations[2].amount.unwrap().value, -100_000);

        // then the itemized transfers with the transaction's own type
        assert_eq!(tx.operations[3].op_type, "CRYPTOTRANSFER");
        assert_eq!(tx.operations[3].amount.unwrap().value, -500);
        assert_eq!(tx.operations[4].amount.unwrap().value, 500);

        // fee legs + itemized legs reproduce the full transfer sum
        let total: i64 = tx.operations.iter().filter_map(|op| op.amount).map(|a| a.value).sum();
        let expected: i64 = transfers.iter().map(|t| t.amount).sum();
        assert_eq!(total, expected);
    }

    #[test]
    fn test_errata_delete_rows_ignored() {
        let row = transaction_row(100, transaction_type::CRYPTO_TRANSFER, 22, vec![]);
        let mut deleted = transfer(5005, 999);
        deleted.errata = Some(ERRATA_DELETE.to_string());
        let transfers = vec![deleted, transfer(3, 7)];

        let tx = to_transaction(&row, &transfers, &[], reward_account());
        assert_eq!(tx.operations.len(), 1);
        assert_eq!(tx.operations[0].account_id.encoded(), 3);
    }

    #[test]
    fn test_failed_transaction_status() {
        // result 10 = INSUFFICIENT_PAYER_BALANCE; only fee legs exist
        let row = transaction_row(100, transaction_type::CRYPTO_TRANSFER, 10, vec![]);
        let transfers = vec![transfer(1001, -100_000), transfer(3, 100_000)];

        let tx = to_transaction(&row, &transfers, &[], reward_account());
        assert_eq!(tx.operations.len(), 2);
        assert!(tx
            .operations
            .iter()
            .all(|op| op.status.as_deref() == Some("INSUFFICIENT_PAYER_BALANCE")));
        assert!(tx.operations.iter().all(|op| op.op_type == OPERATION_TYPE_FEE));
    }

    #[test]
    fn test_staking_rewards_append_paired_operations() {
        let row = transaction_row(100, transaction_type::CRYPTO_TRANSFER, 22, vec![]);
        let rewards = vec![StakingRewardTransferRow {
            account_id: EntityId::from_encoded(7007),
            amount: 1_234,
            consensus_timestamp: 100,
            payer_account_id: EntityId::from_encoded(1001),
        }];
        // crypto_transfer carries the reward legs too
        let transfers = vec![transfer(7007, 1_234), transfer(800, -1_234)];

        let tx = to_transaction(&row, &transfers, &rewards, reward_account());

        // no fee ops: the reward legs are fully explained by the reward rows
        assert_eq!(tx.operations.len(), 2);
        assert_eq!(tx.operations[0].op_type, OPERATION_TYPE_CRYPTO_TRANSFER);
        assert_eq!(tx.operations[0].account_id.encoded(), 7007);
        assert_eq!(tx.operations[0].amount.unwrap().value, 1_234);
        assert_eq!(tx.operations[1].account_id.encoded(), reward_account().encoded());
        assert_eq!(tx.operations[1].amount.unwrap().value, -1_234);
    }

    #[test]
    fn test_is_approval_metadata() {
        let mut item = itemized(2002, 500);
        item.is_approval = true;
        let row = transaction_row(100, transaction_type::CRYPTO_TRANSFER, 22, vec![item]);
        let transfers = vec![transfer(2002, 500)];

        let tx = to_transaction(&row, &transfers, &[], reward_account());
        let op = tx.operations.last().unwrap();
        assert_eq!(op.metadata.get("is_approval"), Some(&serde_json::Value::Bool(true)));
    }

    #[test]
    fn test_merge_missing_interleaves_by_timestamp() {
        let store = ErrataStore::global();
        let missing = store.missing_transactions_between(i64::MIN, i64::MAX);
        assert!(!missing.is_empty());
        let pivot = missing[0].consensus_timestamp;

        let before = (pivot - 1, Transaction { hash: "0xbefore".into(), ..Default::default() });
        let after = (pivot + 1, Transaction { hash: "0xafter".into(), ..Default::default() });
        let merged = merge_missing(vec![before, after], &missing[..1]);

        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].hash, "0xbefore");
        assert_eq!(merged[1].hash, missing[0].hash);
        assert_eq!(merged[2].hash, "0xafter");
    }
}

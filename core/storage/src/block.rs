// core/storage/src/block.rs

use crate::db::DbClient;
use crate::BATCH_SIZE;
use async_trait::async_trait;
use mirror_domain::tables::{AccountBalanceRow, RecordFileRow};
use mirror_domain::transaction::{
    Operation, Transaction, OPERATION_TYPE_CRYPTO_TRANSFER, STATUS_SUCCESS,
};
use mirror_domain::{AccountId, Block, EntityId, HbarAmount, MirrorError};
use sha3::{Digest, Sha3_384};
use std::sync::OnceLock;
use tokio::sync::Mutex;
use tracing::{debug, info};

const SELECT_RECORD_FILE_COLUMNS: &str =
    "select consensus_start, consensus_end, hash, index, prev_hash from record_file";

/// Read access to record-file-derived blocks, including the synthesized
/// genesis block at index 0.
#[async_trait]
pub trait BlockRepository: Send + Sync {
    async fn find_by_hash(&self, hash: &str) -> Result<Block, MirrorError>;

    async fn find_by_index(&self, index: i64) -> Result<Block, MirrorError>;

    /// Both the index and the hash must resolve to the same block.
    async fn find_by_identifier(&self, index: i64, hash: &str) -> Result<Block, MirrorError>;

    async fn retrieve_genesis(&self) -> Result<Block, MirrorError>;

    /// The synthetic opening-balance transaction list of the genesis block.
    async fn retrieve_genesis_transactions(&self) -> Result<Vec<Transaction>, MirrorError>;

    /// The second-to-latest record block. The most recent record file may
    /// still be getting its balance info written by the importer, so it stays
    /// hidden until the next one lands.
    async fn retrieve_latest(&self) -> Result<Block, MirrorError>;
}

/// Genesis metadata resolved once from the database.
#[derive(Debug, Clone)]
struct GenesisInfo {
    account_balance_timestamp: i64,
    /// Adjusted consensus start of the first real record file.
    consensus_start: i64,
    /// Database index of the first record file after the genesis snapshot.
    record_file_index: i64,
    /// The synthesized block at Rosetta index 0.
    block: RecordFileRow,
}

pub struct PgBlockRepository {
    db: DbClient,
    treasury: EntityId,
    genesis: OnceLock<GenesisInfo>,
    genesis_init: Mutex<()>,
    genesis_transactions: OnceLock<Vec<Transaction>>,
    genesis_transactions_init: Mutex<()>,
}

impl PgBlockRepository {
    pub fn new(db: DbClient, treasury: EntityId) -> Self {
        Self {
            db,
            treasury,
            genesis: OnceLock::new(),
            genesis_init: Mutex::new(()),
            genesis_transactions: OnceLock::new(),
            genesis_transactions_init: Mutex::new(()),
        }
    }

    /// One-shot genesis discovery: lock-free fast path, mutex + double-check
    /// slow path. Concurrent first callers all observe the same resolved
    /// state once the guard releases.
    async fn genesis(&self) -> Result<&GenesisInfo, MirrorError> {
        if let Some(info) = self.genesis.get() {
            return Ok(info);
        }

        let _guard = self.genesis_init.lock().await;
        if let Some(info) = self.genesis.get() {
            return Ok(info);
        }

        let info = self.load_genesis().await?;
        info!(
            "Fetched genesis info, account balance timestamp {}, record file index {}, consensus start {}",
            info.account_balance_timestamp, info.record_file_index, info.consensus_start
        );
        Ok(self.genesis.get_or_init(|| info))
    }

    async fn load_genesis(&self) -> Result<GenesisInfo, MirrorError> {
        let timestamp: Option<i64> = self
            .db
            .scoped(
                sqlx::query_scalar(
                    "select consensus_timestamp from account_balance \
                     where account_id = $1 order by consensus_timestamp limit 1",
                )
                .bind(self.treasury)
                .fetch_optional(self.db.pool()),
            )
            .await?;

        let timestamp = match timestamp {
            Some(t) if t > 0 => t,
            _ => {
                debug!("No genesis account balance snapshot yet, node is starting");
                return Err(MirrorError::NodeStarting);
            }
        };

        let first: Option<RecordFileRow> = self
            .db
            .scoped(
                sqlx::query_as(&format!(
                    "{SELECT_RECORD_FILE_COLUMNS} where consensus_end > $1 \
                     order by consensus_end limit 1"
                ))
                .bind(timestamp)
                .fetch_optional(self.db.pool()),
            )
            .await?;

        let mut first = first.ok_or(MirrorError::NodeStarting)?;
        if first.consensus_start <= timestamp {
            first.consensus_start = timestamp + 1;
        }

        let hash = genesis_block_hash(timestamp);
        Ok(GenesisInfo {
            account_balance_timestamp: timestamp,
            consensus_start: first.consensus_start,
            record_file_index: first.index,
            block: RecordFileRow {
                consensus_start: timestamp,
                consensus_end: timestamp,
                hash: hash.clone(),
                index: first.index - 1,
                prev_hash: hash,
            },
        })
    }

    async fn find_record_file_by_index(&self, db_index: i64) -> Result<RecordFileRow, MirrorError> {
        let row: Option<RecordFileRow> = self
            .db
            .scoped(
                sqlx::query_as(&format!("{SELECT_RECORD_FILE_COLUMNS} where index = $1"))
                    .bind(db_index)
                    .fetch_optional(self.db.pool()),
            )
            .await?;
        row.ok_or(MirrorError::BlockNotFound)
    }

    async fn load_genesis_transactions(
        &self,
        genesis: &GenesisInfo,
    ) -> Result<Vec<Transaction>, MirrorError> {
        let mut operations = Vec::new();
        let mut last_account_id = 0i64;

        loop {
            let batch: Vec<AccountBalanceRow> = self
                .db
                .scoped(
                    sqlx::query_as(
                        "select account_id, balance, consensus_timestamp from account_balance \
                         where balance <> 0 and account_id > $1 and consensus_timestamp = $2 \
                         order by account_id limit $3",
                    )
                    .bind(last_account_id)
                    .bind(genesis.account_balance_timestamp)
                    .bind(BATCH_SIZE)
                    .fetch_all(self.db.pool()),
                )
                .await?;

            for row in &batch {
                operations.push(
                    Operation::new(
                        operations.len() as i64,
                        OPERATION_TYPE_CRYPTO_TRANSFER,
                        AccountId::from_entity_id(row.account_id),
                        Some(HbarAmount::new(row.balance)),
                    )
                    .with_status(STATUS_SUCCESS),
                );
            }

            if batch.len() < BATCH_SIZE as usize {
                break;
            }
            last_account_id = batch[batch.len() - 1].account_id.encoded();
        }

        info!("Retrieved {} non-zero genesis account balances", operations.len());
        Ok(vec![Transaction {
            hash: genesis_transactions_hash(genesis.account_balance_timestamp),
            entity_id: None,
            memo: Vec::new(),
            operations,
        }])
    }
}

#[async_trait]
impl BlockRepository for PgBlockRepository {
    async fn find_by_hash(&self, hash: &str) -> Result<Block, MirrorError> {
        if hash.is_empty() {
            return Err(MirrorError::InvalidArgument);
        }

        let genesis = self.genesis().await?;
        let row = if hash == genesis.block.hash {
            genesis.block.clone()
        } else {
            let row: Option<RecordFileRow> = self
                .db
                .scoped(
                    sqlx::query_as(&format!("{SELECT_RECORD_FILE_COLUMNS} where hash = $1"))
                        .bind(hash)
                        .fetch_optional(self.db.pool()),
                )
                .await?;
            row.ok_or(MirrorError::BlockNotFound)?
        };

        Ok(to_block(&row, genesis.consensus_start, genesis.record_file_index, &genesis.block.hash))
    }

    async fn find_by_index(&self, index: i64) -> Result<Block, MirrorError> {
        if index < 0 {
            return Err(MirrorError::InvalidArgument);
        }

        let genesis = self.genesis().await?;
        let row = if index == 0 {
            genesis.block.clone()
        } else {
            self.find_record_file_by_index(genesis.record_file_index + index - 1).await?
        };

        Ok(to_block(&row, genesis.consensus_start, genesis.record_file_index, &genesis.block.hash))
    }

    async fn find_by_identifier(&self, index: i64, hash: &str) -> Result<Block, MirrorError> {
        if index < 0 || hash.is_empty() {
            return Err(MirrorError::InvalidArgument);
        }

        let block = self.find_by_hash(hash).await?;
        if block.index != index {
            return Err(MirrorError::BlockNotFound);
        }

        Ok(block)
    }

    async fn retrieve_genesis(&self) -> Result<Block, MirrorError> {
        self.find_by_index(0).await
    }

    async fn retrieve_genesis_transactions(&self) -> Result<Vec<Transaction>, MirrorError> {
        let genesis = self.genesis().await?.clone();

        if let Some(transactions) = self.genesis_transactions.get() {
            return Ok(transactions.clone());
        }

        let _guard = self.genesis_transactions_init.lock().await;
        if let Some(transactions) = self.genesis_transactions.get() {
            return Ok(transactions.clone());
        }

        let transactions = self.load_genesis_transactions(&genesis).await?;
        Ok(self.genesis_transactions.get_or_init(|| transactions).clone())
    }

    async fn retrieve_latest(&self) -> Result<Block, MirrorError> {
        let genesis = self.genesis().await?;

        // skip the most recent record file; `offset 1` lands on the
        // second-to-latest one
        let row: Option<RecordFileRow> = self
            .db
            .scoped(
                sqlx::query_as(&format!(
                    "{SELECT_RECORD_FILE_COLUMNS} order by index desc limit 1 offset 1"
                ))
                .fetch_optional(self.db.pool()),
            )
            .await?;

        let row = row.ok_or(MirrorError::BlockNotFound)?;
        if row.index < genesis.record_file_index {
            return Err(MirrorError::BlockNotFound);
        }

        Ok(to_block(&row, genesis.consensus_start, genesis.record_file_index, &genesis.block.hash))
    }
}

/// Map a record file row into the Rosetta block numbering, where the first
/// real record file sits at index 1 behind the synthesized genesis block.
fn to_block(
    row: &RecordFileRow,
    genesis_consensus_start: i64,
    genesis_record_index: i64,
    genesis_hash: &str,
) -> Block {
    let index = row.index - genesis_record_index + 1;
    let mut consensus_start = row.consensus_start;
    let mut parent_index = index - 1;
    let mut parent_hash = row.prev_hash.clone();

    if parent_index == 0 {
        // the first record block is anchored to the synthesized genesis block
        consensus_start = genesis_consensus_start;
        parent_hash = genesis_hash.to_string();
    } else if parent_index < 0 {
        parent_index = 0;
    }

    Block {
        index,
        hash: row.hash.clone(),
        parent_index,
        parent_hash,
        consensus_start_ns: consensus_start,
        consensus_end_ns: row.consensus_end,
        transactions: Vec::new(),
    }
}

/// SHA3-384 of the little-endian genesis snapshot timestamp, lowercase hex.
pub fn genesis_block_hash(timestamp: i64) -> String {
    let mut hasher = Sha3_384::new();
    hasher.update((timestamp as u64).to_le_bytes());
    hex::encode(hasher.finalize())
}

/// Hash of the synthetic opening-balance transaction, `0x`-prefixed.
pub fn genesis_transactions_hash(timestamp: i64) -> String {
    let mut hasher = Sha3_384::new();
    hasher.update((timestamp as u64).to_le_bytes());
    hasher.update(b"transactions");
    format!("0x{}", hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_file(index: i64, start: i64, end: i64) -> RecordFileRow {
        RecordFileRow {
            consensus_start: start,
            consensus_end: end,
            hash: format!("hash-{index}"),
            index,
            prev_hash: format!("hash-{}", index - 1),
        }
    }

    #[test]
    fn test_genesis_block_hash_depends_on_timestamp() {
        let a = genesis_block_hash(1_000);
        let b = genesis_block_hash(1_001);
        assert_ne!(a, b);
        // sha3-384 digest is 48 bytes
        assert_eq!(a.len(), 96);
        assert!(!a.starts_with("0x"));
    }

    #[test]
    fn test_genesis_transactions_hash_differs_from_block_hash() {
        let t = 1_600_000_000_000_000_000;
        assert_ne!(genesis_transactions_hash(t), format!("0x{}", genesis_block_hash(t)));
        assert!(genesis_transactions_hash(t).starts_with("0x"));
    }

    #[test]
    fn test_to_block_index_mapping() {
        let genesis_hash = genesis_block_hash(90);
        // db index 7 is the first real record file
        let block = to_block(&record_file(10, 400, 500), 100, 7, &genesis_hash);
        assert_eq!(block.index, 4);
        assert_eq!(block.parent_index, 3);
        assert_eq!(block.parent_hash, "hash-9");
        assert_eq!(block.consensus_start_ns, 400);
        assert_eq!(block.consensus_end_ns, 500);
    }

    #[test]
    fn test_to_block_first_record_file_links_to_genesis() {
        let genesis_hash = genesis_block_hash(90);
        let block = to_block(&record_file(7, 101, 200), 100, 7, &genesis_hash);
        assert_eq!(block.index, 1);
        assert_eq!(block.parent_index, 0);
        assert_eq!(block.parent_hash, genesis_hash);
        // consensus start is pulled back to the adjusted genesis start
        assert_eq!(block.consensus_start_ns, 100);
    }

    #[test]
    fn test_to_block_clamps_negative_parent_index() {
        let genesis_hash = genesis_block_hash(90);
        let row = RecordFileRow {
            consensus_start: 90,
            consensus_end: 95,
            hash: "genesis".to_string(),
            index: 6,
            prev_hash: "none".to_string(),
        };
        let block = to_block(&row, 100, 7, &genesis_hash);
        assert_eq!(block.index, 0);
        assert_eq!(block.parent_index, 0);
    }

    #[test]
    fn test_synthesized_genesis_identity() {
        // the synthesized row must satisfy hash == parent_hash and
        // consensus_start == consensus_end == genesis timestamp
        let timestamp = 1_600_000_000_000_000_000;
        let hash = genesis_block_hash(timestamp);
        let row = RecordFileRow {
            consensus_start: timestamp,
            consensus_end: timestamp,
            hash: hash.clone(),
            index: 6,
            prev_hash: hash.clone(),
        };
        let block = to_block(&row, timestamp + 1, 7, &hash);
        assert_eq!(block.index, 0);
        assert_eq!(block.hash, block.parent_hash);
        assert_eq!(block.consensus_start_ns, timestamp);
        assert_eq!(block.consensus_end_ns, timestamp);
    }
}

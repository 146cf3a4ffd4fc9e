//! Curated corrections for known historical inaccuracies in the mirrored
//! ledger: balance files written with a skewed consensus timestamp, and
//! transactions the early ingestion pipeline dropped.
//!
//! Both lists are embedded in the binary and loaded once; malformed data is a
//! build artifact problem, so the loader panics rather than limping along.

use mirror_domain::entity_id::EntityId;
use mirror_domain::transaction::{
    Operation, Transaction, OPERATION_TYPE_CRYPTO_TRANSFER, STATUS_SUCCESS,
};
use mirror_domain::{AccountId, HbarAmount};
use serde::Deserialize;
use sha2::{Digest, Sha384};
use std::collections::HashMap;
use std::sync::OnceLock;

const SKEWED_TIMESTAMPS: &str = include_str!("../data/skewed_account_balance_timestamps.txt");
const MISSING_TRANSACTIONS: &str = include_str!("../data/missing_transactions.json");

#[derive(Debug, Clone, Deserialize)]
struct MissingTransferRecord {
    entity_id: EntityId,
    amount: i64,
}

#[derive(Debug, Clone, Deserialize)]
struct MissingTransactionRecord {
    consensus_timestamp: i64,
    payer_account_id: EntityId,
    transfers: Vec<MissingTransferRecord>,
}

/// A transaction absent from the mirror, reconstructed from the curated list.
#[derive(Debug, Clone)]
pub struct MissingTransaction {
    pub consensus_timestamp: i64,
    pub payer_account_id: EntityId,
    /// `0x`-prefixed hex of the synthesized hash.
    pub hash: String,
    pub transfers: Vec<(EntityId, i64)>,
}

impl MissingTransaction {
    /// Render the record as a domain transaction with successful
    /// crypto-transfer operations.
    pub fn to_transaction(&self) -> Transaction {
        let operations = self
            .transfers
            .iter()
            .enumerate()
            .map(|(index, (entity_id, amount))| {
                Operation::new(
                    index as i64,
                    OPERATION_TYPE_CRYPTO_TRANSFER,
                    AccountId::from_entity_id(*entity_id),
                    Some(HbarAmount::new(*amount)),
                )
                .with_status(STATUS_SUCCESS)
            })
            .collect();

        Transaction {
            hash: self.hash.clone(),
            entity_id: None,
            memo: Vec::new(),
            operations,
        }
    }
}

/// Immutable process-wide errata state.
pub struct ErrataStore {
    /// Sorted for binary search; ~thousands of entries stay cache-friendly.
    skewed_timestamps: Vec<i64>,
    missing: Vec<MissingTransaction>,
    missing_by_hash: HashMap<String, usize>,
}

impl ErrataStore {
    /// The shared instance, parsed on first access.
    pub fn global() -> &'static ErrataStore {
        static STORE: OnceLock<ErrataStore> = OnceLock::new();
        STORE.get_or_init(Self::load)
    }

    fn load() -> Self {
        let mut skewed_timestamps: Vec<i64> = SKEWED_TIMESTAMPS
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                line.trim()
                    .parse::<i64>()
                    .unwrap_or_else(|err| panic!("Bad skewed timestamp entry '{line}': {err}"))
            })
            .collect();
        skewed_timestamps.sort_unstable();

        let records: Vec<MissingTransactionRecord> = serde_json::from_str(MISSING_TRANSACTIONS)
            .unwrap_or_else(|err| panic!("Bad missing transaction data: {err}"));

        let mut missing: Vec<MissingTransaction> = records
            .into_iter()
            .map(|record| MissingTransaction {
                consensus_timestamp: record.consensus_timestamp,
                payer_account_id: record.payer_account_id,
                hash: synthesize_hash(record.consensus_timestamp, record.payer_account_id),
                transfers: record
                    .transfers
                    .into_iter()
                    .map(|t| (t.entity_id, t.amount))
                    .collect(),
            })
            .collect();
        missing.sort_by_key(|tx| tx.consensus_timestamp);

        let missing_by_hash = missing
            .iter()
            .enumerate()
            .map(|(i, tx)| (tx.hash.clone(), i))
            .collect();

        Self {
            skewed_timestamps,
            missing,
            missing_by_hash,
        }
    }

    /// Whether a balance snapshot at this exact timestamp is known to exclude
    /// the balance changes of the transaction sharing its timestamp.
    pub fn is_account_balance_file_skewed(&self, timestamp: i64) -> bool {
        self.skewed_timestamps.binary_search(&timestamp).is_ok()
    }

    /// Missing transactions with `consensus_timestamp` in `[start, end]`, in
    /// timestamp order.
    pub fn missing_transactions_between(&self, start: i64, end: i64) -> &[MissingTransaction] {
        let from = self.missing.partition_point(|tx| tx.consensus_timestamp < start);
        let to = self.missing.partition_point(|tx| tx.consensus_timestamp <= end);
        &self.missing[from..to]
    }

    pub fn missing_transaction_by_hash(&self, hash: &str) -> Option<&MissingTransaction> {
        self.missing_by_hash.get(hash).map(|&i| &self.missing[i])
    }
}

/// Deterministic stand-in hash for a transaction the ledger never recorded,
/// derived from the pair that identifies it.
fn synthesize_hash(consensus_timestamp: i64, payer: EntityId) -> String {
    let mut hasher = Sha384::new();
    hasher.update(consensus_timestamp.to_le_bytes());
    hasher.update(payer.encoded().to_le_bytes());
    format!("0x{}", hex::encode(hasher.finalize()))
}

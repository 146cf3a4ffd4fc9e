//! Row bindings for the mirror schema tables the server reads.
//!
//! Every struct maps one query result shape; the ingestion pipeline owns the
//! schema and all rows are immutable from this side.

use crate::entity_id::EntityId;
use serde::{Deserialize, Serialize};
use sqlx::postgres::types::PgRange;
use sqlx::postgres::{PgArgumentBuffer, PgTypeInfo, PgValueRef};
use sqlx::{FromRow, Postgres};
use std::ops::Bound;

impl sqlx::Type<Postgres> for EntityId {
    fn type_info() -> PgTypeInfo {
        <i64 as sqlx::Type<Postgres>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, Postgres> for EntityId {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        Ok(EntityId::from_encoded(<i64 as sqlx::Decode<Postgres>>::decode(value)?))
    }
}

impl<'q> sqlx::Encode<'q, Postgres> for EntityId {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> sqlx::encode::IsNull {
        <i64 as sqlx::Encode<Postgres>>::encode_by_ref(&self.encoded(), buf)
    }
}

/// A row of `entity` or `entity_history`.
#[derive(Debug, Clone, FromRow)]
pub struct EntityRow {
    pub id: EntityId,
    pub alias: Option<Vec<u8>>,
    pub deleted: Option<bool>,
    pub key: Option<Vec<u8>>,
    pub timestamp_range: PgRange<i64>,
}

impl EntityRow {
    /// Lower bound of the row's validity range, i.e. when it was last modified.
    pub fn modified_timestamp(&self) -> i64 {
        match self.timestamp_range.start {
            Bound::Included(t) => t,
            Bound::Excluded(t) => t + 1,
            Bound::Unbounded => 0,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.unwrap_or(false)
    }
}

/// A row of the `account_balance` snapshot table.
#[derive(Debug, Clone, Copy, FromRow)]
pub struct AccountBalanceRow {
    pub account_id: EntityId,
    pub consensus_timestamp: i64,
    pub balance: i64,
}

/// Errata marker on `crypto_transfer` rows; `DELETE` rows must be ignored
/// when reconstructing balances.
pub const ERRATA_DELETE: &str = "DELETE";
pub const ERRATA_INSERT: &str = "INSERT";

/// A row of `crypto_transfer`.
#[derive(Debug, Clone, FromRow)]
pub struct CryptoTransferRow {
    pub amount: i64,
    pub consensus_timestamp: i64,
    pub entity_id: EntityId,
    pub payer_account_id: EntityId,
    pub errata: Option<String>,
}

/// One leg of a transaction's itemized transfer list (JSONB column).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ItemizedTransfer {
    pub amount: i64,
    pub entity_id: EntityId,
    #[serde(default)]
    pub is_approval: bool,
}

/// A row of `transaction`.
#[derive(Debug, Clone, FromRow)]
pub struct TransactionRow {
    pub consensus_timestamp: i64,
    pub charged_tx_fee: i64,
    pub entity_id: Option<EntityId>,
    pub itemized_transfer: Option<sqlx::types::Json<Vec<ItemizedTransfer>>>,
    pub memo: Vec<u8>,
    pub nonce: i32,
    pub payer_account_id: EntityId,
    pub result: i16,
    pub transaction_hash: Vec<u8>,
    #[sqlx(rename = "type")]
    pub transaction_type: i16,
    pub valid_start_ns: i64,
}

impl TransactionRow {
    pub fn itemized(&self) -> &[ItemizedTransfer] {
        self.itemized_transfer.as_ref().map(|j| j.0.as_slice()).unwrap_or(&[])
    }
}

/// A row of `record_file`; one sealed batch of consensus-ordered transactions.
#[derive(Debug, Clone, FromRow, Default, PartialEq)]
pub struct RecordFileRow {
    pub consensus_start: i64,
    pub consensus_end: i64,
    pub hash: String,
    pub index: i64,
    pub prev_hash: String,
}

/// A row of `staking_reward_transfer`; a reward paid out of the staking
/// reward account alongside the triggering transaction.
#[derive(Debug, Clone, Copy, FromRow)]
pub struct StakingRewardTransferRow {
    pub account_id: EntityId,
    pub amount: i64,
    pub consensus_timestamp: i64,
    pub payer_account_id: EntityId,
}

/// Aggregated address-book node row: endpoints come back comma-joined,
/// already sorted by (ip, port).
#[derive(Debug, Clone, FromRow)]
pub struct NodeServiceEndpointRow {
    pub node_id: i64,
    pub node_account_id: EntityId,
    pub endpoints: Option<String>,
}

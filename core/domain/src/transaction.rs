use crate::account_id::AccountId;
use crate::amount::HbarAmount;
use crate::entity_id::EntityId;
use std::collections::BTreeMap;

/// Operation type emitted for fee distribution legs.
pub const OPERATION_TYPE_FEE: &str = "FEE";
pub const OPERATION_TYPE_CRYPTO_CREATE_ACCOUNT: &str = "CRYPTOCREATEACCOUNT";
pub const OPERATION_TYPE_CRYPTO_TRANSFER: &str = "CRYPTOTRANSFER";

/// Status string of every successful operation.
pub const STATUS_SUCCESS: &str = "SUCCESS";

/// A single balance-affecting operation within a transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub index: i64,
    pub op_type: String,
    pub status: Option<String>,
    pub account_id: AccountId,
    pub amount: Option<HbarAmount>,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Operation {
    pub fn new(index: i64, op_type: &str, account_id: AccountId, amount: Option<HbarAmount>) -> Self {
        Self {
            index,
            op_type: op_type.to_string(),
            status: None,
            account_id,
            amount,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_status(mut self, status: &str) -> Self {
        self.status = Some(status.to_string());
        self
    }
}

/// A ledger transaction resolved to its Rosetta-facing shape.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Transaction {
    /// `0x`-prefixed lowercase hex of the transaction hash.
    pub hash: String,
    pub entity_id: Option<EntityId>,
    pub memo: Vec<u8>,
    pub operations: Vec<Operation>,
}

/// Native transaction type codes as persisted in the `transaction.type` column.
pub mod transaction_type {
    pub const CONTRACT_CALL: i16 = 7;
    pub const CONTRACT_CREATE: i16 = 8;
    pub const CONTRACT_DELETE: i16 = 9;
    pub const CRYPTO_ADD_LIVE_HASH: i16 = 10;
    pub const CRYPTO_CREATE_ACCOUNT: i16 = 11;
    pub const CRYPTO_DELETE: i16 = 12;
    pub const CRYPTO_TRANSFER: i16 = 14;
    pub const CRYPTO_UPDATE_ACCOUNT: i16 = 15;
    pub const FILE_APPEND: i16 = 16;
    pub const FILE_CREATE: i16 = 17;
    pub const FILE_DELETE: i16 = 18;
    pub const FILE_UPDATE: i16 = 19;
    pub const SYSTEM_DELETE: i16 = 20;
    pub const SYSTEM_UNDELETE: i16 = 21;
    pub const FREEZE: i16 = 22;
    pub const CONSENSUS_CREATE_TOPIC: i16 = 24;
    pub const CONSENSUS_UPDATE_TOPIC: i16 = 25;
    pub const CONSENSUS_DELETE_TOPIC: i16 = 26;
    pub const CONSENSUS_SUBMIT_MESSAGE: i16 = 27;
    pub const UNCHECKED_SUBMIT: i16 = 28;
    pub const TOKEN_CREATION: i16 = 29;
    pub const TOKEN_FREEZE: i16 = 31;
    pub const TOKEN_UNFREEZE: i16 = 32;
    pub const TOKEN_GRANT_KYC: i16 = 33;
    pub const TOKEN_REVOKE_KYC: i16 = 34;
    pub const TOKEN_DELETION: i16 = 35;
    pub const TOKEN_UPDATE: i16 = 36;
    pub const TOKEN_MINT: i16 = 37;
    pub const TOKEN_BURN: i16 = 38;
    pub const TOKEN_WIPE: i16 = 39;
    pub const TOKEN_ASSOCIATE: i16 = 40;
    pub const TOKEN_DISSOCIATE: i16 = 41;
    pub const SCHEDULE_CREATE: i16 = 42;
    pub const SCHEDULE_DELETE: i16 = 43;
    pub const SCHEDULE_SIGN: i16 = 44;
    pub const ETHEREUM_TRANSACTION: i16 = 50;
    pub const NODE_STAKE_UPDATE: i16 = 51;
    pub const UTIL_PRNG: i16 = 52;
}

/// Name table for transaction types, used as Rosetta operation types.
pub fn transaction_types() -> &'static BTreeMap<i16, &'static str> {
    use transaction_type::*;
    static TYPES: std::sync::OnceLock<BTreeMap<i16, &'static str>> = std::sync::OnceLock::new();
    TYPES.get_or_init(|| {
        BTreeMap::from([
            (CONTRACT_CALL, "CONTRACTCALL"),
            (CONTRACT_CREATE, "CONTRACTCREATEINSTANCE"),
            (CONTRACT_DELETE, "CONTRACTDELETEINSTANCE"),
            (CRYPTO_ADD_LIVE_HASH, "CRYPTOADDLIVEHASH"),
            (CRYPTO_CREATE_ACCOUNT, "CRYPTOCREATEACCOUNT"),
            (CRYPTO_DELETE, "CRYPTODELETE"),
            (CRYPTO_TRANSFER, "CRYPTOTRANSFER"),
            (CRYPTO_UPDATE_ACCOUNT, "CRYPTOUPDATEACCOUNT"),
            (FILE_APPEND, "FILEAPPEND"),
            (FILE_CREATE, "FILECREATE"),
            (FILE_DELETE, "FILEDELETE"),
            (FILE_UPDATE, "FILEUPDATE"),
            (SYSTEM_DELETE, "SYSTEMDELETE"),
            (SYSTEM_UNDELETE, "SYSTEMUNDELETE"),
            (FREEZE, "FREEZE"),
            (CONSENSUS_CREATE_TOPIC, "CONSENSUSCREATETOPIC"),
            (CONSENSUS_UPDATE_TOPIC, "CONSENSUSUPDATETOPIC"),
            (CONSENSUS_DELETE_TOPIC, "CONSENSUSDELETETOPIC"),
            (CONSENSUS_SUBMIT_MESSAGE, "CONSENSUSSUBMITMESSAGE"),
            (UNCHECKED_SUBMIT, "UNCHECKEDSUBMIT"),
            (TOKEN_CREATION, "TOKENCREATION"),
            (TOKEN_FREEZE, "TOKENFREEZE"),
            (TOKEN_UNFREEZE, "TOKENUNFREEZE"),
            (TOKEN_GRANT_KYC, "TOKENGRANTKYC"),
            (TOKEN_REVOKE_KYC, "TOKENREVOKEKYC"),
            (TOKEN_DELETION, "TOKENDELETION"),
            (TOKEN_UPDATE, "TOKENUPDATE"),
            (TOKEN_MINT, "TOKENMINT"),
            (TOKEN_BURN, "TOKENBURN"),
            (TOKEN_WIPE, "TOKENWIPE"),
            (TOKEN_ASSOCIATE, "TOKENASSOCIATE"),
            (TOKEN_DISSOCIATE, "TOKENDISSOCIATE"),
            (SCHEDULE_CREATE, "SCHEDULECREATE"),
            (SCHEDULE_DELETE, "SCHEDULEDELETE"),
            (SCHEDULE_SIGN, "SCHEDULESIGN"),
            (ETHEREUM_TRANSACTION, "ETHEREUMTRANSACTION"),
            (NODE_STAKE_UPDATE, "NODESTAKEUPDATE"),
            (UTIL_PRNG, "UTILPRNG"),
        ])
    })
}

pub fn transaction_type_name(code: i16) -> Option<&'static str> {
    transaction_types().get(&code).copied()
}

/// Result codes that count as a successful transaction.
const SUCCESSFUL_RESULTS: [i16; 3] = [22, 104, 220];

pub fn is_successful_result(result: i16) -> bool {
    SUCCESSFUL_RESULTS.contains(&result)
}

/// Name table for transaction results, advertised as operation statuses.
pub fn transaction_results() -> &'static BTreeMap<i16, &'static str> {
    static RESULTS: std::sync::OnceLock<BTreeMap<i16, &'static str>> = std::sync::OnceLock::new();
    RESULTS.get_or_init(|| {
        BTreeMap::from([
            (0, "OK"),
            (1, "INVALID_TRANSACTION"),
            (2, "PAYER_ACCOUNT_NOT_FOUND"),
            (3, "INVALID_NODE_ACCOUNT"),
            (4, "TRANSACTION_EXPIRED"),
            (5, "INVALID_TRANSACTION_START"),
            (6, "INVALID_TRANSACTION_DURATION"),
            (7, "INVALID_SIGNATURE"),
            (8, "MEMO_TOO_LONG"),
            (9, "INSUFFICIENT_TX_FEE"),
            (10, "INSUFFICIENT_PAYER_BALANCE"),
            (11, "DUPLICATE_TRANSACTION"),
            (12, "BUSY"),
            (13, "NOT_SUPPORTED"),
            (14, "INVALID_FILE_ID"),
            (15, "INVALID_ACCOUNT_ID"),
            (16, "INVALID_CONTRACT_ID"),
            (17, "INVALID_TRANSACTION_ID"),
            (18, "RECEIPT_NOT_FOUND"),
            (19, "RESULT_SIZE_LIMIT_EXCEEDED"),
            (20, "UNKNOWN"),
            (21, "SUCCESS_BUT_MISSING_EXPECTED_OPERATION"),
            (22, "SUCCESS"),
            (23, "FAIL_INVALID"),
            (24, "FAIL_FEE"),
            (25, "FAIL_BALANCE"),
            (26, "KEY_REQUIRED"),
            (27, "BAD_ENCODING"),
            (28, "INSUFFICIENT_ACCOUNT_BALANCE"),
            (30, "INVALID_SOLIDITY_ADDRESS"),
            (50, "INVALID_RECEIVING_NODE_ACCOUNT"),
            (62, "ACCOUNT_REPEATED_IN_ACCOUNT_AMOUNTS"),
            (63, "ACCOUNT_ID_DOES_NOT_EXIST"),
            (72, "ACCOUNT_DELETED"),
            (104, "FEE_SCHEDULE_FILE_PART_UPLOADED"),
            (220, "SUCCESS_BUT_MISSED_RECORD"),
        ])
    })
}

pub fn transaction_result_name(code: i16) -> Option<&'static str> {
    transaction_results().get(&code).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity_id::EntityId;

    #[test]
    fn test_type_names() {
        assert_eq!(transaction_type_name(11), Some("CRYPTOCREATEACCOUNT"));
        assert_eq!(transaction_type_name(14), Some("CRYPTOTRANSFER"));
        assert_eq!(transaction_type_name(-1), None);
    }

    #[test]
    fn test_successful_results() {
        assert!(is_successful_result(22));
        assert!(is_successful_result(104));
        assert!(is_successful_result(220));
        assert!(!is_successful_result(10));
        assert!(!is_successful_result(23));
    }

    #[test]
    fn test_operation_builder() {
        let account = AccountId::from_entity_id(EntityId::of(0, 0, 98).unwrap());
        let op = Operation::new(0, OPERATION_TYPE_FEE, account, Some(HbarAmount::new(-5)))
            .with_status(STATUS_SUCCESS);
        assert_eq!(op.index, 0);
        assert_eq!(op.op_type, "FEE");
        assert_eq!(op.status.as_deref(), Some("SUCCESS"));
        assert_eq!(op.amount.unwrap().value, -5);
    }
}

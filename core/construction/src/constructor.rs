use crate::create::CryptoCreateConstructor;
use crate::native::NativeTransaction;
use crate::transfer::CryptoTransferConstructor;
use mirror_domain::transaction::Operation;
use mirror_domain::{AccountId, EntityId, HbarAmount, MirrorError};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::error;

/// One registered transaction kind: validates, builds and parses transactions
/// for a single Rosetta operation type.
pub trait TransactionConstructor: Send + Sync {
    /// Build an unsigned, frozen transaction from validated operations,
    /// returning the accounts that must sign it.
    fn construct(
        &self,
        node_account_id: EntityId,
        operations: &[Operation],
    ) -> Result<(NativeTransaction, Vec<AccountId>), MirrorError>;

    /// Inverse of construct up to operation ordering.
    fn parse(
        &self,
        transaction: &NativeTransaction,
    ) -> Result<(Vec<Operation>, Vec<AccountId>), MirrorError>;

    /// Derive the required signer set without building anything.
    fn preprocess(&self, operations: &[Operation]) -> Result<Vec<AccountId>, MirrorError>;

    fn default_max_transaction_fee(&self) -> HbarAmount;

    /// Rosetta operation type this constructor accepts.
    fn operation_type(&self) -> &'static str;

    /// Native transaction type name this constructor parses.
    fn transaction_type(&self) -> &'static str;
}

/// The closed constructor registry, indexed both ways: by operation type for
/// preprocess/construct and by native transaction type name for parse.
pub struct CompositeTransactionConstructor {
    by_operation_type: HashMap<&'static str, Arc<dyn TransactionConstructor>>,
    by_transaction_type: HashMap<&'static str, Arc<dyn TransactionConstructor>>,
}

impl CompositeTransactionConstructor {
    pub fn new() -> Self {
        let mut composite = Self {
            by_operation_type: HashMap::new(),
            by_transaction_type: HashMap::new(),
        };
        composite.add(Arc::new(CryptoCreateConstructor::new()));
        composite.add(Arc::new(CryptoTransferConstructor::new()));
        composite
    }

    fn add(&mut self, constructor: Arc<dyn TransactionConstructor>) {
        self.by_operation_type.insert(constructor.operation_type(), constructor.clone());
        self.by_transaction_type.insert(constructor.transaction_type(), constructor);
    }

    /// All registered operation types, for capability advertisement.
    pub fn operation_types(&self) -> Vec<&'static str> {
        let mut types: Vec<&'static str> = self.by_operation_type.keys().copied().collect();
        types.sort_unstable();
        types
    }

    pub fn construct(
        &self,
        node_account_id: EntityId,
        operations: &[Operation],
    ) -> Result<(NativeTransaction, Vec<AccountId>), MirrorError> {
        self.validate(operations)?.construct(node_account_id, operations)
    }

    pub fn parse(
        &self,
        transaction: &NativeTransaction,
    ) -> Result<(Vec<Operation>, Vec<AccountId>), MirrorError> {
        let name = transaction.type_name();
        let Some(constructor) = self.by_transaction_type.get(name) else {
            error!("No constructor to parse transaction type {name}");
            return Err(MirrorError::InternalServerError);
        };

        constructor.parse(transaction)
    }

    pub fn preprocess(&self, operations: &[Operation]) -> Result<Vec<AccountId>, MirrorError> {
        self.validate(operations)?.preprocess(operations)
    }

    pub fn default_max_transaction_fee(&self, operation_type: &str) -> Result<HbarAmount, MirrorError> {
        self.by_operation_type
            .get(operation_type)
            .map(|c| c.default_max_transaction_fee())
            .ok_or(MirrorError::InvalidOperationType)
    }

    fn validate(
        &self,
        operations: &[Operation],
    ) -> Result<&Arc<dyn TransactionConstructor>, MirrorError> {
        let Some(first) = operations.first() else {
            return Err(MirrorError::EmptyOperations);
        };

        if operations[1..].iter().any(|op| op.op_type != first.op_type) {
            return Err(MirrorError::MultipleOperationTypesPresent);
        }

        self.by_operation_type.get(first.op_type.as_str()).ok_or_else(|| {
            error!("Operation type {} is not supported", first.op_type);
            MirrorError::OperationTypeUnsupported
        })
    }
}

impl Default for CompositeTransactionConstructor {
    fn default() -> Self {
        Self::new()
    }
}

use thiserror::Error;

/// Stable error catalog advertised at `/network/options`.
///
/// Codes and retriable flags are part of the public Rosetta contract and must
/// not change between releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MirrorError {
    #[error("Invalid argument")]
    InvalidArgument,
    #[error("Invalid account")]
    InvalidAccount,
    #[error("Invalid amount")]
    InvalidAmount,
    #[error("Invalid operations")]
    InvalidOperations,
    #[error("Invalid operation type")]
    InvalidOperationType,
    #[error("Invalid operation metadata")]
    InvalidOperationMetadata,
    #[error("Operations total amount must be 0")]
    InvalidOperationsTotalAmount,
    #[error("Invalid currency")]
    InvalidCurrency,
    #[error("Empty operations")]
    EmptyOperations,
    #[error("Multiple operation types present")]
    MultipleOperationTypesPresent,
    #[error("Operation type not supported")]
    OperationTypeUnsupported,
    #[error("Account not found")]
    AccountNotFound,
    #[error("Block not found")]
    BlockNotFound,
    #[error("Transaction not found")]
    TransactionNotFound,
    #[error("Database error")]
    DatabaseError,
    #[error("Node is starting")]
    NodeStarting,
    #[error("Endpoint not supported in offline mode")]
    EndpointNotSupportedInOfflineMode,
    #[error("Not implemented")]
    NotImplemented,
    #[error("Internal server error")]
    InternalServerError,
    #[error("Transaction freeze failed")]
    TransactionFreezeFailed,
    #[error("Invalid transaction type")]
    TransactionInvalidType,
}

impl MirrorError {
    /// Every catalog entry, in stable code order.
    pub fn all() -> &'static [MirrorError] {
        use MirrorError::*;
        &[
            InvalidArgument,
            InvalidAccount,
            InvalidAmount,
            InvalidOperations,
            InvalidOperationType,
            InvalidOperationMetadata,
            InvalidOperationsTotalAmount,
            InvalidCurrency,
            EmptyOperations,
            MultipleOperationTypesPresent,
            OperationTypeUnsupported,
            AccountNotFound,
            BlockNotFound,
            TransactionNotFound,
            DatabaseError,
            NodeStarting,
            EndpointNotSupportedInOfflineMode,
            NotImplemented,
            InternalServerError,
            TransactionFreezeFailed,
            TransactionInvalidType,
        ]
    }

    pub fn code(&self) -> i32 {
        use MirrorError::*;
        match self {
            InvalidArgument => 100,
            InvalidAccount => 101,
            InvalidAmount => 102,
            InvalidOperations => 103,
            InvalidOperationType => 104,
            InvalidOperationMetadata => 105,
            InvalidOperationsTotalAmount => 106,
            InvalidCurrency => 107,
            EmptyOperations => 108,
            MultipleOperationTypesPresent => 109,
            OperationTypeUnsupported => 110,
            AccountNotFound => 200,
            BlockNotFound => 201,
            TransactionNotFound => 202,
            DatabaseError => 300,
            NodeStarting => 301,
            EndpointNotSupportedInOfflineMode => 400,
            NotImplemented => 401,
            InternalServerError => 500,
            TransactionFreezeFailed => 501,
            TransactionInvalidType => 502,
        }
    }

    /// Whether a client should back off and retry the same request.
    pub fn retriable(&self) -> bool {
        matches!(self, MirrorError::DatabaseError | MirrorError::NodeStarting)
    }
}

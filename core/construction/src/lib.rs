// core/construction/src/lib.rs

pub mod common;
pub mod constructor;
pub mod create;
pub mod native;
pub mod transaction_id;
pub mod transfer;

pub use constructor::{CompositeTransactionConstructor, TransactionConstructor};
pub use native::{
    AccountCreateTransaction, NativeTransaction, SignaturePair, TransferTransaction,
};
pub use transaction_id::TransactionId;

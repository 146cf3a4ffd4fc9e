// core/domain/src/lib.rs

pub mod account_id;
pub mod address_book;
pub mod amount;
pub mod block;
pub mod entity_id;
pub mod error;
pub mod system;
pub mod tables;
pub mod transaction;

pub use account_id::{AccountAlias, AccountId, KeyKind};
pub use address_book::AddressBookEntry;
pub use amount::HbarAmount;
pub use block::Block;
pub use entity_id::EntityId;
pub use error::MirrorError;
pub use system::SystemEntities;
pub use transaction::{Operation, Transaction};

/// Blockchain name advertised in every network identifier.
pub const BLOCKCHAIN: &str = "Hashgraph Mirror";

/// Nanoseconds per second, used when splitting consensus timestamps.
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

// core/api/src/services/mod.rs

pub mod account;
pub mod block;
pub mod construction;
pub mod mempool;
pub mod network;

use crate::rosetta::convert::remove_hex_prefix;
use crate::rosetta::types::PartialBlockIdentifier;
use mirror_domain::transaction::Transaction;
use mirror_domain::{Block, MirrorError};
use mirror_storage::{BlockRepository, TransactionRepository};
use std::sync::Arc;

/// Block and transaction resolution shared by every online service; offline
/// deployments construct it without repositories and any data access fails
/// with `EndpointNotSupportedInOfflineMode`.
#[derive(Clone)]
pub struct BaseService {
    block_repo: Option<Arc<dyn BlockRepository>>,
    transaction_repo: Option<Arc<dyn TransactionRepository>>,
}

impl BaseService {
    pub fn online(
        block_repo: Arc<dyn BlockRepository>,
        transaction_repo: Arc<dyn TransactionRepository>,
    ) -> Self {
        Self {
            block_repo: Some(block_repo),
            transaction_repo: Some(transaction_repo),
        }
    }

    pub fn offline() -> Self {
        Self {
            block_repo: None,
            transaction_repo: None,
        }
    }

    pub fn is_online(&self) -> bool {
        self.block_repo.is_some()
    }

    fn block_repo(&self) -> Result<&Arc<dyn BlockRepository>, MirrorError> {
        self.block_repo.as_ref().ok_or(MirrorError::EndpointNotSupportedInOfflineMode)
    }

    fn transaction_repo(&self) -> Result<&Arc<dyn TransactionRepository>, MirrorError> {
        self.transaction_repo.as_ref().ok_or(MirrorError::EndpointNotSupportedInOfflineMode)
    }

    /// Resolve a partial block identifier: both parts must agree when given,
    /// either part alone resolves directly, nothing means latest.
    pub async fn retrieve_block(
        &self,
        identifier: Option<&PartialBlockIdentifier>,
    ) -> Result<Block, MirrorError> {
        let repo = self.block_repo()?;

        match identifier {
            Some(PartialBlockIdentifier {
                index: Some(index),
                hash: Some(hash),
            }) => repo.find_by_identifier(*index, remove_hex_prefix(hash)).await,
            Some(PartialBlockIdentifier {
                index: Some(index),
                hash: None,
            }) => repo.find_by_index(*index).await,
            Some(PartialBlockIdentifier {
                index: None,
                hash: Some(hash),
            }) => repo.find_by_hash(remove_hex_prefix(hash)).await,
            _ => repo.retrieve_latest().await,
        }
    }

    pub async fn retrieve_latest(&self) -> Result<Block, MirrorError> {
        self.block_repo()?.retrieve_latest().await
    }

    pub async fn retrieve_genesis(&self) -> Result<Block, MirrorError> {
        self.block_repo()?.retrieve_genesis().await
    }

    pub async fn retrieve_genesis_transactions(&self) -> Result<Vec<Transaction>, MirrorError> {
        self.block_repo()?.retrieve_genesis_transactions().await
    }

    pub async fn find_between(&self, start: i64, end: i64) -> Result<Vec<Transaction>, MirrorError> {
        self.transaction_repo()?.find_between(start, end).await
    }

    pub async fn find_by_hash_in_block(
        &self,
        hash: &str,
        start: i64,
        end: i64,
    ) -> Result<Transaction, MirrorError> {
        self.transaction_repo()?.find_by_hash_in_block(hash, start, end).await
    }
}


#[cfg(test)]
mod tests {
    use super::mocks::*;
    use super::*;

    fn online_base(chain_len: usize) -> BaseService {
        BaseService::online(
            Arc::new(MockBlockRepository::with_chain(chain_of(chain_len))),
            Arc::new(MockTransactionRepository::default()),
        )
    }

    #[tokio::test]
    async fn test_offline_base_rejects_data_access() {
        let base = BaseService::offline();
        assert!(!base.is_online());
        assert_eq!(
            base.retrieve_latest().await.unwrap_err(),
            MirrorError::EndpointNotSupportedInOfflineMode
        );
        assert_eq!(
            base.find_between(0, 10).await.unwrap_err(),
            MirrorError::EndpointNotSupportedInOfflineMode
        );
    }

    #[tokio::test]
    async fn test_retrieve_block_by_parts() {
        let base = online_base(6);

        // none → latest (second-to-latest of the chain)
        let block = base.retrieve_block(None).await.unwrap();
        assert_eq!(block.index, 4);

        let block = base
            .retrieve_block(Some(&PartialBlockIdentifier {
                index: Some(2),
                hash: None,
            }))
            .await
            .unwrap();
        assert_eq!(block.index, 2);

        // hash accepts the 0x prefix
        let block = base
            .retrieve_block(Some(&PartialBlockIdentifier {
                index: None,
                hash: Some("0xhash-3".to_string()),
            }))
            .await
            .unwrap();
        assert_eq!(block.index, 3);

        // mismatched pair
        let err = base
            .retrieve_block(Some(&PartialBlockIdentifier {
                index: Some(2),
                hash: Some("hash-3".to_string()),
            }))
            .await
            .unwrap_err();
        assert_eq!(err, MirrorError::BlockNotFound);
    }
}

use crate::cache::AliasCache;
use crate::rosetta::convert::{block_to_wire, transaction_to_wire};
use crate::rosetta::types as wire;
use crate::services::BaseService;
use mirror_domain::transaction::Transaction;
use mirror_domain::MirrorError;
use mirror_storage::AccountRepository;
use std::sync::Arc;

/// The `/block` and `/block/transaction` endpoints, with alias decoration
/// through a process-lifetime LRU.
pub struct BlockApiService {
    base: BaseService,
    account_repo: Arc<dyn AccountRepository>,
    alias_cache: AliasCache,
    max_transactions_in_block: usize,
}

impl BlockApiService {
    pub fn new(
        base: BaseService,
        account_repo: Arc<dyn AccountRepository>,
        entity_cache_size: usize,
        max_transactions_in_block: usize,
    ) -> Self {
        Self {
            base,
            account_repo,
            alias_cache: AliasCache::new(entity_cache_size),
            max_transactions_in_block,
        }
    }

    pub async fn block(&self, request: &wire::BlockRequest) -> Result<wire::BlockResponse, MirrorError> {
        let mut block = self.base.retrieve_block(Some(&request.block_identifier)).await?;

        block.transactions = if block.index == 0 {
            self.base.retrieve_genesis_transactions().await?
        } else {
            self.base
                .find_between(block.consensus_start_ns, block.consensus_end_ns)
                .await?
        };

        // overflow past the response limit degrades to hash-only identifiers
        let mut other_transactions = None;
        if block.transactions.len() > self.max_transactions_in_block {
            other_transactions = Some(
                block.transactions[self.max_transactions_in_block..]
                    .iter()
                    .map(|tx| wire::TransactionIdentifier {
                        hash: tx.hash.clone(),
                    })
                    .collect::<Vec<_>>(),
            );
            block.transactions.truncate(self.max_transactions_in_block);
        }

        self.decorate_aliases(&mut block.transactions).await?;

        Ok(wire::BlockResponse {
            block: Some(block_to_wire(&block)),
            other_transactions,
        })
    }

    pub async fn block_transaction(
        &self,
        request: &wire::BlockTransactionRequest,
    ) -> Result<wire::BlockTransactionResponse, MirrorError> {
        let identifier = wire::PartialBlockIdentifier {
            index: Some(request.block_identifier.index),
            hash: Some(request.block_identifier.hash.clone()),
        };
        let block = self.base.retrieve_block(Some(&identifier)).await?;

        let mut transaction = self
            .base
            .find_by_hash_in_block(
                &request.transaction_identifier.hash,
                block.consensus_start_ns,
                block.consensus_end_ns,
            )
            .await?;

        self.decorate_aliases(std::slice::from_mut(&mut transaction)).await?;

        Ok(wire::BlockTransactionResponse {
            transaction: transaction_to_wire(&transaction),
        })
    }

    /// Swap numeric operation accounts for their alias form, best-effort and
    /// cacheable: a stale numeric id after a late alias assignment is fine.
    async fn decorate_aliases(&self, transactions: &mut [Transaction]) -> Result<(), MirrorError> {
        for transaction in transactions {
            for operation in &mut transaction.operations {
                operation.account_id = self
                    .alias_cache
                    .resolve(operation.account_id.clone(), self.account_repo.as_ref())
                    .await?;
            }
        }

        Ok(())
    }
}

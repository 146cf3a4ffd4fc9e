use crate::rosetta::convert::{amount_to_wire, block_identifier};
use crate::rosetta::types as wire;
use crate::services::BaseService;
use mirror_domain::account_id::is_ed25519_entity_key;
use mirror_domain::{AccountId, MirrorError};
use mirror_storage::AccountRepository;
use serde_json::Value;
use std::sync::Arc;

/// The `/account/balance` endpoint; `/account/coins` is not implemented
/// (the ledger is account-based, not UTXO).
pub struct AccountApiService {
    base: BaseService,
    account_repo: Arc<dyn AccountRepository>,
}

impl AccountApiService {
    pub fn new(base: BaseService, account_repo: Arc<dyn AccountRepository>) -> Self {
        Self { base, account_repo }
    }

    pub async fn account_balance(
        &self,
        request: &wire::AccountBalanceRequest,
    ) -> Result<wire::AccountBalanceResponse, MirrorError> {
        let account_id = AccountId::parse(&request.account_identifier.address)
            .map_err(|_| MirrorError::InvalidAccount)?;

        let block = self.base.retrieve_block(request.block_identifier.as_ref()).await?;

        let (amounts, id_string, public_key) = self
            .account_repo
            .retrieve_balance_at_block(&account_id, block.consensus_end_ns)
            .await?;

        let mut metadata = wire::Metadata::new();
        if account_id.has_alias() && !id_string.is_empty() {
            metadata.insert("account_id".to_string(), Value::String(id_string));
        }
        if let Some(key) = public_key.filter(|key| is_ed25519_entity_key(key)) {
            metadata.insert(
                "public_key".to_string(),
                Value::String(format!("0x{}", hex::encode(key))),
            );
        }

        Ok(wire::AccountBalanceResponse {
            block_identifier: block_identifier(&block),
            balances: amounts.iter().map(amount_to_wire).collect(),
            metadata: (!metadata.is_empty()).then_some(metadata),
        })
    }

    pub fn account_coins(&self) -> Result<(), MirrorError> {
        Err(MirrorError::NotImplemented)
    }
}

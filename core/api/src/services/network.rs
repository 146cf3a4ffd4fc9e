use crate::rosetta::convert::{block_identifier, error_catalog};
use crate::rosetta::types as wire;
use crate::services::BaseService;
use crate::ROSETTA_API_VERSION;
use mirror_domain::transaction::{
    is_successful_result, transaction_results, transaction_types, OPERATION_TYPE_FEE,
};
use mirror_domain::{EntityId, MirrorError};
use mirror_storage::AddressBookRepository;
use serde_json::Value;
use std::sync::Arc;

/// The `/network/*` endpoints: one network identifier, a static capability
/// advertisement, and the chain status with the current peer set.
pub struct NetworkApiService {
    base: BaseService,
    address_book: Option<Arc<dyn AddressBookRepository>>,
    network: wire::NetworkIdentifier,
    /// Static endpoint → node account map from config; overrides the
    /// database-backed address book when non-empty.
    static_nodes: Vec<(String, EntityId)>,
    version: wire::Version,
}

impl NetworkApiService {
    pub fn new(
        base: BaseService,
        address_book: Option<Arc<dyn AddressBookRepository>>,
        network: wire::NetworkIdentifier,
        static_nodes: Vec<(String, EntityId)>,
        node_version: String,
    ) -> Self {
        Self {
            base,
            address_book,
            network,
            static_nodes,
            version: wire::Version {
                rosetta_version: ROSETTA_API_VERSION.to_string(),
                node_version,
                middleware_version: Some(env!("CARGO_PKG_VERSION").to_string()),
            },
        }
    }

    pub fn network_list(&self) -> wire::NetworkListResponse {
        wire::NetworkListResponse {
            network_identifiers: vec![self.network.clone()],
        }
    }

    pub fn network_options(&self) -> wire::NetworkOptionsResponse {
        let operation_statuses = transaction_results()
            .iter()
            .map(|(code, name)| wire::OperationStatus {
                status: (*name).to_string(),
                successful: is_successful_result(*code),
            })
            .collect();

        let mut operation_types: Vec<String> =
            transaction_types().values().map(|name| (*name).to_string()).collect();
        operation_types.push(OPERATION_TYPE_FEE.to_string());

        wire::NetworkOptionsResponse {
            version: self.version.clone(),
            allow: wire::Allow {
                operation_statuses,
                operation_types,
                errors: error_catalog(),
                historical_balance_lookup: true,
                call_methods: Vec::new(),
                balance_exemptions: Vec::new(),
                mempool_coins: false,
            },
        }
    }

    pub async fn network_status(&self) -> Result<wire::NetworkStatusResponse, MirrorError> {
        if !self.base.is_online() {
            return Err(MirrorError::EndpointNotSupportedInOfflineMode);
        }

        let genesis = self.base.retrieve_genesis().await?;
        let current = self.base.retrieve_latest().await?;
        let peers = self.peers().await?;

        Ok(wire::NetworkStatusResponse {
            current_block_identifier: block_identifier(&current),
            current_block_timestamp: current.timestamp_millis(),
            genesis_block_identifier: block_identifier(&genesis),
            peers,
        })
    }

    async fn peers(&self) -> Result<Vec<wire::Peer>, MirrorError> {
        if !self.static_nodes.is_empty() {
            return Ok(self
                .static_nodes
                .iter()
                .map(|(endpoint, account)| wire::Peer {
                    peer_id: account.to_string(),
                    metadata: Some(wire::Metadata::from([(
                        "endpoints".to_string(),
                        Value::from(vec![endpoint.clone()]),
                    )])),
                })
                .collect());
        }

        let Some(address_book) = &self.address_book else {
            return Ok(Vec::new());
        };

        Ok(address_book
            .entries()
            .await?
            .into_iter()
            .map(|entry| wire::Peer {
                peer_id: entry.node_account_id.to_string(),
                metadata: Some(wire::Metadata::from([(
                    "endpoints".to_string(),
                    Value::from(entry.endpoints),
                )])),
            })
            .collect())
    }
}

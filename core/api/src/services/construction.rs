use crate::rosetta::convert::{
    amount_to_wire, operation_to_wire, operations_from_wire, remove_hex_prefix,
};
use crate::rosetta::types as wire;
use ed25519_dalek::{Signature, VerifyingKey};
use mirror_construction::{CompositeTransactionConstructor, NativeTransaction};
use mirror_domain::transaction::Operation;
use mirror_domain::{AccountId, EntityId, MirrorError};
use mirror_storage::AccountRepository;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

const CURVE_EDWARDS25519: &str = "edwards25519";
const SIGNATURE_TYPE_ED25519: &str = "ed25519";
const ED25519_KEY_PREFIX: [u8; 2] = [0x12, 0x20];

/// The `/construction/*` pipeline. Every stage is stateless; clients carry
/// transaction bytes between calls. Only `metadata` needs the database-backed
/// deployment, so everything else works offline.
pub struct ConstructionApiService {
    constructor: CompositeTransactionConstructor,
    online: bool,
    shard: i64,
    realm: i64,
    node_account_ids: Vec<EntityId>,
    /// Online deployments resolve alias operation accounts to their current
    /// numeric ids before constructing; absent offline.
    account_repo: Option<Arc<dyn AccountRepository>>,
}

impl ConstructionApiService {
    pub fn new(
        online: bool,
        shard: i64,
        realm: i64,
        mut node_account_ids: Vec<EntityId>,
        account_repo: Option<Arc<dyn AccountRepository>>,
    ) -> Result<Self, MirrorError> {
        if node_account_ids.is_empty() {
            // the conventional first consensus node
            node_account_ids.push(EntityId::of(shard, realm, 3)?);
        }
        node_account_ids.sort_unstable();

        Ok(Self {
            constructor: CompositeTransactionConstructor::new(),
            online,
            shard,
            realm,
            node_account_ids,
            account_repo,
        })
    }

    async fn resolve_operation_accounts(
        &self,
        mut operations: Vec<Operation>,
    ) -> Result<Vec<Operation>, MirrorError> {
        let Some(repo) = &self.account_repo else {
            return Ok(operations);
        };

        for operation in &mut operations {
            if operation.account_id.has_alias() {
                operation.account_id = repo.get_account_id(operation.account_id.clone()).await?;
            }
        }

        Ok(operations)
    }

    pub fn derive(
        &self,
        request: &wire::ConstructionDeriveRequest,
    ) -> Result<wire::ConstructionDeriveResponse, MirrorError> {
        let public_key = &request.public_key;
        if public_key.curve_type != CURVE_EDWARDS25519 {
            return Err(MirrorError::InvalidArgument);
        }

        let raw = hex::decode(remove_hex_prefix(&public_key.hex_bytes))
            .map_err(|_| MirrorError::InvalidArgument)?;
        if raw.len() != 32 {
            return Err(MirrorError::InvalidArgument);
        }

        let mut alias = ED25519_KEY_PREFIX.to_vec();
        alias.extend_from_slice(&raw);
        let account_id = AccountId::from_alias(self.shard, self.realm, alias)?;

        Ok(wire::ConstructionDeriveResponse {
            account_identifier: wire::AccountIdentifier::new(account_id.to_string()),
            metadata: None,
        })
    }

    pub fn preprocess(
        &self,
        request: &wire::ConstructionPreprocessRequest,
    ) -> Result<wire::ConstructionPreprocessResponse, MirrorError> {
        let operations = operations_from_wire(&request.operations)?;
        let signers = self.constructor.preprocess(&operations)?;

        let mut options = wire::Metadata::new();
        options.insert(
            "operation_type".to_string(),
            Value::String(operations[0].op_type.clone()),
        );

        Ok(wire::ConstructionPreprocessResponse {
            options,
            required_public_keys: signers
                .iter()
                .map(|signer| wire::AccountIdentifier::new(signer.to_string()))
                .collect(),
        })
    }

    pub fn metadata(
        &self,
        request: &wire::ConstructionMetadataRequest,
    ) -> Result<wire::ConstructionMetadataResponse, MirrorError> {
        if !self.online {
            return Err(MirrorError::EndpointNotSupportedInOfflineMode);
        }

        let operation_type = request
            .options
            .get("operation_type")
            .and_then(Value::as_str)
            .ok_or(MirrorError::InvalidArgument)?;
        let max_fee = self.constructor.default_max_transaction_fee(operation_type)?;

        let mut metadata = wire::Metadata::new();
        metadata.insert(
            "node_account_id".to_string(),
            Value::String(self.node_account_ids[0].to_string()),
        );

        Ok(wire::ConstructionMetadataResponse {
            metadata,
            suggested_fee: Some(vec![amount_to_wire(&max_fee)]),
        })
    }

    pub async fn payloads(
        &self,
        request: &wire::ConstructionPayloadsRequest,
    ) -> Result<wire::ConstructionPayloadsResponse, MirrorError> {
        let operations = operations_from_wire(&request.operations)?;
        let operations = self.resolve_operation_accounts(operations).await?;

        let node_account_id = match request.metadata.get("node_account_id") {
            Some(Value::String(id)) => id.parse()?,
            _ => self.node_account_ids[0],
        };

        let (transaction, signers) = self.constructor.construct(node_account_id, &operations)?;
        let payload_bytes = transaction.signing_payload()?;

        let payloads = signers
            .iter()
            .map(|signer| wire::SigningPayload {
                account_identifier: Some(wire::AccountIdentifier::new(signer.to_string())),
                hex_bytes: hex::encode(&payload_bytes),
                signature_type: Some(SIGNATURE_TYPE_ED25519.to_string()),
            })
            .collect();

        Ok(wire::ConstructionPayloadsResponse {
            unsigned_transaction: format!("0x{}", hex::encode(transaction.to_bytes()?)),
            payloads,
        })
    }

    pub fn parse(
        &self,
        request: &wire::ConstructionParseRequest,
    ) -> Result<wire::ConstructionParseResponse, MirrorError> {
        let transaction = decode_transaction(&request.transaction)?;
        if request.signed && !transaction.is_signed() {
            return Err(MirrorError::InvalidArgument);
        }

        let (operations, signers) = self.constructor.parse(&transaction)?;

        let account_identifier_signers = request.signed.then(|| {
            signers
                .iter()
                .map(|signer| wire::AccountIdentifier::new(signer.to_string()))
                .collect()
        });

        Ok(wire::ConstructionParseResponse {
            operations: operations.iter().map(operation_to_wire).collect(),
            account_identifier_signers,
            metadata: None,
        })
    }

    pub fn combine(
        &self,
        request: &wire::ConstructionCombineRequest,
    ) -> Result<wire::ConstructionCombineResponse, MirrorError> {
        let mut transaction = decode_transaction(&request.unsigned_transaction)?;
        let payload = transaction.signing_payload()?;

        for signature in &request.signatures {
            if signature.signature_type != SIGNATURE_TYPE_ED25519
                || signature.public_key.curve_type != CURVE_EDWARDS25519
            {
                return Err(MirrorError::InvalidArgument);
            }

            let key_bytes = hex::decode(remove_hex_prefix(&signature.public_key.hex_bytes))
                .map_err(|_| MirrorError::InvalidArgument)?;
            let key_array: [u8; 32] =
                key_bytes.as_slice().try_into().map_err(|_| MirrorError::InvalidArgument)?;
            let verifying_key =
                VerifyingKey::from_bytes(&key_array).map_err(|_| MirrorError::InvalidArgument)?;

            let signature_bytes = hex::decode(remove_hex_prefix(&signature.hex_bytes))
                .map_err(|_| MirrorError::InvalidArgument)?;
            let signature_array: [u8; 64] = signature_bytes
                .as_slice()
                .try_into()
                .map_err(|_| MirrorError::InvalidArgument)?;

            if verifying_key
                .verify_strict(&payload, &Signature::from_bytes(&signature_array))
                .is_err()
            {
                warn!("Rejecting combine request with an unverifiable signature");
                return Err(MirrorError::InvalidArgument);
            }

            transaction.add_signature(key_bytes, signature_bytes)?;
        }

        if !transaction.is_signed() {
            return Err(MirrorError::InvalidArgument);
        }

        Ok(wire::ConstructionCombineResponse {
            signed_transaction: format!("0x{}", hex::encode(transaction.to_bytes()?)),
        })
    }

    pub fn hash(
        &self,
        request: &wire::ConstructionHashRequest,
    ) -> Result<wire::TransactionIdentifierResponse, MirrorError> {
        let transaction = decode_transaction(&request.signed_transaction)?;
        Ok(wire::TransactionIdentifierResponse {
            transaction_identifier: wire::TransactionIdentifier {
                hash: transaction.hash()?,
            },
            metadata: None,
        })
    }

    /// The server fronts a read-only mirror and carries no consensus node
    /// client; submit acknowledges a well-formed signed transaction with its
    /// hash and leaves gossip to the deployment's relay.
    pub fn submit(
        &self,
        request: &wire::ConstructionSubmitRequest,
    ) -> Result<wire::TransactionIdentifierResponse, MirrorError> {
        let transaction = decode_transaction(&request.signed_transaction)?;
        if !transaction.is_signed() {
            return Err(MirrorError::InvalidArgument);
        }

        Ok(wire::TransactionIdentifierResponse {
            transaction_identifier: wire::TransactionIdentifier {
                hash: transaction.hash()?,
            },
            metadata: None,
        })
    }
}

fn decode_transaction(hex_transaction: &str) -> Result<NativeTransaction, MirrorError> {
    let bytes = hex::decode(remove_hex_prefix(hex_transaction))
        .map_err(|_| MirrorError::InvalidArgument)?;
    NativeTransaction::from_bytes(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};
    use mirror_domain::transaction::OPERATION_TYPE_CRYPTO_TRANSFER;

    fn network() -> wire::NetworkIdentifier {
        wire::NetworkIdentifier {
            blockchain: "b".to_string(),
            network: "n".to_string(),
            sub_network_identifier: None,
        }
    }

    fn service() -> ConstructionApiService {
        ConstructionApiService::new(true, 0, 0, vec![], None).unwrap()
    }

    fn transfer_operations() -> Vec<wire::Operation> {
        let amount = |value: i64| wire::Amount {
            value: value.to_string(),
            currency: wire::Currency {
                symbol: "HBAR".to_string(),
                decimals: 8,
                metadata: None,
            },
            metadata: None,
        };
        vec![
            wire::Operation {
                operation_identifier: wire::OperationIdentifier {
                    index: 0,
                    network_index: None,
                },
                related_operations: None,
                operation_type: OPERATION_TYPE_CRYPTO_TRANSFER.to_string(),
                status: None,
                account: Some(wire::AccountIdentifier::new("0.0.100".to_string())),
                amount: Some(amount(-500)),
                metadata: None,
            },
            wire::Operation {
                operation_identifier: wire::OperationIdentifier {
                    index: 1,
                    network_index: None,
                },
                related_operations: None,
                operation_type: OPERATION_TYPE_CRYPTO_TRANSFER.to_string(),
                status: None,
                account: Some(wire::AccountIdentifier::new("0.0.200".to_string())),
                amount: Some(amount(500)),
                metadata: None,
            },
        ]
    }

    async fn payloads_response() -> wire::ConstructionPayloadsResponse {
        service()
            .payloads(&wire::ConstructionPayloadsRequest {
                network_identifier: network(),
                operations: transfer_operations(),
                metadata: wire::Metadata::new(),
                public_keys: None,
            })
            .await
            .unwrap()
    }

    #[test]
    fn test_derive() {
        let key = SigningKey::from_bytes(&[21u8; 32]);
        let response = service()
            .derive(&wire::ConstructionDeriveRequest {
                network_identifier: network(),
                public_key: wire::PublicKey {
                    hex_bytes: hex::encode(key.verifying_key().as_bytes()),
                    curve_type: CURVE_EDWARDS25519.to_string(),
                },
                metadata: None,
            })
            .unwrap();

        let address = response.account_identifier.address;
        assert!(address.starts_with("0.0.0x1220"));
    }

    #[test]
    fn test_derive_rejects_wrong_curve() {
        let result = service().derive(&wire::ConstructionDeriveRequest {
            network_identifier: network(),
            public_key: wire::PublicKey {
                hex_bytes: "00".repeat(33),
                curve_type: "secp256k1".to_string(),
            },
            metadata: None,
        });
        assert_eq!(result.unwrap_err(), MirrorError::InvalidArgument);
    }

    #[test]
    fn test_preprocess_returns_signers() {
        let response = service()
            .preprocess(&wire::ConstructionPreprocessRequest {
                network_identifier: network(),
                operations: transfer_operations(),
                metadata: None,
            })
            .unwrap();

        assert_eq!(response.required_public_keys.len(), 1);
        assert_eq!(response.required_public_keys[0].address, "0.0.100");
        assert_eq!(
            response.options.get("operation_type"),
            Some(&Value::String(OPERATION_TYPE_CRYPTO_TRANSFER.to_string()))
        );
    }

    #[test]
    fn test_metadata_online_only() {
        let offline = ConstructionApiService::new(false, 0, 0, vec![], None).unwrap();
        let request = wire::ConstructionMetadataRequest {
            network_identifier: network(),
            options: wire::Metadata::from([(
                "operation_type".to_string(),
                Value::String(OPERATION_TYPE_CRYPTO_TRANSFER.to_string()),
            )]),
            public_keys: None,
        };

        assert_eq!(
            offline.metadata(&request).unwrap_err(),
            MirrorError::EndpointNotSupportedInOfflineMode
        );

        let response = service().metadata(&request).unwrap();
        assert_eq!(
            response.metadata.get("node_account_id"),
            Some(&Value::String("0.0.3".to_string()))
        );
        let fee = &response.suggested_fee.unwrap()[0];
        assert_eq!(fee.value, "100000000");
    }

    #[tokio::test]
    async fn test_payloads_produces_signing_payloads() {
        let response = payloads_response().await;
        assert!(response.unsigned_transaction.starts_with("0x"));
        assert_eq!(response.payloads.len(), 1);
        let payload = &response.payloads[0];
        assert_eq!(payload.account_identifier.as_ref().unwrap().address, "0.0.100");
        assert_eq!(payload.signature_type.as_deref(), Some(SIGNATURE_TYPE_ED25519));
    }

    #[tokio::test]
    async fn test_parse_unsigned_roundtrip() {
        let payloads = payloads_response().await;
        let response = service()
            .parse(&wire::ConstructionParseRequest {
                network_identifier: network(),
                signed: false,
                transaction: payloads.unsigned_transaction,
            })
            .unwrap();

        assert_eq!(response.operations.len(), 2);
        assert!(response.account_identifier_signers.is_none());
        let first = &response.operations[0];
        assert_eq!(first.account.as_ref().unwrap().address, "0.0.100");
        assert_eq!(first.amount.as_ref().unwrap().value, "-500");
    }

    #[tokio::test]
    async fn test_combine_parse_hash_submit_flow() {
        let service = service();
        let payloads = payloads_response().await;
        let key = SigningKey::from_bytes(&[22u8; 32]);
        let payload_bytes = hex::decode(&payloads.payloads[0].hex_bytes).unwrap();
        let signature = key.sign(&payload_bytes);

        let combined = service
            .combine(&wire::ConstructionCombineRequest {
                network_identifier: network(),
                unsigned_transaction: payloads.unsigned_transaction,
                signatures: vec![wire::Signature {
                    signing_payload: payloads.payloads[0].clone(),
                    public_key: wire::PublicKey {
                        hex_bytes: hex::encode(key.verifying_key().as_bytes()),
                        curve_type: CURVE_EDWARDS25519.to_string(),
                    },
                    signature_type: SIGNATURE_TYPE_ED25519.to_string(),
                    hex_bytes: hex::encode(signature.to_bytes()),
                }],
            })
            .unwrap();

        // signed parse now reports the signers
        let parsed = service
            .parse(&wire::ConstructionParseRequest {
                network_identifier: network(),
                signed: true,
                transaction: combined.signed_transaction.clone(),
            })
            .unwrap();
        assert_eq!(
            parsed.account_identifier_signers.unwrap()[0].address,
            "0.0.100"
        );

        let hashed = service
            .hash(&wire::ConstructionHashRequest {
                network_identifier: network(),
                signed_transaction: combined.signed_transaction.clone(),
            })
            .unwrap();
        assert!(hashed.transaction_identifier.hash.starts_with("0x"));

        let submitted = service
            .submit(&wire::ConstructionSubmitRequest {
                network_identifier: network(),
                signed_transaction: combined.signed_transaction,
            })
            .unwrap();
        assert_eq!(submitted.transaction_identifier.hash, hashed.transaction_identifier.hash);
    }

    #[tokio::test]
    async fn test_combine_rejects_bad_signature() {
        let service = service();
        let payloads = payloads_response().await;
        let key = SigningKey::from_bytes(&[23u8; 32]);

        let result = service.combine(&wire::ConstructionCombineRequest {
            network_identifier: network(),
            unsigned_transaction: payloads.unsigned_transaction,
            signatures: vec![wire::Signature {
                signing_payload: payloads.payloads[0].clone(),
                public_key: wire::PublicKey {
                    hex_bytes: hex::encode(key.verifying_key().as_bytes()),
                    curve_type: CURVE_EDWARDS25519.to_string(),
                },
                signature_type: SIGNATURE_TYPE_ED25519.to_string(),
                hex_bytes: "00".repeat(64),
            }],
        });
        assert_eq!(result.unwrap_err(), MirrorError::InvalidArgument);
    }

    #[tokio::test]
    async fn test_submit_requires_signatures() {
        let payloads = payloads_response().await;
        let result = service().submit(&wire::ConstructionSubmitRequest {
            network_identifier: network(),
            signed_transaction: payloads.unsigned_transaction,
        });
        assert_eq!(result.unwrap_err(), MirrorError::InvalidArgument);
    }

    #[tokio::test]
    async fn test_payloads_resolves_alias_accounts_online() {
        let key = SigningKey::from_bytes(&[24u8; 32]);
        let mut alias = vec![0x12, 0x20];
        alias.extend_from_slice(key.verifying_key().as_bytes());
        let alias_id = mirror_domain::AccountId::from_alias(0, 0, alias).unwrap();

        let account_repo = crate::services::mocks::MockAccountRepository {
            aliases: vec![(100, alias_id.clone())],
            ..Default::default()
        };
        let service =
            ConstructionApiService::new(true, 0, 0, vec![], Some(Arc::new(account_repo))).unwrap();

        let mut operations = transfer_operations();
        operations[0].account = Some(wire::AccountIdentifier::new(alias_id.to_string()));

        let response = service
            .payloads(&wire::ConstructionPayloadsRequest {
                network_identifier: network(),
                operations,
                metadata: wire::Metadata::new(),
                public_keys: None,
            })
            .await
            .unwrap();

        // the alias debit account resolved to its numeric id and signs
        assert_eq!(response.payloads[0].account_identifier.as_ref().unwrap().address, "0.0.100");
    }
}

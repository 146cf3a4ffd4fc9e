use mirror_domain::transaction::Operation;
use mirror_domain::MirrorError;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::error;

/// What a constructor expects of every operation's amount field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountPolicy {
    /// Every operation must carry an amount.
    Required,
    /// No operation may carry an amount.
    Forbidden,
    /// The constructor applies its own amount rules.
    Any,
}

/// Validate an operation list against a constructor's expectations.
///
/// `size` of 0 means any non-zero length.
pub fn validate_operations(
    operations: &[Operation],
    size: usize,
    op_type: &str,
    amount_policy: AmountPolicy,
) -> Result<(), MirrorError> {
    if operations.is_empty() {
        return Err(MirrorError::EmptyOperations);
    }

    if size != 0 && operations.len() != size {
        return Err(MirrorError::InvalidOperations);
    }

    for operation in operations {
        match amount_policy {
            AmountPolicy::Required if operation.amount.is_none() => {
                return Err(MirrorError::InvalidOperations);
            }
            AmountPolicy::Forbidden if operation.amount.is_some() => {
                return Err(MirrorError::InvalidOperations);
            }
            _ => {}
        }
        if operation.op_type != op_type {
            return Err(MirrorError::InvalidOperationType);
        }
    }

    Ok(())
}

/// Deserialize merged operation metadata maps into a typed struct.
pub fn parse_operation_metadata<T: DeserializeOwned>(
    metadatas: &[&BTreeMap<String, Value>],
) -> Result<T, MirrorError> {
    let mut merged = serde_json::Map::new();
    for metadata in metadatas {
        for (key, value) in metadata.iter() {
            merged.insert(key.clone(), value.clone());
        }
    }

    serde_json::from_value(Value::Object(merged)).map_err(|err| {
        error!("Failed to parse operation metadata: {err}");
        MirrorError::InvalidOperationMetadata
    })
}

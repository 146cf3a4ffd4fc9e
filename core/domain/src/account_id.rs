use crate::entity_id::EntityId;
use crate::error::MirrorError;
use std::fmt;

/// Curve of an alias public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Ed25519,
    EcdsaSecp256k1,
}

/// A public-key alias with the shard/realm it was addressed under.
///
/// Alias bytes are the ledger's protobuf key encoding: `0x1220` followed by a
/// 32-byte ed25519 key, or `0x3a21` followed by a 33-byte compressed
/// secp256k1 key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountAlias {
    pub shard: i64,
    pub realm: i64,
    pub bytes: Vec<u8>,
    pub kind: KeyKind,
}

const ED25519_PREFIX: [u8; 2] = [0x12, 0x20];
const ECDSA_PREFIX: [u8; 2] = [0x3a, 0x21];

/// Classify alias bytes, rejecting anything that is not a well-formed key.
pub fn decode_alias_key(bytes: &[u8]) -> Result<KeyKind, MirrorError> {
    if bytes.len() == 34 && bytes[..2] == ED25519_PREFIX {
        let raw: [u8; 32] = bytes[2..].try_into().map_err(|_| MirrorError::InvalidAccount)?;
        ed25519_dalek::VerifyingKey::from_bytes(&raw).map_err(|_| MirrorError::InvalidAccount)?;
        return Ok(KeyKind::Ed25519);
    }

    if bytes.len() == 35 && bytes[..2] == ECDSA_PREFIX {
        secp256k1::PublicKey::from_slice(&bytes[2..]).map_err(|_| MirrorError::InvalidAccount)?;
        return Ok(KeyKind::EcdsaSecp256k1);
    }

    Err(MirrorError::InvalidAccount)
}

/// True when the stored entity key is a plain protobuf-encoded ed25519 key.
pub fn is_ed25519_entity_key(key: &[u8]) -> bool {
    key.len() == 34 && key[..2] == ED25519_PREFIX
}

/// An account identifier: either a numeric entity id or a public-key alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountId {
    Num(EntityId),
    Alias(AccountAlias),
}

impl AccountId {
    pub fn from_entity_id(id: EntityId) -> Self {
        AccountId::Num(id)
    }

    /// Build an alias-carrying id, validating the key bytes.
    pub fn from_alias(shard: i64, realm: i64, bytes: Vec<u8>) -> Result<Self, MirrorError> {
        let kind = decode_alias_key(&bytes)?;
        Ok(AccountId::Alias(AccountAlias {
            shard,
            realm,
            bytes,
            kind,
        }))
    }

    /// Parse `shard.realm.num` or `shard.realm.0x<hex alias>`.
    pub fn parse(address: &str) -> Result<Self, MirrorError> {
        let parts: Vec<&str> = address.split('.').collect();
        if parts.len() != 3 {
            return Err(MirrorError::InvalidAccount);
        }

        let shard: i64 = parts[0].parse().map_err(|_| MirrorError::InvalidAccount)?;
        let realm: i64 = parts[1].parse().map_err(|_| MirrorError::InvalidAccount)?;

        if let Some(alias_hex) = parts[2].strip_prefix("0x") {
            let bytes = hex::decode(alias_hex).map_err(|_| MirrorError::InvalidAccount)?;
            return Self::from_alias(shard, realm, bytes);
        }

        let num: i64 = parts[2].parse().map_err(|_| MirrorError::InvalidAccount)?;
        EntityId::of(shard, realm, num)
            .map(AccountId::Num)
            .map_err(|_| MirrorError::InvalidAccount)
    }

    pub fn has_alias(&self) -> bool {
        matches!(self, AccountId::Alias(_))
    }

    pub fn alias_bytes(&self) -> Option<&[u8]> {
        match self {
            AccountId::Num(_) => None,
            AccountId::Alias(alias) => Some(&alias.bytes),
        }
    }

    /// The encoded numeric id; zero for alias-form identifiers.
    pub fn encoded(&self) -> i64 {
        match self {
            AccountId::Num(id) => id.encoded(),
            AccountId::Alias(_) => 0,
        }
    }

    pub fn entity_id(&self) -> Option<EntityId> {
        match self {
            AccountId::Num(id) => Some(*id),
            AccountId::Alias(_) => None,
        }
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountId::Num(id) => write!(f, "{}", id),
            AccountId::Alias(alias) => {
                write!(f, "{}.{}.0x{}", alias.shard, alias.realm, hex::encode(&alias.bytes))
            }
        }
    }
}

impl From<EntityId> for AccountId {
    fn from(id: EntityId) -> Self {
        AccountId::Num(id)
    }
}

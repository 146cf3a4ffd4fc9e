use crate::error::MirrorError;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

const SHARD_BITS: u32 = 10;
const REALM_BITS: u32 = 16;
const NUM_BITS: u32 = 38;

const SHARD_MASK: i64 = (1 << SHARD_BITS) - 1;
const REALM_MASK: i64 = (1 << REALM_BITS) - 1;
const NUM_MASK: i64 = (1 << NUM_BITS) - 1;

/// A `(shard, realm, num)` entity identifier and its 64-bit database encoding.
///
/// The encoding packs `shard` into the top 10 bits, `realm` into the next 16
/// and `num` into the low 38. Encoding is only defined for non-negative
/// components within those widths; decoding accepts any signed 64-bit value,
/// so every database id round-trips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct EntityId {
    shard: i64,
    realm: i64,
    num: i64,
    encoded: i64,
}

impl EntityId {
    /// Build an entity id from its components, validating the ranges.
    pub fn of(shard: i64, realm: i64, num: i64) -> Result<Self, MirrorError> {
        let encoded = Self::encode(shard, realm, num)?;
        Ok(Self {
            shard,
            realm,
            num,
            encoded,
        })
    }

    /// Decode a database id. Total over the i64 domain.
    pub fn from_encoded(encoded: i64) -> Self {
        Self {
            shard: (encoded >> (REALM_BITS + NUM_BITS)) & SHARD_MASK,
            realm: (encoded >> NUM_BITS) & REALM_MASK,
            num: encoded & NUM_MASK,
            encoded,
        }
    }

    fn encode(shard: i64, realm: i64, num: i64) -> Result<i64, MirrorError> {
        if shard < 0 || shard > SHARD_MASK || realm < 0 || realm > REALM_MASK || num < 0 || num > NUM_MASK {
            return Err(MirrorError::InvalidArgument);
        }

        Ok((num & NUM_MASK) | ((realm & REALM_MASK) << NUM_BITS) | ((shard & SHARD_MASK) << (REALM_BITS + NUM_BITS)))
    }

    pub fn shard(&self) -> i64 {
        self.shard
    }

    pub fn realm(&self) -> i64 {
        self.realm
    }

    pub fn num(&self) -> i64 {
        self.num
    }

    pub fn encoded(&self) -> i64 {
        self.encoded
    }

    /// `0.0.0` is the sentinel for "absent".
    pub fn is_zero(&self) -> bool {
        self.encoded == 0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.shard, self.realm, self.num)
    }
}

impl FromStr for EntityId {
    type Err = MirrorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '.');
        let shard = next_component(&mut parts)?;
        let realm = next_component(&mut parts)?;
        let num = next_component(&mut parts)?;
        Self::of(shard, realm, num)
    }
}

fn next_component<'a>(parts: &mut impl Iterator<Item = &'a str>) -> Result<i64, MirrorError> {
    parts
        .next()
        .and_then(|p| p.parse::<i64>().ok())
        .ok_or(MirrorError::InvalidArgument)
}

impl Serialize for EntityId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(self.encoded)
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(EntityIdVisitor)
    }
}

struct EntityIdVisitor;

impl<'de> Visitor<'de> for EntityIdVisitor {
    type Value = EntityId;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an encoded entity id or a 'shard.realm.num' string")
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<EntityId, E> {
        Ok(EntityId::from_encoded(value))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<EntityId, E> {
        i64::try_from(value)
            .map(EntityId::from_encoded)
            .map_err(|_| E::custom("entity id out of range"))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<EntityId, E> {
        if value.contains('.') {
            value.parse().map_err(|_| E::custom("invalid entity id string"))
        } else {
            value
                .parse::<i64>()
                .map(EntityId::from_encoded)
                .map_err(|_| E::custom("invalid encoded entity id"))
        }
    }
}

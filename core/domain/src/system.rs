use crate::entity_id::EntityId;
use crate::error::MirrorError;

const ADDRESS_BOOK_101_NUM: i64 = 101;
const ADDRESS_BOOK_102_NUM: i64 = 102;
const STAKING_REWARD_ACCOUNT_NUM: i64 = 800;
const TREASURY_ACCOUNT_NUM: i64 = 2;

/// Well-known system entities derived from the deployment's shard and realm.
#[derive(Debug, Clone, Copy)]
pub struct SystemEntities {
    pub address_book_101: EntityId,
    pub address_book_102: EntityId,
    pub staking_reward_account: EntityId,
    pub treasury_account: EntityId,
}

impl SystemEntities {
    pub fn new(shard: i64, realm: i64) -> Result<Self, MirrorError> {
        Ok(Self {
            address_book_101: EntityId::of(shard, realm, ADDRESS_BOOK_101_NUM)?,
            address_book_102: EntityId::of(shard, realm, ADDRESS_BOOK_102_NUM)?,
            staking_reward_account: EntityId::of(shard, realm, STAKING_REWARD_ACCOUNT_NUM)?,
            treasury_account: EntityId::of(shard, realm, TREASURY_ACCOUNT_NUM)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_shard_realm() {
        let entities = SystemEntities::new(0, 0).unwrap();
        assert_eq!(entities.treasury_account.to_string(), "0.0.2");
        assert_eq!(entities.address_book_101.to_string(), "0.0.101");
        assert_eq!(entities.address_book_102.to_string(), "0.0.102");
        assert_eq!(entities.staking_reward_account.to_string(), "0.0.800");
    }

    #[test]
    fn test_nonzero_shard_realm() {
        let entities = SystemEntities::new(1, 2).unwrap();
        assert_eq!(entities.treasury_account.shard(), 1);
        assert_eq!(entities.treasury_account.realm(), 2);
        assert_eq!(entities.treasury_account.num(), 2);
    }

    #[test]
    fn test_invalid_shard() {
        assert!(SystemEntities::new(-1, 0).is_err());
        assert!(SystemEntities::new(1024, 0).is_err());
    }
}

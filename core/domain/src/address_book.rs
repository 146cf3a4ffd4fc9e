use crate::entity_id::EntityId;

/// A consensus node as exposed to Rosetta peers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressBookEntry {
    pub node_id: i64,
    pub node_account_id: EntityId,
    /// `host:port` strings sorted by (ip, port).
    pub endpoints: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry() {
        let entry = AddressBookEntry {
            node_id: 0,
            node_account_id: EntityId::of(0, 0, 3).unwrap(),
            endpoints: vec!["10.0.0.1:50211".to_string()],
        };
        assert_eq!(entry.node_account_id.num(), 3);
    }
}

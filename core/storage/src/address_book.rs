// core/storage/src/address_book.rs

use crate::db::DbClient;
use async_trait::async_trait;
use mirror_domain::tables::NodeServiceEndpointRow;
use mirror_domain::{AddressBookEntry, EntityId, MirrorError};

/// Latest node set with service endpoints, aggregated per node and sorted by
/// (ip, port) inside the string_agg.
const SELECT_LATEST_NODE_SERVICE_ENDPOINTS: &str = "\
    select abe.node_id, \
           coalesce(n.account_id, abe.node_account_id) as node_account_id, \
           string_agg(abse.ip_address_v4 || ':' || abse.port::text, ',' \
             order by abse.ip_address_v4, abse.port) as endpoints \
    from ( \
      select max(start_consensus_timestamp) as max from address_book where file_id = $1 \
    ) current \
    join address_book_entry abe on abe.consensus_timestamp = current.max \
    left join node n on n.node_id = abe.node_id \
    left join address_book_service_endpoint abse \
      on abse.consensus_timestamp = current.max and abse.node_id = abe.node_id \
    group by abe.node_id, n.account_id, abe.node_account_id \
    order by abe.node_id";

/// The current consensus node roster.
#[async_trait]
pub trait AddressBookRepository: Send + Sync {
    async fn entries(&self) -> Result<Vec<AddressBookEntry>, MirrorError>;
}

pub struct PgAddressBookRepository {
    db: DbClient,
    address_book_101: EntityId,
    address_book_102: EntityId,
}

impl PgAddressBookRepository {
    pub fn new(db: DbClient, address_book_101: EntityId, address_book_102: EntityId) -> Self {
        Self {
            db,
            address_book_101,
            address_book_102,
        }
    }
}

#[async_trait]
impl AddressBookRepository for PgAddressBookRepository {
    async fn entries(&self) -> Result<Vec<AddressBookEntry>, MirrorError> {
        // file 101 carries service endpoints; fall back to 102 when absent
        for file_id in [self.address_book_101, self.address_book_102] {
            let rows: Vec<NodeServiceEndpointRow> = self
                .db
                .scoped(
                    sqlx::query_as(SELECT_LATEST_NODE_SERVICE_ENDPOINTS)
                        .bind(file_id)
                        .fetch_all(self.db.pool()),
                )
                .await?;

            if !rows.is_empty() {
                return Ok(rows.into_iter().map(to_entry).collect());
            }
        }

        Ok(Vec::new())
    }
}

fn to_entry(row: NodeServiceEndpointRow) -> AddressBookEntry {
    let endpoints = row
        .endpoints
        .filter(|joined| !joined.is_empty())
        .map(|joined| joined.split(',').map(str::to_string).collect())
        .unwrap_or_default();

    AddressBookEntry {
        node_id: row.node_id,
        node_account_id: row.node_account_id,
        endpoints,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_entry_splits_endpoints() {
        let entry = to_entry(NodeServiceEndpointRow {
            node_id: 0,
            node_account_id: EntityId::from_encoded(3),
            endpoints: Some("10.0.0.1:50211,10.0.0.2:50212".to_string()),
        });
        assert_eq!(entry.endpoints, vec!["10.0.0.1:50211", "10.0.0.2:50212"]);
        assert_eq!(entry.node_account_id.num(), 3);
    }

    #[test]
    fn test_to_entry_without_endpoints() {
        let entry = to_entry(NodeServiceEndpointRow {
            node_id: 1,
            node_account_id: EntityId::from_encoded(4),
            endpoints: None,
        });
        assert!(entry.endpoints.is_empty());

        let entry = to_entry(NodeServiceEndpointRow {
            node_id: 1,
            node_account_id: EntityId::from_encoded(4),
            endpoints: Some(String::new()),
        });
        assert!(entry.endpoints.is_empty());
    }
}

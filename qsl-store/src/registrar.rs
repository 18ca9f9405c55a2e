use tracing::debug;

use crate::backend::DocumentStore;
use crate::error::StoreResult;
use crate::records::{RecordType, ADMIN_COLLECTIONS};

/// Attaches collections and indexes to a fresh connection.
pub struct SchemaRegistrar;

impl SchemaRegistrar {
    /// Every [`RecordType`]. Safe to run again on the same connection.
    pub async fn register_all(store: &dyn DocumentStore) -> StoreResult<()> {
        for record in RecordType::ALL {
            store.ensure_collection(record.spec()).await?;
        }
        debug!(database = store.database(), count = RecordType::ALL.len(), "record types registered");
        Ok(())
    }

    pub async fn register_administrative(store: &dyn DocumentStore) -> StoreResult<()> {
        for spec in ADMIN_COLLECTIONS {
            store.ensure_collection(spec).await?;
        }
        debug!(database = store.database(), "administrative collections registered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryDriver, StoreDriver};
    use crate::query::Filter;
    use crate::uri::StoreUri;

    #[tokio::test]
    async fn registration_is_idempotent() {
        let store = MemoryDriver::new()
            .connect(&StoreUri::parse("memory://local/t1").unwrap())
            .await
            .unwrap();

        SchemaRegistrar::register_all(&*store).await.unwrap();
        SchemaRegistrar::register_all(&*store).await.unwrap();

        for record in RecordType::ALL {
            assert_eq!(store.count(record.collection(), &Filter::new()).await.unwrap(), 0);
        }
        assert!(store.count("users", &Filter::new()).await.is_err());
    }
}

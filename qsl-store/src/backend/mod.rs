//! Storage boundary: a driver opens connections, a connection exposes
//! collections of JSON documents keyed by `_id`.

pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};
use crate::query::{Document, Filter, Query};
use crate::uri::StoreUri;

pub use memory::MemoryDriver;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDriver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: &'static str,
    pub fields: &'static [&'static str],
    /// Documents with a null or missing value in any field are not checked.
    pub unique: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionSpec {
    pub name: &'static str,
    pub indexes: &'static [IndexSpec],
}

impl CollectionSpec {
    pub fn unique_indexes(&self) -> impl Iterator<Item = &'static IndexSpec> {
        self.indexes.iter().filter(|i| i.unique)
    }
}

/// One open connection to one database.
///
/// Every operation fails with [`StoreError::Closed`] once [`close`](Self::close)
/// has run, and with [`StoreError::UnknownCollection`] for collections that
/// were never ensured on this connection.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    fn database(&self) -> &str;

    /// Create the collection and its indexes. Idempotent.
    async fn ensure_collection(&self, spec: &CollectionSpec) -> StoreResult<()>;

    /// Insert `doc`, assigning an `_id` when it has none.
    async fn insert(&self, collection: &str, doc: Document) -> StoreResult<Document>;

    async fn find(&self, collection: &str, query: &Query) -> StoreResult<Vec<Document>>;

    async fn count(&self, collection: &str, filter: &Filter) -> StoreResult<usize>;

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>>;

    /// Replace the whole document, keeping its `_id`.
    async fn replace(&self, collection: &str, id: &str, doc: Document) -> StoreResult<Option<Document>>;

    /// Atomically overwrite the top-level fields in `changes`.
    async fn patch(&self, collection: &str, id: &str, changes: Document) -> StoreResult<Option<Document>>;

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<Option<Document>>;

    /// Atomically add `by` to the integer `field` of document `id`, creating
    /// the document at zero first. Returns the new value.
    async fn increment(&self, collection: &str, id: &str, field: &str, by: i64) -> StoreResult<i64>;

    async fn close(&self);

    fn is_closed(&self) -> bool;
}

#[async_trait]
pub trait StoreDriver: Send + Sync {
    async fn connect(&self, uri: &StoreUri) -> StoreResult<Arc<dyn DocumentStore>>;
}

/// Driver for the URI scheme: `memory://` or `sqlite://`.
pub fn driver_for(uri: &StoreUri) -> StoreResult<Arc<dyn StoreDriver>> {
    match uri.scheme() {
        "memory" => Ok(Arc::new(MemoryDriver::new())),
        #[cfg(feature = "sqlite")]
        "sqlite" => Ok(Arc::new(SqliteDriver::new())),
        other => Err(StoreError::InvalidUri(format!(
            "no driver for scheme `{other}`"
        ))),
    }
}

pub(crate) fn require_database(uri: &StoreUri) -> StoreResult<&str> {
    uri.database()
        .ok_or_else(|| StoreError::InvalidUri(format!("`{uri}` names no database")))
}

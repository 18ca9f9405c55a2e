use std::sync::Arc;

use anyhow::Result;
use qsl_core::errors::QslError;
use serde_json::Value;

use crate::backend::DocumentStore;
use crate::error::store_error;
use crate::query::{Document, Filter, Query};
use crate::records::{RecordType, COUNTERS, USERS};

/// One collection of an open connection. Errors come back as `QslError`s.
#[derive(Clone)]
pub struct Collection {
    store: Arc<dyn DocumentStore>,
    name: &'static str,
}

impl Collection {
    fn new(store: Arc<dyn DocumentStore>, name: &'static str) -> Self {
        Self { store, name }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub async fn insert(&self, doc: Document) -> Result<Document> {
        self.store.insert(self.name, doc).await.map_err(store_error)
    }

    pub async fn find(&self, query: &Query) -> Result<Vec<Document>> {
        self.store.find(self.name, query).await.map_err(store_error)
    }

    pub async fn find_one(&self, filter: Filter) -> Result<Option<Document>> {
        let mut query = Query::newest_first(filter);
        query.limit = Some(1);
        Ok(self.find(&query).await?.into_iter().next())
    }

    pub async fn count(&self, filter: &Filter) -> Result<usize> {
        self.store.count(self.name, filter).await.map_err(store_error)
    }

    pub async fn get(&self, id: &str) -> Result<Option<Document>> {
        self.store.get(self.name, id).await.map_err(store_error)
    }

    /// Like [`get`](Self::get), failing with 404 "`what` not found".
    pub async fn require(&self, id: &str, what: &str) -> Result<Document> {
        self.get(id)
            .await?
            .ok_or_else(|| QslError::not_found(format!("{what} not found")).into_anyhow())
    }

    pub async fn replace(&self, id: &str, doc: Document) -> Result<Option<Document>> {
        self.store.replace(self.name, id, doc).await.map_err(store_error)
    }

    pub async fn patch(&self, id: &str, changes: Document) -> Result<Option<Document>> {
        self.store.patch(self.name, id, changes).await.map_err(store_error)
    }

    /// Patch a single field.
    pub async fn set(&self, id: &str, field: &str, value: Value) -> Result<Option<Document>> {
        let mut changes = Document::new();
        changes.insert(field.to_string(), value);
        self.patch(id, changes).await
    }

    pub async fn delete(&self, id: &str) -> Result<Option<Document>> {
        self.store.delete(self.name, id).await.map_err(store_error)
    }

    pub async fn increment(&self, id: &str, field: &str, by: i64) -> Result<i64> {
        self.store
            .increment(self.name, id, field, by)
            .await
            .map_err(store_error)
    }
}

fn same_store(a: &Arc<dyn DocumentStore>, b: &Arc<dyn DocumentStore>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Connection to one tenant database with every [`RecordType`] registered.
///
/// Only the connection registry can build one, after registration succeeded.
#[derive(Clone)]
pub struct TenantHandle {
    name: String,
    store: Arc<dyn DocumentStore>,
}

impl TenantHandle {
    pub(crate) fn new(name: String, store: Arc<dyn DocumentStore>) -> Self {
        Self { name, store }
    }

    /// The tenant database name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn collection(&self, record: RecordType) -> Collection {
        Collection::new(Arc::clone(&self.store), record.collection())
    }

    pub fn cards(&self) -> Collection {
        self.collection(RecordType::Card)
    }

    pub fn profiles(&self) -> Collection {
        self.collection(RecordType::CallsignProfile)
    }

    pub fn categories(&self) -> Collection {
        self.collection(RecordType::Category)
    }

    pub fn tags(&self) -> Collection {
        self.collection(RecordType::Tag)
    }

    pub fn sent_cards(&self) -> Collection {
        self.collection(RecordType::SentCard)
    }

    pub fn certificates(&self) -> Collection {
        self.collection(RecordType::Certificate)
    }

    pub fn certificate_templates(&self) -> Collection {
        self.collection(RecordType::CertificateTemplate)
    }

    pub fn rfid_devices(&self) -> Collection {
        self.collection(RecordType::RfidDevice)
    }

    pub fn rfid_logs(&self) -> Collection {
        self.collection(RecordType::RfidLog)
    }

    pub fn associations(&self) -> Collection {
        self.collection(RecordType::CallsignAssociation)
    }

    /// True when both handles share one underlying connection.
    pub fn same_connection(&self, other: &TenantHandle) -> bool {
        same_store(&self.store, &other.store)
    }

    pub async fn close(&self) {
        self.store.close().await;
    }

    pub fn is_closed(&self) -> bool {
        self.store.is_closed()
    }
}

impl std::fmt::Debug for TenantHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantHandle")
            .field("name", &self.name)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Connection to the shared administrative database.
#[derive(Clone)]
pub struct AdminHandle {
    store: Arc<dyn DocumentStore>,
}

impl AdminHandle {
    pub(crate) fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn database(&self) -> &str {
        self.store.database()
    }

    pub fn users(&self) -> Collection {
        Collection::new(Arc::clone(&self.store), USERS.name)
    }

    pub fn counters(&self) -> Collection {
        Collection::new(Arc::clone(&self.store), COUNTERS.name)
    }

    pub fn same_connection(&self, other: &AdminHandle) -> bool {
        same_store(&self.store, &other.store)
    }

    pub async fn close(&self) {
        self.store.close().await;
    }

    pub fn is_closed(&self) -> bool {
        self.store.is_closed()
    }
}

impl std::fmt::Debug for AdminHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminHandle")
            .field("database", &self.database())
            .field("closed", &self.is_closed())
            .finish()
    }
}

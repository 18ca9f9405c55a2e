use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::debug;

use super::{require_database, CollectionSpec, DocumentStore, IndexSpec, StoreDriver};
use crate::error::{StoreError, StoreResult};
use crate::ids::object_id;
use crate::query::{first_value, merge_top_level, Document, Filter, Query, ID_FIELD};
use crate::uri::StoreUri;

/// In-process driver for tests and development.
///
/// Databases live as long as the driver, so reconnecting to the same URI
/// sees earlier writes.
#[derive(Default)]
pub struct MemoryDriver {
    databases: Mutex<HashMap<String, Arc<MemoryDatabase>>>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StoreDriver for MemoryDriver {
    async fn connect(&self, uri: &StoreUri) -> StoreResult<Arc<dyn DocumentStore>> {
        let name = require_database(uri)?.to_string();
        let db = {
            let mut dbs = self.databases.lock();
            Arc::clone(dbs.entry(uri.to_string()).or_default())
        };
        debug!(database = %name, "memory store connected");
        Ok(Arc::new(MemoryStore {
            name,
            db,
            closed: AtomicBool::new(false),
        }))
    }
}

#[derive(Default)]
struct MemoryDatabase {
    collections: RwLock<HashMap<String, MemoryCollection>>,
}

struct MemoryCollection {
    spec: CollectionSpec,
    docs: BTreeMap<String, Document>,
}

impl MemoryCollection {
    fn check_unique(&self, doc: &Document, own_id: &str) -> StoreResult<()> {
        for index in self.spec.unique_indexes() {
            let Some(key) = unique_key(doc, index) else {
                continue;
            };
            let clash = self
                .docs
                .iter()
                .any(|(id, other)| id != own_id && unique_key(other, index).as_ref() == Some(&key));
            if clash {
                return Err(StoreError::Duplicate {
                    collection: self.spec.name.to_string(),
                    index: index.name.to_string(),
                });
            }
        }
        Ok(())
    }
}

fn unique_key(doc: &Document, index: &IndexSpec) -> Option<Vec<Value>> {
    index
        .fields
        .iter()
        .map(|f| first_value(doc, f).filter(|v| !v.is_null()).cloned())
        .collect()
}

pub struct MemoryStore {
    name: String,
    db: Arc<MemoryDatabase>,
    closed: AtomicBool,
}

impl MemoryStore {
    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }

    fn read<T>(&self, collection: &str, f: impl FnOnce(&MemoryCollection) -> T) -> StoreResult<T> {
        self.ensure_open()?;
        let cols = self.db.collections.read();
        let coll = cols
            .get(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))?;
        Ok(f(coll))
    }

    fn write<T>(
        &self,
        collection: &str,
        f: impl FnOnce(&mut MemoryCollection) -> StoreResult<T>,
    ) -> StoreResult<T> {
        self.ensure_open()?;
        let mut cols = self.db.collections.write();
        let coll = cols
            .get_mut(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))?;
        f(coll)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn database(&self) -> &str {
        &self.name
    }

    async fn ensure_collection(&self, spec: &CollectionSpec) -> StoreResult<()> {
        self.ensure_open()?;
        let mut cols = self.db.collections.write();
        cols.entry(spec.name.to_string())
            .and_modify(|c| c.spec = *spec)
            .or_insert_with(|| MemoryCollection {
                spec: *spec,
                docs: BTreeMap::new(),
            });
        Ok(())
    }

    async fn insert(&self, collection: &str, mut doc: Document) -> StoreResult<Document> {
        self.write(collection, |coll| {
            let id = match doc.get(ID_FIELD) {
                Some(Value::String(id)) => id.clone(),
                _ => object_id(),
            };
            doc.insert(ID_FIELD.to_string(), Value::String(id.clone()));

            if coll.docs.contains_key(&id) {
                return Err(StoreError::Duplicate {
                    collection: collection.to_string(),
                    index: ID_FIELD.to_string(),
                });
            }
            coll.check_unique(&doc, &id)?;
            coll.docs.insert(id, doc.clone());
            Ok(doc)
        })
    }

    async fn find(&self, collection: &str, query: &Query) -> StoreResult<Vec<Document>> {
        self.read(collection, |coll| query.apply(coll.docs.values().cloned()))
    }

    async fn count(&self, collection: &str, filter: &Filter) -> StoreResult<usize> {
        self.read(collection, |coll| {
            coll.docs.values().filter(|d| filter.matches(d)).count()
        })
    }

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        self.read(collection, |coll| coll.docs.get(id).cloned())
    }

    async fn replace(&self, collection: &str, id: &str, mut doc: Document) -> StoreResult<Option<Document>> {
        self.write(collection, |coll| {
            if !coll.docs.contains_key(id) {
                return Ok(None);
            }
            doc.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
            coll.check_unique(&doc, id)?;
            coll.docs.insert(id.to_string(), doc.clone());
            Ok(Some(doc))
        })
    }

    async fn patch(&self, collection: &str, id: &str, changes: Document) -> StoreResult<Option<Document>> {
        self.write(collection, |coll| {
            let Some(mut doc) = coll.docs.get(id).cloned() else {
                return Ok(None);
            };
            merge_top_level(&mut doc, changes);
            doc.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
            coll.check_unique(&doc, id)?;
            coll.docs.insert(id.to_string(), doc.clone());
            Ok(Some(doc))
        })
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        self.write(collection, |coll| Ok(coll.docs.remove(id)))
    }

    async fn increment(&self, collection: &str, id: &str, field: &str, by: i64) -> StoreResult<i64> {
        self.write(collection, |coll| {
            let doc = coll.docs.entry(id.to_string()).or_insert_with(|| {
                let mut d = Document::new();
                d.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
                d
            });
            let next = doc.get(field).and_then(Value::as_i64).unwrap_or(0) + by;
            doc.insert(field.to_string(), Value::from(next));
            Ok(next)
        })
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!(database = %self.name, "memory store closed");
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PEOPLE: CollectionSpec = CollectionSpec {
        name: "people",
        indexes: &[IndexSpec {
            name: "email",
            fields: &["email"],
            unique: true,
        }],
    };

    fn doc(v: Value) -> Document {
        v.as_object().cloned().unwrap()
    }

    async fn store() -> Arc<dyn DocumentStore> {
        let driver = MemoryDriver::new();
        let store = driver
            .connect(&StoreUri::parse("memory://local/test").unwrap())
            .await
            .unwrap();
        store.ensure_collection(&PEOPLE).await.unwrap();
        store
    }

    #[tokio::test]
    async fn unique_index_ignores_missing_values() {
        let s = store().await;
        s.insert("people", doc(json!({"email": "a@x.org"}))).await.unwrap();
        s.insert("people", doc(json!({"name": "no email"}))).await.unwrap();
        s.insert("people", doc(json!({"name": "also none"}))).await.unwrap();

        let err = s
            .insert("people", doc(json!({"email": "a@x.org"})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { .. }));
    }

    #[tokio::test]
    async fn patch_overwrites_top_level_fields() {
        let s = store().await;
        let created = s
            .insert("people", doc(json!({"name": "A", "info": {"x": 1, "y": 2}})))
            .await
            .unwrap();
        let id = created[ID_FIELD].as_str().unwrap();

        let patched = s
            .patch("people", id, doc(json!({"info": {"x": 5}})))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(patched["info"], json!({"x": 5}));
        assert_eq!(patched["name"], "A");
        assert!(s.patch("people", "missing", Document::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn increment_upserts() {
        let s = store().await;
        assert_eq!(s.increment("people", "seq", "value", 1).await.unwrap(), 1);
        assert_eq!(s.increment("people", "seq", "value", 1).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn closed_and_unknown_collections_fail() {
        let s = store().await;
        assert!(matches!(
            s.get("cards", "x").await,
            Err(StoreError::UnknownCollection(_))
        ));
        s.close().await;
        assert!(s.is_closed());
        assert!(matches!(s.get("people", "x").await, Err(StoreError::Closed)));
    }
}

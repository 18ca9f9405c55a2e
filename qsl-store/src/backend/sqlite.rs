//! SQLite driver: one database file per store database, documents kept as
//! JSON text in a single table. Unique indexes become partial expression
//! indexes over `json_extract`, which skip rows whose value is NULL.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tracing::{debug, info};

use super::{require_database, CollectionSpec, DocumentStore, IndexSpec, StoreDriver};
use crate::error::{StoreError, StoreResult};
use crate::ids::object_id;
use crate::query::{Document, Filter, Query, ID_FIELD};
use crate::uri::StoreUri;

const MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Default, Clone)]
pub struct SqliteDriver;

impl SqliteDriver {
    pub fn new() -> Self {
        Self
    }
}

/// `sqlite://data/radio-card-system` opens `data/radio-card-system.sqlite3`.
fn database_path(uri: &StoreUri) -> StoreResult<PathBuf> {
    let name = require_database(uri)?;
    if name.contains(['/', '\\']) || name.starts_with('.') {
        return Err(StoreError::InvalidUri(format!("bad database name `{name}`")));
    }
    Ok(PathBuf::from(uri.location()).join(format!("{name}.sqlite3")))
}

#[async_trait]
impl StoreDriver for SqliteDriver {
    async fn connect(&self, uri: &StoreUri) -> StoreResult<Arc<dyn DocumentStore>> {
        let name = require_database(uri)?.to_string();
        let path = database_path(uri)?;

        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| StoreError::Connection(format!("{}: {e}", dir.display())))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                body TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            )",
        )
        .execute(&pool)
        .await
        .map_err(|e| StoreError::Connection(e.to_string()))?;

        info!(database = %name, path = %path.display(), "sqlite store connected");

        Ok(Arc::new(SqliteStore {
            name,
            pool,
            known: RwLock::new(HashSet::new()),
            closed: AtomicBool::new(false),
        }))
    }
}

pub struct SqliteStore {
    name: String,
    pool: SqlitePool,
    known: RwLock<HashSet<String>>,
    closed: AtomicBool,
}

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn write_error(collection: &str, e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Duplicate {
            collection: collection.to_string(),
            index: db.message().to_string(),
        },
        _ => backend(e),
    }
}

fn json_path(field: &str) -> String {
    format!("$.\"{}\"", field.replace('"', "\\\""))
}

fn index_sql(collection: &str, index: &IndexSpec) -> String {
    let columns = index
        .fields
        .iter()
        .map(|f| format!("json_extract(body, '$.{f}')"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "CREATE {unique}INDEX IF NOT EXISTS \"ix_{collection}_{name}\" ON documents ({columns}) WHERE collection = '{collection}'",
        unique = if index.unique { "UNIQUE " } else { "" },
        name = index.name,
    )
}

fn parse_body(body: &str) -> StoreResult<Document> {
    Ok(serde_json::from_str(body)?)
}

impl SqliteStore {
    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }

    fn ensure_known(&self, collection: &str) -> StoreResult<()> {
        self.ensure_open()?;
        if self.known.read().contains(collection) {
            Ok(())
        } else {
            Err(StoreError::UnknownCollection(collection.to_string()))
        }
    }

    async fn all_documents(&self, collection: &str) -> StoreResult<Vec<Document>> {
        let rows = sqlx::query("SELECT body FROM documents WHERE collection = ?1 ORDER BY id")
            .bind(collection)
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        rows.iter()
            .map(|row| parse_body(row.get::<&str, _>("body")))
            .collect()
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    fn database(&self) -> &str {
        &self.name
    }

    async fn ensure_collection(&self, spec: &CollectionSpec) -> StoreResult<()> {
        self.ensure_open()?;
        for index in spec.indexes {
            sqlx::query(&index_sql(spec.name, index))
                .execute(&self.pool)
                .await
                .map_err(|e| write_error(spec.name, e))?;
        }
        self.known.write().insert(spec.name.to_string());
        debug!(database = %self.name, collection = spec.name, "collection ensured");
        Ok(())
    }

    async fn insert(&self, collection: &str, mut doc: Document) -> StoreResult<Document> {
        self.ensure_known(collection)?;
        let id = match doc.get(ID_FIELD) {
            Some(Value::String(id)) => id.clone(),
            _ => object_id(),
        };
        doc.insert(ID_FIELD.to_string(), Value::String(id.clone()));
        let body = serde_json::to_string(&doc)?;

        sqlx::query("INSERT INTO documents (collection, id, body) VALUES (?1, ?2, ?3)")
            .bind(collection)
            .bind(&id)
            .bind(body)
            .execute(&self.pool)
            .await
            .map_err(|e| write_error(collection, e))?;
        Ok(doc)
    }

    async fn find(&self, collection: &str, query: &Query) -> StoreResult<Vec<Document>> {
        self.ensure_known(collection)?;
        Ok(query.apply(self.all_documents(collection).await?))
    }

    async fn count(&self, collection: &str, filter: &Filter) -> StoreResult<usize> {
        self.ensure_known(collection)?;
        if filter.is_empty() {
            let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE collection = ?1")
                .bind(collection)
                .fetch_one(&self.pool)
                .await
                .map_err(backend)?;
            return Ok(n.max(0) as usize);
        }
        Ok(self
            .all_documents(collection)
            .await?
            .iter()
            .filter(|d| filter.matches(d))
            .count())
    }

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        self.ensure_known(collection)?;
        let body: Option<String> =
            sqlx::query_scalar("SELECT body FROM documents WHERE collection = ?1 AND id = ?2")
                .bind(collection)
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(backend)?;
        body.as_deref().map(parse_body).transpose()
    }

    async fn replace(&self, collection: &str, id: &str, mut doc: Document) -> StoreResult<Option<Document>> {
        self.ensure_known(collection)?;
        doc.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
        let body = serde_json::to_string(&doc)?;

        let done = sqlx::query("UPDATE documents SET body = ?1 WHERE collection = ?2 AND id = ?3")
            .bind(body)
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| write_error(collection, e))?;
        Ok((done.rows_affected() > 0).then_some(doc))
    }

    async fn patch(&self, collection: &str, id: &str, changes: Document) -> StoreResult<Option<Document>> {
        self.ensure_known(collection)?;
        let changes: Vec<(String, Value)> = changes
            .into_iter()
            .filter(|(k, _)| k != ID_FIELD)
            .collect();
        if changes.is_empty() {
            return self.get(collection, id).await;
        }

        // json_set(body, path1, json(value1), path2, json(value2), ...)
        let setters = (0..changes.len())
            .map(|i| format!("?{}, json(?{})", 3 + i * 2, 4 + i * 2))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE documents SET body = json_set(body, {setters}) \
             WHERE collection = ?1 AND id = ?2 RETURNING body"
        );

        let mut q = sqlx::query_scalar::<_, String>(&sql).bind(collection).bind(id);
        for (field, value) in &changes {
            q = q.bind(json_path(field)).bind(serde_json::to_string(value)?);
        }

        let body = q
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| write_error(collection, e))?;
        body.as_deref().map(parse_body).transpose()
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        self.ensure_known(collection)?;
        let body: Option<String> =
            sqlx::query_scalar("DELETE FROM documents WHERE collection = ?1 AND id = ?2 RETURNING body")
                .bind(collection)
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(backend)?;
        body.as_deref().map(parse_body).transpose()
    }

    async fn increment(&self, collection: &str, id: &str, field: &str, by: i64) -> StoreResult<i64> {
        self.ensure_known(collection)?;
        let value: i64 = sqlx::query_scalar(
            "INSERT INTO documents (collection, id, body) \
             VALUES (?1, ?2, json_object('_id', ?2, ?3, ?4)) \
             ON CONFLICT (collection, id) DO UPDATE \
             SET body = json_set(body, ?5, COALESCE(json_extract(body, ?5), 0) + ?4) \
             RETURNING CAST(json_extract(body, ?5) AS INTEGER)",
        )
        .bind(collection)
        .bind(id)
        .bind(field)
        .bind(by)
        .bind(json_path(field))
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;
        Ok(value)
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.pool.close().await;
            debug!(database = %self.name, "sqlite store closed");
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

    const TAGS: CollectionSpec = CollectionSpec {
        name: "tags",
        indexes: &[IndexSpec {
            name: "name",
            fields: &["name"],
            unique: true,
        }],
    };

    fn temp_uri() -> StoreUri {
        let dir = std::env::temp_dir().join(format!("qsl-sqlite-{}", object_id()));
        StoreUri::parse(&format!("sqlite://{}/vault", dir.display())).unwrap()
    }

    fn doc(v: Value) -> Document {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn documents_round_trip_through_sqlite() {
        let store = SqliteDriver::new().connect(&temp_uri()).await.unwrap();
        store.ensure_collection(&TAGS).await.unwrap();
        store.ensure_collection(&TAGS).await.unwrap();

        let dx = store.insert("tags", doc(json!({"name": "DX", "count": 0}))).await.unwrap();
        let id = dx[ID_FIELD].as_str().unwrap().to_string();

        let dup = store.insert("tags", doc(json!({"name": "DX"}))).await.unwrap_err();
        assert!(matches!(dup, StoreError::Duplicate { .. }));

        let patched = store
            .patch("tags", &id, doc(json!({"color": "#ff0000", "meta": {"a": [1, 2]}})))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(patched["name"], "DX");
        assert_eq!(patched["meta"], json!({"a": [1, 2]}));

        let found = store
            .find("tags", &Query::new(Filter::new().eq("color", "#ff0000")))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);

        assert_eq!(store.increment("tags", "counter", "seq", 1).await.unwrap(), 1);
        assert_eq!(store.increment("tags", "counter", "seq", 2).await.unwrap(), 3);

        assert!(store.delete("tags", &id).await.unwrap().is_some());
        assert!(store.get("tags", &id).await.unwrap().is_none());

        store.close().await;
        assert!(matches!(store.get("tags", &id).await, Err(StoreError::Closed)));
    }
}

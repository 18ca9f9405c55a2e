use std::sync::Arc;

use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use qsl_core::errors::QslError;
use qsl_core::{Page, TenantContext};
use qsl_core::ServiceCapabilities;
use qsl_store::{object_id, Collection, Document, Filter, Query, RecordType, SortOrder, ID_FIELD};
use serde_json::Value;

use crate::services::{VaultParams, VaultState};

/// RFC 3339 in UTC with millisecond precision, so timestamps sort as strings.
pub fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn into_document(data: Value) -> Result<Document> {
    match data {
        Value::Object(doc) => Ok(doc),
        _ => Err(QslError::bad_request("Request body must be a JSON object").into_anyhow()),
    }
}

pub fn require_id<'a>(id: Option<&'a str>, msg: &'static str) -> Result<&'a str> {
    id.map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| QslError::bad_request(msg).into_anyhow())
}

pub fn str_field<'a>(doc: &'a Document, key: &str) -> Option<&'a str> {
    doc.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// String entries of an array field; other shapes yield nothing.
pub fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// `"true"` / `"false"` become booleans, anything else stays a string.
pub fn bool_query(raw: &str) -> Value {
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        other => Value::String(other.to_string()),
    }
}

/// How `find` turns query parameters into a filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct Listing {
    /// Paths searched by `?search=`
    pub search: &'static [&'static str],
    /// `(query key, document path)` equality filters
    pub filters: &'static [(&'static str, &'static str)],
    /// Path compared against `?startDate=` / `?endDate=`
    pub date_range: Option<&'static str>,
}

/// Generic CRUD over one record type of the caller's tenant database.
pub struct TenantCrud {
    pub state: Arc<VaultState>,
    pub record: RecordType,
    /// Record name used in error messages ("Card not found")
    pub what: &'static str,
    pub listing: Listing,
    pub capabilities: ServiceCapabilities,
}

impl TenantCrud {
    pub fn new(state: Arc<VaultState>, record: RecordType, what: &'static str) -> Self {
        Self {
            state,
            record,
            what,
            listing: Listing::default(),
            capabilities: ServiceCapabilities::standard_crud(),
        }
    }

    pub fn with_listing(mut self, listing: Listing) -> Self {
        self.listing = listing;
        self
    }

    pub fn with_capabilities(mut self, capabilities: ServiceCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub async fn collection(&self, ctx: &TenantContext) -> Result<Collection> {
        Ok(self.state.tenant(ctx).await?.collection(self.record))
    }

    pub async fn require(&self, ctx: &TenantContext, id: &str) -> Result<Document> {
        self.collection(ctx).await?.require(id, self.what).await
    }

    fn not_found(&self) -> anyhow::Error {
        QslError::not_found(format!("{} not found", self.what)).into_anyhow()
    }

    /// Search, equality and date filters from the query string.
    pub fn filter_from(&self, params: &VaultParams) -> Filter {
        let rest = &params.inner;
        let mut filter = Filter::new();

        if let Some(needle) = rest.query_value("search") {
            filter = filter.search(self.listing.search, needle);
        }
        for (key, path) in self.listing.filters {
            if let Some(raw) = rest.query_value(key) {
                filter = filter.eq(path, bool_query(raw));
            }
        }
        if let Some(path) = self.listing.date_range {
            if let Some(start) = rest.query_value("startDate") {
                filter = filter.gte(path, start);
            }
            if let Some(end) = rest.query_value("endDate") {
                let end = if end.len() == 10 {
                    format!("{end}T23:59:59.999Z")
                } else {
                    end.to_string()
                };
                filter = filter.lte(path, end);
            }
        }
        filter
    }

    /// One page of `filter`, ordered by `?sort=`/`?order=` or newest first.
    pub async fn find_with(
        &self,
        ctx: &TenantContext,
        filter: Filter,
        params: &VaultParams,
    ) -> Result<Page<Value>> {
        let rest = &params.inner;
        let (page, limit) = self
            .state
            .paginate
            .resolve(rest.query_value("page"), rest.query_value("limit"));

        let coll = self.collection(ctx).await?;
        let total = coll.count(&filter).await?;

        let query = match rest.query_value("sort") {
            Some(field) => {
                let order = match rest.query_value("order") {
                    Some("asc") => SortOrder::Asc,
                    _ => SortOrder::Desc,
                };
                Query::new(filter)
                    .sort_by(field, order)
                    .sort_by(ID_FIELD, SortOrder::Desc)
            }
            None => Query::newest_first(filter),
        };
        let docs = coll.find(&query.page((page - 1) * limit, limit)).await?;

        Ok(Page {
            data: docs.into_iter().map(Value::Object).collect(),
            total,
            page,
            limit,
        })
    }

    /// Every record matching `filter`, newest first.
    pub async fn all(&self, ctx: &TenantContext, filter: Filter) -> Result<Vec<Document>> {
        self.collection(ctx)
            .await?
            .find(&Query::newest_first(filter))
            .await
    }

    pub async fn _find(&self, ctx: &TenantContext, params: VaultParams) -> Result<Page<Value>> {
        let filter = self.filter_from(&params);
        self.find_with(ctx, filter, &params).await
    }

    pub async fn _get(&self, ctx: &TenantContext, id: &str, _params: VaultParams) -> Result<Value> {
        Ok(Value::Object(self.require(ctx, id).await?))
    }

    pub async fn _create(&self, ctx: &TenantContext, data: Value, _params: VaultParams) -> Result<Value> {
        let mut doc = into_document(data)?;
        let ts = now();
        doc.insert(ID_FIELD.to_string(), Value::String(object_id()));
        doc.insert("createdAt".to_string(), Value::String(ts.clone()));
        doc.insert("updatedAt".to_string(), Value::String(ts));

        let created = self.collection(ctx).await?.insert(doc).await?;
        Ok(Value::Object(created))
    }

    /// Full replace; id and `createdAt` survive.
    pub async fn _update(
        &self,
        ctx: &TenantContext,
        id: &str,
        data: Value,
        _params: VaultParams,
    ) -> Result<Value> {
        let coll = self.collection(ctx).await?;
        let existing = coll.require(id, self.what).await?;

        let mut doc = into_document(data)?;
        doc.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
        doc.insert(
            "createdAt".to_string(),
            existing.get("createdAt").cloned().unwrap_or(Value::Null),
        );
        doc.insert("updatedAt".to_string(), Value::String(now()));

        coll.replace(id, doc)
            .await?
            .map(Value::Object)
            .ok_or_else(|| self.not_found())
    }

    /// Top-level merge.
    pub async fn _patch(
        &self,
        ctx: &TenantContext,
        id: Option<&str>,
        data: Value,
        _params: VaultParams,
    ) -> Result<Value> {
        let id = require_id(id, "Patch requires an id")?;
        let mut changes = into_document(data)?;
        changes.remove(ID_FIELD);
        changes.remove("createdAt");
        changes.insert("updatedAt".to_string(), Value::String(now()));

        self.collection(ctx)
            .await?
            .patch(id, changes)
            .await?
            .map(Value::Object)
            .ok_or_else(|| self.not_found())
    }

    pub async fn _remove(
        &self,
        ctx: &TenantContext,
        id: Option<&str>,
        _params: VaultParams,
    ) -> Result<Value> {
        let id = require_id(id, "Remove requires an id")?;
        self.collection(ctx)
            .await?
            .delete(id)
            .await?
            .map(Value::Object)
            .ok_or_else(|| self.not_found())
    }

    pub async fn _custom(
        &self,
        _ctx: &TenantContext,
        method: &str,
        _id: Option<&str>,
        _data: Option<Value>,
        _params: VaultParams,
    ) -> Result<Value> {
        Err(QslError::method_not_allowed(format!("Method not allowed: {method}")).into_anyhow())
    }
}

qsl_core::qsl_adapter!(TenantCrud, Value, VaultParams);

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use qsl_core::errors::QslError;
use qsl_core::tenant::TenantContext;
use qsl_core::{Page, QslService, ServiceCapabilities};
use qsl_store::{Collection, Document, Filter, Query, RecordType, SortOrder, TenantHandle, ID_FIELD};
use serde_json::{json, Value};

use crate::services::adapters::{into_document, now, require_id, str_field, TenantCrud};
use crate::services::cards::cards_service::docs;
use crate::services::{VaultParams, VaultState};

use super::categories_shared;

pub struct CategoriesService {
    pub crud: TenantCrud,
}

fn parent_value(parent: Option<&str>) -> Value {
    parent.map_or(Value::Null, |p| Value::String(p.to_string()))
}

fn level_of(doc: &Document) -> i64 {
    doc.get("level").and_then(Value::as_i64).unwrap_or(0)
}

/// `Some(None)` when the body sets the parent to null, `None` when it does not mention it.
fn requested_parent(doc: &Document) -> Option<Option<String>> {
    match doc.get("parentId") {
        None => None,
        Some(Value::String(s)) if !s.trim().is_empty() => Some(Some(s.trim().to_string())),
        Some(_) => Some(None),
    }
}

async fn children_of(categories: &Collection, id: &str) -> Result<Vec<Document>> {
    let query = Query::new(Filter::new().eq("parentId", id)).sort_by("name", SortOrder::Asc);
    categories.find(&query).await
}

/// Every category below `id`, breadth first.
async fn descendants_of(categories: &Collection, id: &str) -> Result<Vec<Document>> {
    let mut out = Vec::new();
    let mut queue = vec![id.to_string()];
    let mut seen = HashSet::from([id.to_string()]);

    while let Some(current) = queue.pop() {
        for child in children_of(categories, &current).await? {
            if let Some(child_id) = str_field(&child, ID_FIELD) {
                if seen.insert(child_id.to_string()) {
                    queue.insert(0, child_id.to_string());
                    out.push(child);
                }
            }
        }
    }
    Ok(out)
}

async fn ensure_unique_sibling(
    categories: &Collection,
    parent: Option<&str>,
    name: &str,
    except: Option<&str>,
) -> Result<()> {
    let mut filter = Filter::new()
        .eq("parentId", parent_value(parent))
        .eq("name", name);
    if let Some(id) = except {
        filter = filter.ne(ID_FIELD, id);
    }
    if categories.count(&filter).await? > 0 {
        return Err(QslError::bad_request("Category already exists").into_anyhow());
    }
    Ok(())
}

/// Level a child of `parent` gets.
async fn level_under(categories: &Collection, parent: Option<&str>) -> Result<i64> {
    match parent {
        None => Ok(0),
        Some(p) => {
            let parent = categories
                .get(p)
                .await?
                .ok_or_else(|| QslError::bad_request("Parent category not found").into_anyhow())?;
            Ok(level_of(&parent) + 1)
        }
    }
}

impl CategoriesService {
    pub fn new(state: Arc<VaultState>) -> Self {
        Self {
            crud: TenantCrud::new(state, RecordType::Category, "Category")
                .with_listing(categories_shared::LISTING)
                .with_capabilities(categories_shared::capabilities()),
        }
    }

    async fn tenant(&self, ctx: &TenantContext) -> Result<TenantHandle> {
        self.crud.state.tenant(ctx).await
    }

    /// Root first, ending with the category itself.
    async fn path(&self, ctx: &TenantContext, id: &str) -> Result<Value> {
        let categories = self.tenant(ctx).await?.categories();
        let mut chain = vec![categories.require(id, "Category").await?];
        let mut seen = HashSet::from([id.to_string()]);

        while let Some(parent) = chain.last().and_then(|c| str_field(c, "parentId")).map(str::to_string) {
            if !seen.insert(parent.clone()) {
                break;
            }
            match categories.get(&parent).await? {
                Some(doc) => chain.push(doc),
                None => break,
            }
        }
        chain.reverse();
        Ok(docs(chain))
    }

    async fn move_to(&self, ctx: &TenantContext, id: &str, data: &Value) -> Result<Value> {
        let tenant = self.tenant(ctx).await?;
        let categories = tenant.categories();
        let category = categories.require(id, "Category").await?;

        let target = match data.get("parentId") {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Some(Value::Null) | None => None,
            Some(_) => return Err(QslError::bad_request("parentId must be a string or null").into_anyhow()),
        };
        self.relocate(&categories, &category, id, target.as_deref()).await?;
        Ok(Value::Object(categories.require(id, "Category").await?))
    }

    /// Re-parent `id` and shift the levels of its subtree.
    async fn relocate(
        &self,
        categories: &Collection,
        category: &Document,
        id: &str,
        target: Option<&str>,
    ) -> Result<()> {
        let descendants = descendants_of(categories, id).await?;
        if let Some(t) = target {
            let into_subtree = t == id
                || descendants
                    .iter()
                    .any(|d| str_field(d, ID_FIELD) == Some(t));
            if into_subtree {
                return Err(QslError::bad_request(
                    "Cannot move a category into its own subtree",
                )
                .into_anyhow());
            }
        }

        let name = str_field(category, "name").unwrap_or_default();
        ensure_unique_sibling(categories, target, name, Some(id)).await?;

        let level = level_under(categories, target).await?;
        let delta = level - level_of(category);
        let changes = into_document(json!({
            "parentId": parent_value(target),
            "level": level,
            "updatedAt": now(),
        }))?;
        categories.patch(id, changes).await?;

        if delta != 0 {
            for d in &descendants {
                if let Some(d_id) = str_field(d, ID_FIELD) {
                    categories
                        .set(d_id, "level", Value::from(level_of(d) + delta))
                        .await?;
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl QslService<Value, VaultParams> for CategoriesService {
    fn capabilities(&self) -> ServiceCapabilities {
        categories_shared::capabilities()
    }

    async fn find(&self, ctx: &TenantContext, params: VaultParams) -> Result<Page<Value>> {
        let mut filter = self.crud.filter_from(&params);
        if params.inner.query_value("root") == Some("true") {
            filter = filter.eq("parentId", Value::Null);
        }
        self.crud.find_with(ctx, filter, &params).await
    }

    async fn get(&self, ctx: &TenantContext, id: &str, params: VaultParams) -> Result<Value> {
        self.crud._get(ctx, id, params).await
    }

    async fn create(&self, ctx: &TenantContext, data: Value, params: VaultParams) -> Result<Value> {
        let categories = self.tenant(ctx).await?.categories();
        let mut doc = into_document(data)?;
        let parent = requested_parent(&doc).flatten();

        let level = level_under(&categories, parent.as_deref()).await?;
        let name = str_field(&doc, "name").unwrap_or_default().to_string();
        ensure_unique_sibling(&categories, parent.as_deref(), &name, None).await?;

        doc.insert("parentId".to_string(), parent_value(parent.as_deref()));
        doc.insert("level".to_string(), Value::from(level));
        self.crud._create(ctx, Value::Object(doc), params).await
    }

    async fn update(&self, ctx: &TenantContext, id: &str, data: Value, params: VaultParams) -> Result<Value> {
        let categories = self.tenant(ctx).await?.categories();
        let existing = categories.require(id, "Category").await?;
        let mut doc = into_document(data)?;

        let parent = requested_parent(&doc).flatten();
        if parent.as_deref() != str_field(&existing, "parentId") {
            self.relocate(&categories, &existing, id, parent.as_deref()).await?;
        }
        let moved = categories.require(id, "Category").await?;

        let name = str_field(&doc, "name").unwrap_or_default().to_string();
        ensure_unique_sibling(&categories, parent.as_deref(), &name, Some(id)).await?;
        doc.insert("parentId".to_string(), parent_value(parent.as_deref()));
        doc.insert("level".to_string(), Value::from(level_of(&moved)));
        self.crud._update(ctx, id, Value::Object(doc), params).await
    }

    async fn patch(
        &self,
        ctx: &TenantContext,
        id: Option<&str>,
        data: Value,
        params: VaultParams,
    ) -> Result<Value> {
        let id = require_id(id, "Patch requires an id")?;
        let categories = self.tenant(ctx).await?.categories();
        let existing = categories.require(id, "Category").await?;
        let mut doc = into_document(data)?;

        let parent = match requested_parent(&doc) {
            Some(target) => {
                doc.remove("parentId");
                if target.as_deref() != str_field(&existing, "parentId") {
                    self.relocate(&categories, &existing, id, target.as_deref()).await?;
                }
                target
            }
            None => str_field(&existing, "parentId").map(str::to_string),
        };

        if let Some(name) = str_field(&doc, "name") {
            ensure_unique_sibling(&categories, parent.as_deref(), name, Some(id)).await?;
        }
        self.crud._patch(ctx, Some(id), Value::Object(doc), params).await
    }

    async fn remove(&self, ctx: &TenantContext, id: Option<&str>, params: VaultParams) -> Result<Value> {
        let id = require_id(id, "Remove requires an id")?;
        let tenant = self.tenant(ctx).await?;
        tenant.categories().require(id, "Category").await?;

        if tenant.categories().count(&Filter::new().eq("parentId", id)).await? > 0 {
            return Err(QslError::bad_request("Category has subcategories").into_anyhow());
        }
        if tenant.cards().count(&Filter::new().eq("categories", id)).await? > 0 {
            return Err(QslError::bad_request("Category is still used by cards").into_anyhow());
        }
        self.crud._remove(ctx, Some(id), params).await
    }

    async fn custom(
        &self,
        ctx: &TenantContext,
        method: &str,
        id: Option<&str>,
        data: Option<Value>,
        params: VaultParams,
    ) -> Result<Value> {
        let id = require_id(id, "Category id is required")?;
        match method {
            "path" => self.path(ctx, id).await,
            "children" => {
                let categories = self.tenant(ctx).await?.categories();
                categories.require(id, "Category").await?;
                Ok(docs(children_of(&categories, id).await?))
            }
            "descendants" => {
                let categories = self.tenant(ctx).await?.categories();
                categories.require(id, "Category").await?;
                Ok(docs(descendants_of(&categories, id).await?))
            }
            "move" => self.move_to(ctx, id, &data.unwrap_or(Value::Null)).await,
            _ => self.crud._custom(ctx, method, Some(id), data, params).await,
        }
    }
}

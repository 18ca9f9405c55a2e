use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use qsl_core::errors::QslError;
use qsl_core::tenant::TenantContext;
use qsl_core::{Page, QslService, ServiceCapabilities};
use qsl_store::{Collection, Filter, Query, RecordType, SortOrder, ID_FIELD};
use serde_json::{json, Value};
use tracing::debug;

use crate::services::adapters::{now, require_id, str_field, string_list, TenantCrud};
use crate::services::cards::cards_service::docs;
use crate::services::{VaultParams, VaultState};

use super::tags_shared;

pub struct TagsService {
    pub crud: TenantCrud,
}

async fn ensure_unique_name(tags: &Collection, name: &str, except: Option<&str>) -> Result<()> {
    let mut filter = Filter::new().eq("name", name);
    if let Some(id) = except {
        filter = filter.ne(ID_FIELD, id);
    }
    if tags.count(&filter).await? > 0 {
        return Err(QslError::bad_request("Tag already exists").into_anyhow());
    }
    Ok(())
}

impl TagsService {
    pub fn new(state: Arc<VaultState>) -> Self {
        Self {
            crud: TenantCrud::new(state, RecordType::Tag, "Tag")
                .with_listing(tags_shared::LISTING)
                .with_capabilities(tags_shared::capabilities()),
        }
    }

    async fn stats(&self, ctx: &TenantContext) -> Result<Value> {
        let tags = self.crud.collection(ctx).await?;
        let query = Query::new(Filter::new())
            .sort_by("count", SortOrder::Desc)
            .sort_by("name", SortOrder::Asc);
        let all = tags.find(&query).await?;
        Ok(json!({
            "total": all.len(),
            "tags": docs(all),
        }))
    }
}

#[async_trait]
impl QslService<Value, VaultParams> for TagsService {
    fn capabilities(&self) -> ServiceCapabilities {
        tags_shared::capabilities()
    }

    async fn find(&self, ctx: &TenantContext, params: VaultParams) -> Result<Page<Value>> {
        self.crud._find(ctx, params).await
    }

    async fn get(&self, ctx: &TenantContext, id: &str, params: VaultParams) -> Result<Value> {
        self.crud._get(ctx, id, params).await
    }

    async fn create(&self, ctx: &TenantContext, data: Value, params: VaultParams) -> Result<Value> {
        let tags = self.crud.collection(ctx).await?;
        let name = data.get("name").and_then(Value::as_str).unwrap_or_default();
        ensure_unique_name(&tags, name, None).await?;
        self.crud._create(ctx, data, params).await
    }

    async fn update(&self, ctx: &TenantContext, id: &str, mut data: Value, params: VaultParams) -> Result<Value> {
        let tags = self.crud.collection(ctx).await?;
        let existing = tags.require(id, "Tag").await?;
        let name = data.get("name").and_then(Value::as_str).unwrap_or_default();
        ensure_unique_name(&tags, name, Some(id)).await?;

        if let Some(obj) = data.as_object_mut() {
            obj.insert("count".to_string(), existing.get("count").cloned().unwrap_or(json!(0)));
            obj.entry("color")
                .or_insert_with(|| json!(super::tags_schema::DEFAULT_COLOR));
        }
        self.crud._update(ctx, id, data, params).await
    }

    async fn patch(
        &self,
        ctx: &TenantContext,
        id: Option<&str>,
        data: Value,
        params: VaultParams,
    ) -> Result<Value> {
        let id = require_id(id, "Patch requires an id")?;
        if let Some(name) = data.get("name").and_then(Value::as_str) {
            let tags = self.crud.collection(ctx).await?;
            ensure_unique_name(&tags, name, Some(id)).await?;
        }
        self.crud._patch(ctx, Some(id), data, params).await
    }

    async fn remove(&self, ctx: &TenantContext, id: Option<&str>, params: VaultParams) -> Result<Value> {
        let id = require_id(id, "Remove requires an id")?;
        let tenant = self.crud.state.tenant(ctx).await?;
        tenant.tags().require(id, "Tag").await?;

        let cards = tenant.cards();
        let tagged = cards
            .find(&Query::new(Filter::new().eq("tags", id)))
            .await?;
        for card in &tagged {
            let Some(card_id) = str_field(card, ID_FIELD) else {
                continue;
            };
            let remaining: Vec<Value> = string_list(card.get("tags"))
                .into_iter()
                .filter(|t| t != id)
                .map(Value::String)
                .collect();
            cards.set(card_id, "tags", Value::Array(remaining)).await?;
            cards.set(card_id, "updatedAt", Value::String(now())).await?;
        }
        debug!(tag = %id, cards = tagged.len(), "tag pulled from cards");

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
        match method {
            "stats" => self.stats(ctx).await,
            _ => self.crud._custom(ctx, method, id, data, params).await,
        }
    }
}

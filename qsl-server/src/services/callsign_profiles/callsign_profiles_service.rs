use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use qsl_core::errors::QslError;
use qsl_core::tenant::TenantContext;
use qsl_core::{Page, QslService, ServiceCapabilities};
use qsl_store::{Document, Filter, Query, RecordType, TenantHandle, ID_FIELD};
use serde_json::{json, Value};
use tracing::info;

use crate::services::adapters::{into_document, now, require_id, str_field, TenantCrud};
use crate::services::{VaultParams, VaultState};

use super::callsign_profiles_shared;

/// Id accepted by `get` for the default profile.
pub const DEFAULT_ALIAS: &str = "default";

pub struct CallsignProfilesService {
    pub crud: TenantCrud,
}

async fn ensure_unique_name(tenant: &TenantHandle, name: &str, except: Option<&str>) -> Result<()> {
    let mut filter = Filter::new().eq("callsignName", name);
    if let Some(id) = except {
        filter = filter.ne(ID_FIELD, id);
    }
    if tenant.profiles().count(&filter).await? > 0 {
        return Err(QslError::bad_request("Callsign profile already exists").into_anyhow());
    }
    Ok(())
}

/// Leave `id` as the only default profile.
async fn clear_other_defaults(tenant: &TenantHandle, id: &str) -> Result<()> {
    let profiles = tenant.profiles();
    let others = profiles
        .find(&Query::new(Filter::new().eq("isDefault", true).ne(ID_FIELD, id)))
        .await?;
    for other in others {
        if let Some(other_id) = str_field(&other, ID_FIELD) {
            profiles.set(other_id, "isDefault", Value::Bool(false)).await?;
        }
    }
    Ok(())
}

fn is_default(doc: &Document) -> bool {
    doc.get("isDefault").and_then(Value::as_bool).unwrap_or(false)
}

impl CallsignProfilesService {
    pub fn new(state: Arc<VaultState>) -> Self {
        Self {
            crud: TenantCrud::new(state, RecordType::CallsignProfile, "Callsign profile")
                .with_listing(callsign_profiles_shared::LISTING)
                .with_capabilities(callsign_profiles_shared::capabilities()),
        }
    }

    async fn tenant(&self, ctx: &TenantContext) -> Result<TenantHandle> {
        self.crud.state.tenant(ctx).await
    }

    async fn after_write(&self, tenant: &TenantHandle, saved: &Value) -> Result<()> {
        if let Value::Object(doc) = saved {
            if is_default(doc) {
                if let Some(id) = str_field(doc, ID_FIELD) {
                    clear_other_defaults(tenant, id).await?;
                }
            }
        }
        Ok(())
    }

    async fn set_default(&self, ctx: &TenantContext, id: &str) -> Result<Value> {
        let tenant = self.tenant(ctx).await?;
        tenant.profiles().require(id, "Callsign profile").await?;
        let changes = into_document(json!({"isDefault": true, "updatedAt": now()}))?;
        let profile = tenant
            .profiles()
            .patch(id, changes)
            .await?
            .ok_or_else(|| QslError::not_found("Callsign profile not found").into_anyhow())?;
        clear_other_defaults(&tenant, id).await?;
        info!(tenant = %tenant.name(), profile = %id, "default callsign profile changed");
        Ok(Value::Object(profile))
    }
}

#[async_trait]
impl QslService<Value, VaultParams> for CallsignProfilesService {
    fn capabilities(&self) -> ServiceCapabilities {
        callsign_profiles_shared::capabilities()
    }

    async fn find(&self, ctx: &TenantContext, params: VaultParams) -> Result<Page<Value>> {
        self.crud._find(ctx, params).await
    }

    async fn get(&self, ctx: &TenantContext, id: &str, params: VaultParams) -> Result<Value> {
        if id != DEFAULT_ALIAS {
            return self.crud._get(ctx, id, params).await;
        }
        let tenant = self.tenant(ctx).await?;
        tenant
            .profiles()
            .find_one(Filter::new().eq("isDefault", true))
            .await?
            .map(Value::Object)
            .ok_or_else(|| QslError::not_found("Default callsign profile not found").into_anyhow())
    }

    async fn create(&self, ctx: &TenantContext, data: Value, params: VaultParams) -> Result<Value> {
        let tenant = self.tenant(ctx).await?;
        let mut doc = into_document(data)?;
        if let Some(name) = str_field(&doc, "callsignName") {
            ensure_unique_name(&tenant, name, None).await?;
        }

        let first = tenant.profiles().count(&Filter::new()).await? == 0;
        if first || !doc.contains_key("isDefault") {
            doc.insert("isDefault".to_string(), Value::Bool(first));
        }

        let created = self.crud._create(ctx, Value::Object(doc), params).await?;
        self.after_write(&tenant, &created).await?;
        Ok(created)
    }

    async fn update(&self, ctx: &TenantContext, id: &str, data: Value, params: VaultParams) -> Result<Value> {
        let tenant = self.tenant(ctx).await?;
        let doc = into_document(data)?;
        if let Some(name) = str_field(&doc, "callsignName") {
            ensure_unique_name(&tenant, name, Some(id)).await?;
        }
        let saved = self.crud._update(ctx, id, Value::Object(doc), params).await?;
        self.after_write(&tenant, &saved).await?;
        Ok(saved)
    }

    async fn patch(
        &self,
        ctx: &TenantContext,
        id: Option<&str>,
        data: Value,
        params: VaultParams,
    ) -> Result<Value> {
        let id = require_id(id, "Patch requires an id")?;
        let tenant = self.tenant(ctx).await?;
        let doc = into_document(data)?;
        if let Some(name) = str_field(&doc, "callsignName") {
            ensure_unique_name(&tenant, name, Some(id)).await?;
        }
        let saved = self.crud._patch(ctx, Some(id), Value::Object(doc), params).await?;
        self.after_write(&tenant, &saved).await?;
        Ok(saved)
    }

    async fn remove(&self, ctx: &TenantContext, id: Option<&str>, params: VaultParams) -> Result<Value> {
        let id = require_id(id, "Remove requires an id")?;
        let tenant = self.tenant(ctx).await?;
        let profile = tenant.profiles().require(id, "Callsign profile").await?;

        if tenant
            .cards()
            .count(&Filter::new().eq("callsignProfile", id))
            .await?
            > 0
        {
            return Err(
                QslError::bad_request("Callsign profile is still used by cards").into_anyhow(),
            );
        }
        if is_default(&profile) && tenant.profiles().count(&Filter::new()).await? > 1 {
            return Err(QslError::bad_request(
                "Cannot delete the default profile while other profiles exist",
            )
            .into_anyhow());
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
        match method {
            "set-default" => {
                let id = require_id(id, "Callsign profile id is required")?;
                self.set_default(ctx, id).await
            }
            _ => self.crud._custom(ctx, method, id, data, params).await,
        }
    }
}

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use qsl_core::tenant::TenantContext;
use qsl_core::{Page, QslService, ServiceCapabilities};
use qsl_store::{Collection, Filter, Query, RecordType, ID_FIELD};
use serde_json::Value;

use crate::services::adapters::{require_id, str_field, TenantCrud};
use crate::services::{VaultParams, VaultState};

use super::certificates_shared;

pub struct CertificateTemplatesService {
    pub crud: TenantCrud,
}

/// At most one default template per template type.
async fn clear_other_defaults(templates: &Collection, kept: &Value) -> Result<()> {
    let Some(doc) = kept.as_object() else {
        return Ok(());
    };
    if doc.get("isDefault") != Some(&Value::Bool(true)) {
        return Ok(());
    }
    let (Some(id), Some(kind)) = (str_field(doc, ID_FIELD), str_field(doc, "type")) else {
        return Ok(());
    };

    let others = templates
        .find(&Query::new(
            Filter::new()
                .eq("type", kind)
                .eq("isDefault", true)
                .ne(ID_FIELD, id),
        ))
        .await?;
    for other in &others {
        if let Some(other_id) = str_field(other, ID_FIELD) {
            templates.set(other_id, "isDefault", Value::Bool(false)).await?;
        }
    }
    Ok(())
}

impl CertificateTemplatesService {
    pub fn new(state: Arc<VaultState>) -> Self {
        Self {
            crud: TenantCrud::new(state, RecordType::CertificateTemplate, "Certificate template")
                .with_listing(certificates_shared::TEMPLATE_LISTING),
        }
    }
}

#[async_trait]
impl QslService<Value, VaultParams> for CertificateTemplatesService {
    fn capabilities(&self) -> ServiceCapabilities {
        ServiceCapabilities::standard_crud()
    }

    async fn find(&self, ctx: &TenantContext, params: VaultParams) -> Result<Page<Value>> {
        self.crud._find(ctx, params).await
    }

    async fn get(&self, ctx: &TenantContext, id: &str, params: VaultParams) -> Result<Value> {
        self.crud._get(ctx, id, params).await
    }

    async fn create(&self, ctx: &TenantContext, data: Value, params: VaultParams) -> Result<Value> {
        let created = self.crud._create(ctx, data, params).await?;
        clear_other_defaults(&self.crud.collection(ctx).await?, &created).await?;
        Ok(created)
    }

    async fn update(&self, ctx: &TenantContext, id: &str, data: Value, params: VaultParams) -> Result<Value> {
        let updated = self.crud._update(ctx, id, data, params).await?;
        clear_other_defaults(&self.crud.collection(ctx).await?, &updated).await?;
        Ok(updated)
    }

    async fn patch(
        &self,
        ctx: &TenantContext,
        id: Option<&str>,
        data: Value,
        params: VaultParams,
    ) -> Result<Value> {
        let id = require_id(id, "Patch requires an id")?;
        let patched = self.crud._patch(ctx, Some(id), data, params).await?;
        clear_other_defaults(&self.crud.collection(ctx).await?, &patched).await?;
        Ok(patched)
    }

    async fn remove(&self, ctx: &TenantContext, id: Option<&str>, params: VaultParams) -> Result<Value> {
        self.crud._remove(ctx, id, params).await
    }
}

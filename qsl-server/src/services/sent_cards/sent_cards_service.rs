use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use qsl_core::errors::QslError;
use qsl_core::tenant::TenantContext;
use qsl_core::{Page, QslService, ServiceCapabilities};
use qsl_store::{Filter, RecordType};
use serde_json::{json, Value};

use crate::numbering::CardKind;
use crate::services::adapters::{into_document, now, require_id, str_field, TenantCrud};
use crate::services::cards::cards_links;
use crate::services::cards::cards_service::{assign_qr_code, docs, ensure_profile};
use crate::services::rfid::rfid_tags;
use crate::services::{VaultParams, VaultState};

use super::sent_cards_shared;

pub struct SentCardsService {
    pub crud: TenantCrud,
}

impl SentCardsService {
    pub fn new(state: Arc<VaultState>) -> Self {
        Self {
            crud: TenantCrud::new(state, RecordType::SentCard, "Sent card")
                .with_listing(sent_cards_shared::LISTING)
                .with_capabilities(sent_cards_shared::capabilities()),
        }
    }

    fn state(&self) -> &VaultState {
        &self.crud.state
    }

    async fn mark_received(&self, ctx: &TenantContext, id: &str, data: &Value) -> Result<Value> {
        let tenant = self.state().tenant(ctx).await?;
        tenant.sent_cards().require(id, "Sent card").await?;

        let received = data
            .get("receivedDate")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(now);
        let changes = into_document(json!({
            "isReceived": true,
            "receivedDate": received,
            "updatedAt": now(),
        }))?;
        tenant
            .sent_cards()
            .patch(id, changes)
            .await?
            .map(Value::Object)
            .ok_or_else(|| QslError::not_found("Sent card not found").into_anyhow())
    }

    async fn stats(&self, ctx: &TenantContext) -> Result<Value> {
        let coll = self.crud.collection(ctx).await?;
        let total = coll.count(&Filter::new()).await?;
        let received = coll.count(&Filter::new().eq("isReceived", true)).await?;
        let rate = if total == 0 {
            0.0
        } else {
            (received as f64 * 10000.0 / total as f64).round() / 100.0
        };

        Ok(json!({
            "total": total,
            "received": received,
            "pending": total - received,
            "responseRate": rate,
        }))
    }
}

#[async_trait]
impl QslService<Value, VaultParams> for SentCardsService {
    fn capabilities(&self) -> ServiceCapabilities {
        sent_cards_shared::capabilities()
    }

    async fn find(&self, ctx: &TenantContext, params: VaultParams) -> Result<Page<Value>> {
        self.crud._find(ctx, params).await
    }

    async fn get(&self, ctx: &TenantContext, id: &str, params: VaultParams) -> Result<Value> {
        self.crud._get(ctx, id, params).await
    }

    async fn create(&self, ctx: &TenantContext, data: Value, params: VaultParams) -> Result<Value> {
        let tenant = self.state().tenant(ctx).await?;
        let mut doc = into_document(data)?;
        ensure_profile(&tenant, &doc).await?;

        let number = self.state().numbering.next_card_number(CardKind::Sent).await?;
        doc.insert("cardNumber".to_string(), Value::String(number));
        self.crud._create(ctx, Value::Object(doc), params).await
    }

    async fn update(&self, ctx: &TenantContext, id: &str, data: Value, params: VaultParams) -> Result<Value> {
        let tenant = self.state().tenant(ctx).await?;
        let existing = tenant.sent_cards().require(id, "Sent card").await?;
        let mut doc = into_document(data)?;
        ensure_profile(&tenant, &doc).await?;
        for key in ["cardNumber", "qrCode", "receivedCard"] {
            if let Some(v) = existing.get(key) {
                doc.insert(key.to_string(), v.clone());
            }
        }
        self.crud._update(ctx, id, Value::Object(doc), params).await
    }

    async fn patch(
        &self,
        ctx: &TenantContext,
        id: Option<&str>,
        data: Value,
        params: VaultParams,
    ) -> Result<Value> {
        let tenant = self.state().tenant(ctx).await?;
        let doc = into_document(data)?;
        ensure_profile(&tenant, &doc).await?;
        self.crud._patch(ctx, id, Value::Object(doc), params).await
    }

    async fn remove(&self, ctx: &TenantContext, id: Option<&str>, params: VaultParams) -> Result<Value> {
        let tenant = self.state().tenant(ctx).await?;
        let removed = self.crud._remove(ctx, id, params).await?;
        if let Value::Object(doc) = &removed {
            cards_links::detach_sent(&tenant, doc).await?;
        }
        Ok(removed)
    }

    async fn custom(
        &self,
        ctx: &TenantContext,
        method: &str,
        id: Option<&str>,
        data: Option<Value>,
        params: VaultParams,
    ) -> Result<Value> {
        let data = data.unwrap_or(Value::Null);
        if method == "stats" {
            return self.stats(ctx).await;
        }

        let id = require_id(id, "Sent card id is required")?;
        let tenant = self.state().tenant(ctx).await?;
        match method {
            "link-received-card" => {
                let card_id = data
                    .get("cardId")
                    .and_then(Value::as_str)
                    .ok_or_else(|| QslError::bad_request("cardId is required").into_anyhow())?;
                let (_, sent) = cards_links::link(&tenant, card_id, id).await?;
                Ok(Value::Object(sent))
            }
            "unlink-received-card" => Ok(Value::Object(cards_links::unlink_sent(&tenant, id).await?)),
            "find-matching-received-cards" => {
                let sent = tenant.sent_cards().require(id, "Sent card").await?;
                let callsign = str_field(&sent, "callsign").unwrap_or_default();
                Ok(docs(cards_links::matching_received_cards(&tenant, callsign).await?))
            }
            "qrcode" => assign_qr_code(self.state(), &tenant, RecordType::SentCard, id, &data).await,
            "mark-received" => self.mark_received(ctx, id, &data).await,
            "link-rfid" => rfid_tags::link(&tenant, RecordType::SentCard, id, &data).await,
            "unlink-rfid" => rfid_tags::unlink(&tenant, RecordType::SentCard, id, &data).await,
            _ => self.crud._custom(ctx, method, Some(id), Some(data), params).await,
        }
    }
}

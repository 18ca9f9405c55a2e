use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use qsl_core::errors::QslError;
use qsl_core::tenant::TenantContext;
use qsl_core::{Page, QslService, ServiceCapabilities};
use qsl_store::{Document, Filter};
use serde_json::{json, Value};

use crate::services::adapters::require_id;
use crate::services::cards::CardsService;
use crate::services::VaultParams;

use super::eyeball_cards_shared;

/// Cards flagged `eyeballInfo.isEyeball`; every other card is invisible here.
pub struct EyeballCardsService {
    pub cards: Arc<CardsService>,
}

fn is_eyeball(doc: &Document) -> bool {
    doc.get("eyeballInfo")
        .and_then(|i| i.get("isEyeball"))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn eyeball_filter() -> Filter {
    Filter::new().eq("eyeballInfo.isEyeball", true)
}

impl EyeballCardsService {
    pub fn new(cards: Arc<CardsService>) -> Self {
        Self { cards }
    }

    async fn require(&self, ctx: &TenantContext, id: &str) -> Result<Document> {
        let card = self.cards.crud.require(ctx, id).await?;
        if !is_eyeball(&card) {
            return Err(QslError::not_found("Eyeball card not found").into_anyhow());
        }
        Ok(card)
    }

    async fn stats(&self, ctx: &TenantContext) -> Result<Value> {
        let cards = self.cards.crud.all(ctx, eyeball_filter()).await?;

        let mut by_meeting = BTreeMap::<String, usize>::new();
        let mut by_verification = BTreeMap::<String, usize>::new();
        for card in &cards {
            let info = card.get("eyeballInfo");
            let label = |key: &str| {
                info.and_then(|i| i.get(key))
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string()
            };
            *by_meeting.entry(label("meetingType")).or_default() += 1;
            *by_verification.entry(label("verificationMethod")).or_default() += 1;
        }

        Ok(json!({
            "total": cards.len(),
            "byMeetingType": by_meeting,
            "byVerification": by_verification,
        }))
    }
}

#[async_trait]
impl QslService<Value, VaultParams> for EyeballCardsService {
    fn capabilities(&self) -> ServiceCapabilities {
        eyeball_cards_shared::capabilities()
    }

    async fn find(&self, ctx: &TenantContext, params: VaultParams) -> Result<Page<Value>> {
        let filter = self
            .cards
            .crud
            .filter_from(&params)
            .eq("eyeballInfo.isEyeball", true);
        self.cards.crud.find_with(ctx, filter, &params).await
    }

    async fn get(&self, ctx: &TenantContext, id: &str, _params: VaultParams) -> Result<Value> {
        Ok(Value::Object(self.require(ctx, id).await?))
    }

    async fn create(&self, ctx: &TenantContext, data: Value, params: VaultParams) -> Result<Value> {
        self.cards.create_card(ctx, data, params).await
    }

    async fn patch(
        &self,
        ctx: &TenantContext,
        id: Option<&str>,
        data: Value,
        params: VaultParams,
    ) -> Result<Value> {
        let id = require_id(id, "Patch requires an id")?;
        self.require(ctx, id).await?;
        self.cards.patch_card(ctx, Some(id), data, params).await
    }

    async fn remove(&self, ctx: &TenantContext, id: Option<&str>, params: VaultParams) -> Result<Value> {
        let id = require_id(id, "Remove requires an id")?;
        self.require(ctx, id).await?;
        self.cards.remove_card(ctx, Some(id), params).await
    }

    async fn custom(
        &self,
        ctx: &TenantContext,
        method: &str,
        _id: Option<&str>,
        _data: Option<Value>,
        _params: VaultParams,
    ) -> Result<Value> {
        match method {
            "stats" => self.stats(ctx).await,
            _ => Err(QslError::method_not_allowed(format!("Method not allowed: {method}")).into_anyhow()),
        }
    }
}

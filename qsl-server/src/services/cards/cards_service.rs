use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use qsl_core::errors::QslError;
use qsl_core::tenant::TenantContext;
use qsl_core::{Page, QslService, ServiceCapabilities};
use qsl_schema::SchemaErrors;
use qsl_store::{Collection, Document, Filter, RecordType, TenantHandle};
use serde_json::{json, Map, Value};

use crate::numbering::CardKind;
use crate::services::adapters::{into_document, now, require_id, str_field, string_list, TenantCrud};
use crate::services::rfid::rfid_tags;
use crate::services::{VaultParams, VaultState};

use super::{cards_links, cards_schema, cards_shared};

pub struct CardsService {
    pub crud: TenantCrud,
}

async fn bump_tag(tags: &Collection, id: &str, by: i64) -> Result<()> {
    if tags.get(id).await?.is_some() {
        tags.increment(id, "count", by).await?;
    }
    Ok(())
}

/// Keep `tags.count` in step with the tags a card gained or lost.
pub async fn adjust_tag_counts(tenant: &TenantHandle, before: &[String], after: &[String]) -> Result<()> {
    let tags = tenant.tags();
    let before: BTreeSet<&String> = before.iter().collect();
    let after: BTreeSet<&String> = after.iter().collect();
    for id in after.difference(&before) {
        bump_tag(&tags, id, 1).await?;
    }
    for id in before.difference(&after) {
        bump_tag(&tags, id, -1).await?;
    }
    Ok(())
}

pub async fn ensure_profile(tenant: &TenantHandle, doc: &Document) -> Result<()> {
    if let Some(profile) = str_field(doc, "callsignProfile") {
        if tenant.profiles().get(profile).await?.is_none() {
            return Err(QslError::bad_request("Callsign profile not found").into_anyhow());
        }
    }
    Ok(())
}

/// Give a card (received or sent) its QR payload. An existing payload is kept
/// unless `regenerate` is set.
pub async fn assign_qr_code(
    state: &VaultState,
    tenant: &TenantHandle,
    record: RecordType,
    id: &str,
    data: &Value,
) -> Result<Value> {
    let coll = tenant.collection(record);
    let what = match record {
        RecordType::SentCard => "Sent card",
        _ => "Card",
    };
    let card = coll.require(id, what).await?;
    let regenerate = data.get("regenerate").and_then(Value::as_bool).unwrap_or(false);
    if str_field(&card, "qrCode").is_some() && !regenerate {
        return Ok(Value::Object(card));
    }

    let kind = match record {
        RecordType::SentCard => CardKind::Sent,
        _ => CardKind::from_card_type(str_field(&card, "cardType")),
    };
    let payload = state.numbering.next_qr_payload(tenant.name(), kind).await?;
    let changes = into_document(json!({"qrCode": payload, "updatedAt": now()}))?;
    coll.patch(id, changes)
        .await?
        .map(Value::Object)
        .ok_or_else(|| QslError::not_found(format!("{what} not found")).into_anyhow())
}

fn count_by(counts: &mut BTreeMap<String, usize>, doc: &Document, key: &str) {
    let label = str_field(doc, key).unwrap_or("unknown").to_string();
    *counts.entry(label).or_default() += 1;
}

impl CardsService {
    pub fn new(state: Arc<VaultState>) -> Self {
        Self {
            crud: TenantCrud::new(state, RecordType::Card, "Card")
                .with_listing(cards_shared::LISTING)
                .with_capabilities(cards_shared::capabilities()),
        }
    }

    fn state(&self) -> &VaultState {
        &self.crud.state
    }

    /// Create with a fresh card number; also used for eyeball cards.
    pub async fn create_card(&self, ctx: &TenantContext, data: Value, params: VaultParams) -> Result<Value> {
        let tenant = self.state().tenant(ctx).await?;
        let mut doc = into_document(data)?;
        ensure_profile(&tenant, &doc).await?;

        let kind = CardKind::from_card_type(str_field(&doc, "cardType"));
        let number = self.state().numbering.next_card_number(kind).await?;
        doc.insert("cardNumber".to_string(), Value::String(number));

        let created = self.crud._create(ctx, Value::Object(doc), params).await?;
        adjust_tag_counts(&tenant, &[], &string_list(created.get("tags"))).await?;
        Ok(created)
    }

    pub async fn update_card(
        &self,
        ctx: &TenantContext,
        id: &str,
        data: Value,
        params: VaultParams,
    ) -> Result<Value> {
        let tenant = self.state().tenant(ctx).await?;
        let existing = tenant.cards().require(id, "Card").await?;
        let mut doc = into_document(data)?;
        ensure_profile(&tenant, &doc).await?;

        for key in ["cardNumber", "qrCode", "rfidTag", "sentCard"] {
            if let Some(v) = existing.get(key) {
                doc.insert(key.to_string(), v.clone());
            }
        }

        let updated = self.crud._update(ctx, id, Value::Object(doc), params).await?;
        adjust_tag_counts(
            &tenant,
            &string_list(existing.get("tags")),
            &string_list(updated.get("tags")),
        )
        .await?;
        Ok(updated)
    }

    pub async fn patch_card(
        &self,
        ctx: &TenantContext,
        id: Option<&str>,
        data: Value,
        params: VaultParams,
    ) -> Result<Value> {
        let id = require_id(id, "Patch requires an id")?;
        let tenant = self.state().tenant(ctx).await?;
        let existing = tenant.cards().require(id, "Card").await?;
        let doc = into_document(data)?;
        ensure_profile(&tenant, &doc).await?;
        let retagged = doc.contains_key("tags");

        let patched = self.crud._patch(ctx, Some(id), Value::Object(doc), params).await?;
        if retagged {
            adjust_tag_counts(
                &tenant,
                &string_list(existing.get("tags")),
                &string_list(patched.get("tags")),
            )
            .await?;
        }
        Ok(patched)
    }

    pub async fn remove_card(&self, ctx: &TenantContext, id: Option<&str>, params: VaultParams) -> Result<Value> {
        let id = require_id(id, "Remove requires an id")?;
        let tenant = self.state().tenant(ctx).await?;
        let removed = self.crud._remove(ctx, Some(id), params).await?;

        if let Value::Object(doc) = &removed {
            adjust_tag_counts(&tenant, &string_list(doc.get("tags")), &[]).await?;
            cards_links::detach_card(&tenant, doc).await?;
        }
        Ok(removed)
    }

    async fn stats(&self, ctx: &TenantContext) -> Result<Value> {
        let cards = self.crud.all(ctx, Filter::new()).await?;

        let mut callsigns = BTreeSet::new();
        let mut by_mode = BTreeMap::new();
        let mut by_band = BTreeMap::new();
        let mut by_status = BTreeMap::new();
        for card in &cards {
            if let Some(cs) = str_field(card, "callsign") {
                callsigns.insert(cs.to_string());
            }
            count_by(&mut by_mode, card, "mode");
            count_by(&mut by_band, card, "band");
            count_by(&mut by_status, card, "qslStatus");
        }

        Ok(json!({
            "total": cards.len(),
            "uniqueCallsigns": callsigns.len(),
            "byMode": by_mode,
            "byBand": by_band,
            "byStatus": by_status,
        }))
    }

    async fn qrcode(&self, ctx: &TenantContext, id: &str, data: &Value) -> Result<Value> {
        let tenant = self.state().tenant(ctx).await?;
        assign_qr_code(self.state(), &tenant, RecordType::Card, id, data).await
    }

    async fn convert_to_eyeball(&self, ctx: &TenantContext, id: &str, data: Value) -> Result<Value> {
        let tenant = self.state().tenant(ctx).await?;
        let card = tenant.cards().require(id, "Card").await?;

        let mut input = match data {
            Value::Object(m) => m,
            Value::Null => Map::new(),
            _ => return Err(QslError::bad_request("Request body must be a JSON object").into_anyhow()),
        };
        let online = matches!(
            input.remove("contactType"),
            Some(Value::String(t)) if t == "eyeball_online"
        );

        let mut errors = SchemaErrors::new();
        cards_schema::check_eyeball_info(&Value::Object(input.clone()), &mut errors);
        errors.into_result(cards_schema::ERROR_MESSAGE)?;

        let mut info = card
            .get("eyeballInfo")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        info.extend(input);
        info.insert("isEyeball".to_string(), Value::Bool(true));

        let contact_type = if online { "eyeball_online" } else { "eyeball_offline" };
        let changes = into_document(json!({
            "eyeballInfo": info,
            "contactType": contact_type,
            "updatedAt": now(),
        }))?;
        tenant
            .cards()
            .patch(id, changes)
            .await?
            .map(Value::Object)
            .ok_or_else(|| QslError::not_found("Card not found").into_anyhow())
    }
}

pub fn docs(list: Vec<Document>) -> Value {
    Value::Array(list.into_iter().map(Value::Object).collect())
}

#[async_trait]
impl QslService<Value, VaultParams> for CardsService {
    fn capabilities(&self) -> ServiceCapabilities {
        cards_shared::capabilities()
    }

    async fn find(&self, ctx: &TenantContext, params: VaultParams) -> Result<Page<Value>> {
        self.crud._find(ctx, params).await
    }

    async fn get(&self, ctx: &TenantContext, id: &str, params: VaultParams) -> Result<Value> {
        self.crud._get(ctx, id, params).await
    }

    async fn create(&self, ctx: &TenantContext, data: Value, params: VaultParams) -> Result<Value> {
        self.create_card(ctx, data, params).await
    }

    async fn update(&self, ctx: &TenantContext, id: &str, data: Value, params: VaultParams) -> Result<Value> {
        self.update_card(ctx, id, data, params).await
    }

    async fn patch(
        &self,
        ctx: &TenantContext,
        id: Option<&str>,
        data: Value,
        params: VaultParams,
    ) -> Result<Value> {
        self.patch_card(ctx, id, data, params).await
    }

    async fn remove(&self, ctx: &TenantContext, id: Option<&str>, params: VaultParams) -> Result<Value> {
        self.remove_card(ctx, id, params).await
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
        match method {
            "stats" => return self.stats(ctx).await,
            "rfid-tag" => {
                let uid = params
                    .inner
                    .query_value("uid")
                    .ok_or_else(|| QslError::bad_request("uid is required").into_anyhow())?;
                let tenant = self.state().tenant(ctx).await?;
                return rfid_tags::info(&tenant, uid.trim()).await;
            }
            "rfid-tag-status" => {
                let tenant = self.state().tenant(ctx).await?;
                return rfid_tags::set_status(&tenant, &data).await;
            }
            _ => {}
        }

        let id = require_id(id, "Card id is required")?;
        match method {
            "link-sent-card" => {
                let sent_id = data
                    .get("sentCardId")
                    .and_then(Value::as_str)
                    .ok_or_else(|| QslError::bad_request("sentCardId is required").into_anyhow())?;
                let tenant = self.state().tenant(ctx).await?;
                let (card, _) = cards_links::link(&tenant, id, sent_id).await?;
                Ok(Value::Object(card))
            }
            "unlink-sent-card" => {
                let tenant = self.state().tenant(ctx).await?;
                Ok(Value::Object(cards_links::unlink_card(&tenant, id).await?))
            }
            "find-matching-sent-cards" => {
                let tenant = self.state().tenant(ctx).await?;
                let card = tenant.cards().require(id, "Card").await?;
                let callsign = str_field(&card, "callsign").unwrap_or_default();
                Ok(docs(cards_links::matching_sent_cards(&tenant, callsign).await?))
            }
            "qrcode" => self.qrcode(ctx, id, &data).await,
            "link-rfid" => {
                let tenant = self.state().tenant(ctx).await?;
                rfid_tags::link(&tenant, RecordType::Card, id, &data).await
            }
            "unlink-rfid" => {
                let tenant = self.state().tenant(ctx).await?;
                rfid_tags::unlink(&tenant, RecordType::Card, id, &data).await
            }
            "convert-to-eyeball" => self.convert_to_eyeball(ctx, id, data).await,
            _ => self.crud._custom(ctx, method, Some(id), Some(data), params).await,
        }
    }
}

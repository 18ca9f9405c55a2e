use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use qsl_core::errors::QslError;
use qsl_core::tenant::TenantContext;
use qsl_core::{Page, QslService, ServiceCapabilities};
use qsl_store::{Collection, Document, Filter, Query, RecordType, SortOrder, ID_FIELD};
use serde_json::{json, Map, Value};

use crate::services::adapters::{into_document, now, require_id, str_field, TenantCrud};
use crate::services::cards::cards_service::docs;
use crate::services::{VaultParams, VaultState};

use super::callsign_associations_schema::{normalize_callsign, normalize_entry};
use super::callsign_associations_shared;

pub struct CallsignAssociationsService {
    pub crud: TenantCrud,
}

/// Callsigns of an association, in entry order.
fn callsigns_of(doc: &Document) -> Vec<String> {
    doc.get("callsigns")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|e| e.get("callsign").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn entries_mut(doc: &mut Document) -> Result<&mut Vec<Value>> {
    match doc
        .entry("callsigns")
        .or_insert_with(|| Value::Array(Vec::new()))
    {
        Value::Array(entries) => Ok(entries),
        _ => Err(QslError::bad_request("callsigns must be an array").into_anyhow()),
    }
}

fn ensure_no_duplicates(callsigns: &[String]) -> Result<()> {
    let mut seen = HashSet::new();
    for call in callsigns {
        if !seen.insert(call.as_str()) {
            return Err(QslError::bad_request(format!("Duplicate callsign: {call}")).into_anyhow());
        }
    }
    Ok(())
}

/// Callsigns may belong to one association only.
async fn ensure_unclaimed(associations: &Collection, callsigns: &[String], except: Option<&str>) -> Result<()> {
    if callsigns.is_empty() {
        return Ok(());
    }
    let mut filter = Filter::new().one_of(
        "callsigns.callsign",
        callsigns.iter().cloned().map(Value::String).collect(),
    );
    if let Some(id) = except {
        filter = filter.ne(ID_FIELD, id);
    }
    let others = associations.find(&Query::new(filter)).await?;
    let mut taken: Vec<String> = others
        .iter()
        .flat_map(callsigns_of)
        .filter(|c| callsigns.contains(c))
        .collect();
    if taken.is_empty() {
        return Ok(());
    }
    taken.sort();
    taken.dedup();
    Err(QslError::bad_request(format!(
        "Callsigns already belong to another association: {}",
        taken.join(", ")
    ))
    .into_anyhow())
}

/// Checks the callsign list and fills in `primaryCallsign`.
fn settle_primary(doc: &mut Document, callsigns: &[String]) -> Result<()> {
    match str_field(doc, "primaryCallsign") {
        Some(primary) if !callsigns.iter().any(|c| c == primary) => Err(QslError::bad_request(
            "Primary callsign must be one of the association's callsigns",
        )
        .into_anyhow()),
        Some(_) => Ok(()),
        None => {
            if let Some(first) = callsigns.first() {
                doc.insert("primaryCallsign".to_string(), Value::String(first.clone()));
            }
            Ok(())
        }
    }
}

impl CallsignAssociationsService {
    pub fn new(state: Arc<VaultState>) -> Self {
        Self {
            crud: TenantCrud::new(state, RecordType::CallsignAssociation, "Callsign association")
                .with_listing(callsign_associations_shared::LISTING)
                .with_capabilities(callsign_associations_shared::capabilities()),
        }
    }

    async fn save(&self, associations: &Collection, id: &str, doc: Document) -> Result<Value> {
        let mut changes = doc;
        changes.insert("updatedAt".to_string(), Value::String(now()));
        associations
            .patch(id, changes)
            .await?
            .map(Value::Object)
            .ok_or_else(|| QslError::not_found("Callsign association not found").into_anyhow())
    }

    async fn add_callsign(&self, ctx: &TenantContext, id: &str, data: Value) -> Result<Value> {
        let associations = self.crud.collection(ctx).await?;
        let mut association = associations.require(id, "Callsign association").await?;

        let mut entry = into_document(data)?;
        let callsign = entry
            .get("callsign")
            .and_then(Value::as_str)
            .map(normalize_callsign)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| QslError::bad_request("callsign is required").into_anyhow())?;
        if callsigns_of(&association).contains(&callsign) {
            return Err(QslError::bad_request("Callsign is already in this association").into_anyhow());
        }
        ensure_unclaimed(&associations, std::slice::from_ref(&callsign), Some(id)).await?;

        entry.insert("callsign".to_string(), Value::String(callsign));
        normalize_entry(&mut entry);
        entries_mut(&mut association)?.push(Value::Object(entry));

        let mut changes = Map::new();
        changes.insert("callsigns".to_string(), association["callsigns"].clone());
        let calls = callsigns_of(&association);
        if str_field(&association, "primaryCallsign").is_none() {
            changes.insert("primaryCallsign".to_string(), json!(calls.first()));
        }
        self.save(&associations, id, changes).await
    }

    async fn remove_callsign(&self, ctx: &TenantContext, id: &str, data: Value) -> Result<Value> {
        let associations = self.crud.collection(ctx).await?;
        let mut association = associations.require(id, "Callsign association").await?;
        let callsign = data
            .get("callsign")
            .and_then(Value::as_str)
            .map(normalize_callsign)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| QslError::bad_request("callsign is required").into_anyhow())?;

        let calls = callsigns_of(&association);
        if !calls.contains(&callsign) {
            return Err(QslError::not_found("Callsign not found in this association").into_anyhow());
        }
        if calls.len() == 1 {
            return Err(QslError::bad_request(
                "Cannot remove the last callsign; delete the association instead",
            )
            .into_anyhow());
        }
        if str_field(&association, "primaryCallsign") == Some(callsign.as_str()) {
            return Err(QslError::bad_request(
                "Cannot remove the primary callsign; change the primary callsign first",
            )
            .into_anyhow());
        }

        entries_mut(&mut association)?
            .retain(|e| e.get("callsign").and_then(Value::as_str) != Some(callsign.as_str()));
        let mut changes = Map::new();
        changes.insert("callsigns".to_string(), association["callsigns"].clone());
        self.save(&associations, id, changes).await
    }

    async fn callsign_status(&self, ctx: &TenantContext, id: &str, data: Value) -> Result<Value> {
        let associations = self.crud.collection(ctx).await?;
        let mut association = associations.require(id, "Callsign association").await?;
        let callsign = data
            .get("callsign")
            .and_then(Value::as_str)
            .map(normalize_callsign)
            .unwrap_or_default();
        let is_active = data
            .get("isActive")
            .and_then(Value::as_bool)
            .ok_or_else(|| QslError::bad_request("isActive must be a boolean").into_anyhow())?;

        let entry = entries_mut(&mut association)?
            .iter_mut()
            .filter_map(Value::as_object_mut)
            .find(|e| e.get("callsign").and_then(Value::as_str) == Some(callsign.as_str()))
            .ok_or_else(|| QslError::not_found("Callsign not found in this association").into_anyhow())?;
        entry.insert("isActive".to_string(), Value::Bool(is_active));
        if let Some(end) = data.get("endDate").filter(|v| !v.is_null()) {
            entry.insert("endDate".to_string(), end.clone());
        }

        let mut changes = Map::new();
        changes.insert("callsigns".to_string(), association["callsigns"].clone());
        self.save(&associations, id, changes).await
    }

    /// Received and sent cards for any of the association's callsigns.
    async fn cards(&self, ctx: &TenantContext, id: &str) -> Result<Value> {
        let tenant = self.crud.state.tenant(ctx).await?;
        let association = tenant.associations().require(id, "Callsign association").await?;
        let calls: Vec<Value> = callsigns_of(&association)
            .into_iter()
            .map(Value::String)
            .collect();

        let query = Query::new(Filter::new().one_of("callsign", calls))
            .sort_by("contactDate", SortOrder::Desc);
        let received = tenant.cards().find(&query).await?;
        let sent = tenant.sent_cards().find(&query).await?;
        Ok(json!({
            "association": association,
            "receivedCards": docs(received),
            "sentCards": docs(sent),
        }))
    }

    async fn by_callsign(&self, ctx: &TenantContext, params: &VaultParams) -> Result<Value> {
        let callsign = params
            .inner
            .query_value("callsign")
            .map(normalize_callsign)
            .ok_or_else(|| QslError::bad_request("callsign is required").into_anyhow())?;
        let found = self
            .crud
            .collection(ctx)
            .await?
            .find_one(Filter::new().eq("callsigns.callsign", callsign))
            .await?;
        Ok(found.map(Value::Object).unwrap_or(Value::Null))
    }
}

#[async_trait]
impl QslService<Value, VaultParams> for CallsignAssociationsService {
    fn capabilities(&self) -> ServiceCapabilities {
        callsign_associations_shared::capabilities()
    }

    async fn find(&self, ctx: &TenantContext, params: VaultParams) -> Result<Page<Value>> {
        self.crud._find(ctx, params).await
    }

    async fn get(&self, ctx: &TenantContext, id: &str, params: VaultParams) -> Result<Value> {
        self.crud._get(ctx, id, params).await
    }

    async fn create(&self, ctx: &TenantContext, data: Value, params: VaultParams) -> Result<Value> {
        let mut doc = into_document(data)?;
        let calls = callsigns_of(&doc);
        ensure_no_duplicates(&calls)?;
        ensure_unclaimed(&self.crud.collection(ctx).await?, &calls, None).await?;
        settle_primary(&mut doc, &calls)?;
        self.crud._create(ctx, Value::Object(doc), params).await
    }

    async fn update(&self, ctx: &TenantContext, id: &str, data: Value, params: VaultParams) -> Result<Value> {
        let associations = self.crud.collection(ctx).await?;
        associations.require(id, "Callsign association").await?;
        let mut doc = into_document(data)?;
        let calls = callsigns_of(&doc);
        ensure_no_duplicates(&calls)?;
        ensure_unclaimed(&associations, &calls, Some(id)).await?;
        settle_primary(&mut doc, &calls)?;
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
        let associations = self.crud.collection(ctx).await?;
        let existing = associations.require(id, "Callsign association").await?;
        let mut doc = into_document(data)?;

        let calls = if doc.contains_key("callsigns") {
            let calls = callsigns_of(&doc);
            ensure_no_duplicates(&calls)?;
            ensure_unclaimed(&associations, &calls, Some(id)).await?;
            calls
        } else {
            callsigns_of(&existing)
        };
        if doc.contains_key("primaryCallsign") || doc.contains_key("callsigns") {
            if !doc.contains_key("primaryCallsign") {
                if let Some(primary) = str_field(&existing, "primaryCallsign").filter(|p| calls.iter().any(|c| c == p)) {
                    doc.insert("primaryCallsign".to_string(), Value::String(primary.to_string()));
                }
            }
            settle_primary(&mut doc, &calls)?;
        }
        self.crud._patch(ctx, Some(id), Value::Object(doc), params).await
    }

    async fn remove(&self, ctx: &TenantContext, id: Option<&str>, params: VaultParams) -> Result<Value> {
        self.crud._remove(ctx, id, params).await
    }

    async fn custom(
        &self,
        ctx: &TenantContext,
        method: &str,
        id: Option<&str>,
        data: Option<Value>,
        params: VaultParams,
    ) -> Result<Value> {
        if method == "by-callsign" {
            return self.by_callsign(ctx, &params).await;
        }
        let data = data.unwrap_or(Value::Null);
        match method {
            "add-callsign" => self.add_callsign(ctx, require_id(id, "Association id is required")?, data).await,
            "remove-callsign" => {
                self.remove_callsign(ctx, require_id(id, "Association id is required")?, data)
                    .await
            }
            "callsign-status" => {
                self.callsign_status(ctx, require_id(id, "Association id is required")?, data)
                    .await
            }
            "cards" => self.cards(ctx, require_id(id, "Association id is required")?).await,
            _ => self.crud._custom(ctx, method, id, Some(data), params).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_callsigns_are_rejected() {
        let calls = vec!["BG7XYZ".to_string(), "BA1AA".to_string(), "BG7XYZ".to_string()];
        let err = ensure_no_duplicates(&calls).unwrap_err();
        assert_eq!(QslError::find_in(&err).unwrap().code(), 400);
    }

    #[test]
    fn primary_defaults_to_the_first_callsign() {
        let mut doc = Document::new();
        settle_primary(&mut doc, &["BG7XYZ".to_string(), "BA1AA".to_string()]).unwrap();
        assert_eq!(doc["primaryCallsign"], "BG7XYZ");
    }

    #[test]
    fn primary_must_be_listed() {
        let mut doc = into_document(json!({"primaryCallsign": "BD4XX"})).unwrap();
        assert!(settle_primary(&mut doc, &["BG7XYZ".to_string()]).is_err());
    }
}

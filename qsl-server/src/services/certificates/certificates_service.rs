use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Datelike, Utc};
use qsl_core::errors::QslError;
use qsl_core::tenant::TenantContext;
use qsl_core::{Page, QslService, ServiceCapabilities};
use qsl_store::{object_id, random_hex, Document, Filter, RecordType, TenantHandle, ID_FIELD};
use serde_json::{json, Map, Value};
use tracing::info;

use crate::services::adapters::{into_document, now, require_id, str_field, TenantCrud};
use crate::services::{VaultParams, VaultState};

use super::certificates_shared;

pub fn certificate_number(year: i32) -> String {
    format!("QSL-{year}-{}", random_hex(8).to_uppercase())
}

/// `"Name (CALL)"` for object witnesses, plain strings as given.
fn witness_names(witnesses: Option<&Value>) -> Vec<Value> {
    let Some(items) = witnesses.and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|w| match w {
            Value::String(s) => Some(s.clone()),
            Value::Object(o) => {
                let name = o.get("name").and_then(Value::as_str).unwrap_or_default();
                match o.get("callsign").and_then(Value::as_str) {
                    Some(call) if !call.is_empty() && !name.is_empty() => Some(format!("{name} ({call})")),
                    Some(call) if !call.is_empty() => Some(call.to_string()),
                    _ => Some(name.to_string()).filter(|n| !n.is_empty()),
                }
            }
            _ => None,
        })
        .map(Value::String)
        .collect()
}

/// Placeholder values for an eyeball certificate of `card`.
pub fn eyeball_fields(card: &Document, request: &Value) -> Map<String, Value> {
    let info = card.get("eyeballInfo").and_then(Value::as_object);
    let info_str = |key: &str| {
        info.and_then(|i| i.get(key))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    };
    let request_str = |key: &str| {
        request
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };
    let callsign = str_field(card, "callsign").unwrap_or_default();
    let date = info_str("meetingDate")
        .or_else(|| str_field(card, "contactDate"))
        .map(|d| d.get(..10).unwrap_or(d))
        .unwrap_or_default();

    let mut fields = Map::new();
    fields.insert("callsign".into(), json!(callsign));
    fields.insert("name".into(), json!(str_field(card, "name").unwrap_or_default()));
    fields.insert("date".into(), json!(date));
    fields.insert("location".into(), json!(info_str("meetingLocation").unwrap_or_default()));
    fields.insert("eventName".into(), json!(info_str("meetingName").unwrap_or_default()));
    fields.insert(
        "witnesses".into(),
        Value::Array(witness_names(info.and_then(|i| i.get("witnesses")))),
    );
    fields.insert(
        "verificationMethod".into(),
        json!(info_str("verificationMethod").unwrap_or("in_person")),
    );
    fields.insert(
        "additionalInfo".into(),
        json!(request_str("additionalInfo").unwrap_or_default()),
    );
    fields.insert(
        "title".into(),
        json!(request_str("title")
            .map(str::to_string)
            .unwrap_or_else(|| format!("Eyeball Certificate - {callsign}"))),
    );
    fields.insert(
        "description".into(),
        json!(request_str("description")
            .map(str::to_string)
            .unwrap_or_else(|| format!("Eyeball contact certificate with {callsign}"))),
    );
    fields
}

pub struct CertificatesService {
    pub crud: TenantCrud,
}

impl CertificatesService {
    pub fn new(state: Arc<VaultState>) -> Self {
        Self {
            crud: TenantCrud::new(state, RecordType::Certificate, "Certificate")
                .with_listing(certificates_shared::LISTING)
                .with_capabilities(certificates_shared::capabilities()),
        }
    }

    fn state(&self) -> &VaultState {
        &self.crud.state
    }

    /// `(template id, html)`: the requested template or the tenant's default
    /// eyeball template. `None` html selects the built-in one.
    async fn pick_template(
        &self,
        tenant: &TenantHandle,
        request: &Value,
    ) -> Result<(Value, Option<String>)> {
        let templates = tenant.certificate_templates();
        let chosen = match request.get("templateId").and_then(Value::as_str) {
            Some(id) if !id.trim().is_empty() => {
                Some(templates.require(id.trim(), "Certificate template").await?)
            }
            _ => {
                templates
                    .find_one(Filter::new().eq("type", "eyeball").eq("isDefault", true))
                    .await?
            }
        };

        Ok(match chosen {
            Some(t) => (
                t.get(ID_FIELD).cloned().unwrap_or(Value::Null),
                str_field(&t, "templateHtml").map(str::to_string),
            ),
            None => (Value::Null, None),
        })
    }

    async fn issue_eyeball(&self, ctx: &TenantContext, card_id: &str, request: Value) -> Result<Value> {
        let tenant = self.state().tenant(ctx).await?;
        let card = tenant.cards().require(card_id, "Card").await?;
        let is_eyeball = card
            .get("eyeballInfo")
            .and_then(|i| i.get("isEyeball"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if !is_eyeball {
            return Err(QslError::bad_request("Card is not an eyeball card").into_anyhow());
        }

        let (template_id, template) = self.pick_template(&tenant, &request).await?;
        let fields = eyeball_fields(&card, &request);
        let document = self.state().renderer.render(template.as_deref(), &fields).await?;

        let id = object_id();
        let ts = now();
        let doc = into_document(json!({
            "_id": id,
            "certificateNumber": certificate_number(Utc::now().year()),
            "cardId": card_id,
            "type": "eyeball",
            "title": fields.get("title"),
            "description": fields.get("description"),
            "templateId": template_id,
            "data": fields,
            "fileUrl": format!("/api/certificates/{id}/document"),
            "status": "active",
            "issueDate": ts,
            "isPublic": request.get("isPublic").and_then(Value::as_bool).unwrap_or(false),
            "document": document,
            "createdAt": ts,
            "updatedAt": ts,
        }))?;
        let mut created = tenant.certificates().insert(doc).await?;
        created.remove("document");

        info!(tenant = %tenant.name(), card = %card_id, certificate = %id, "eyeball certificate issued");
        Ok(Value::Object(created))
    }

    async fn document(&self, ctx: &TenantContext, id: &str) -> Result<Value> {
        let certificate = self.crud.require(ctx, id).await?;
        certificate
            .get("document")
            .cloned()
            .ok_or_else(|| QslError::not_found("Certificate document not found").into_anyhow())
    }
}

#[async_trait]
impl QslService<Value, VaultParams> for CertificatesService {
    fn capabilities(&self) -> ServiceCapabilities {
        certificates_shared::capabilities()
    }

    async fn find(&self, ctx: &TenantContext, params: VaultParams) -> Result<Page<Value>> {
        self.crud._find(ctx, params).await
    }

    async fn get(&self, ctx: &TenantContext, id: &str, params: VaultParams) -> Result<Value> {
        self.crud._get(ctx, id, params).await
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
        match method {
            "eyeball" => {
                let card_id = require_id(id, "Card id is required")?;
                self.issue_eyeball(ctx, card_id, data.unwrap_or(Value::Null)).await
            }
            "document" => self.document(ctx, require_id(id, "Certificate id is required")?).await,
            _ => self.crud._custom(ctx, method, id, data, params).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card() -> Document {
        into_document(json!({
            "callsign": "BG7XYZ",
            "name": "Li Wei",
            "contactDate": "2024-05-01T10:00:00.000Z",
            "eyeballInfo": {
                "isEyeball": true,
                "meetingLocation": "Shenzhen",
                "meetingName": "Hamfest 2024",
                "witnesses": [{"name": "Zhang", "callsign": "BA1AA"}, "BD4XX"],
            },
        }))
        .unwrap()
    }

    #[test]
    fn fields_fall_back_to_the_card() {
        let fields = eyeball_fields(&card(), &Value::Null);
        assert_eq!(fields["callsign"], "BG7XYZ");
        assert_eq!(fields["date"], "2024-05-01");
        assert_eq!(fields["location"], "Shenzhen");
        assert_eq!(fields["eventName"], "Hamfest 2024");
        assert_eq!(fields["witnesses"], json!(["Zhang (BA1AA)", "BD4XX"]));
        assert_eq!(fields["verificationMethod"], "in_person");
        assert_eq!(fields["title"], "Eyeball Certificate - BG7XYZ");
    }

    #[test]
    fn request_overrides_title_and_extra_info() {
        let request = json!({"title": "Met at the fair", "additionalInfo": "73!"});
        let fields = eyeball_fields(&card(), &request);
        assert_eq!(fields["title"], "Met at the fair");
        assert_eq!(fields["additionalInfo"], "73!");
    }

    #[test]
    fn certificate_numbers_carry_the_year() {
        let number = certificate_number(2024);
        assert!(number.starts_with("QSL-2024-"));
        assert_eq!(number.len(), "QSL-2024-".len() + 8);
    }
}

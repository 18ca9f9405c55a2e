use anyhow::Result;
use qsl_store::{object_id, Document, TenantHandle};
use serde_json::{json, Value};

use crate::services::adapters::{into_document, now};

/// One line of the RFID audit log.
#[derive(Debug, Clone, Default)]
pub struct RfidEvent {
    pub device_id: Option<String>,
    pub operation_type: &'static str,
    pub tag_uid: Option<String>,
    pub card_id: Option<String>,
    pub status: &'static str,
    pub message: Option<String>,
}

impl RfidEvent {
    pub fn new(operation_type: &'static str) -> Self {
        Self {
            operation_type,
            status: "success",
            ..Self::default()
        }
    }

    pub fn device(mut self, id: impl Into<String>) -> Self {
        self.device_id = Some(id.into());
        self
    }

    pub fn tag(mut self, uid: impl Into<String>) -> Self {
        self.tag_uid = Some(uid.into());
        self
    }

    pub fn card(mut self, id: impl Into<String>) -> Self {
        self.card_id = Some(id.into());
        self
    }

    pub fn message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }
}

pub async fn record(tenant: &TenantHandle, event: RfidEvent) -> Result<Document> {
    let ts = now();
    let doc = into_document(json!({
        "_id": object_id(),
        "deviceId": event.device_id,
        "operationType": event.operation_type,
        "tagUid": event.tag_uid,
        "cardId": event.card_id,
        "status": event.status,
        "message": event.message,
        "timestamp": ts,
        "createdAt": ts,
        "updatedAt": ts,
    }))?;
    tenant.rfid_logs().insert(doc).await
}

/// Optional string field of a request body.
pub fn opt_str(data: &Value, key: &str) -> Option<String> {
    data.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

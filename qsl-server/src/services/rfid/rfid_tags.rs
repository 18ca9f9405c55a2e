//! RFID tags attached to received and sent cards.
//!
//! A tag uid belongs to at most one record across both collections.

use anyhow::Result;
use qsl_core::errors::QslError;
use qsl_store::{Collection, Document, Filter, Query, RecordType, TenantHandle, ID_FIELD};
use serde_json::{json, Value};
use tracing::info;

use crate::services::adapters::{into_document, now};

use super::rfid_events::{self, opt_str, RfidEvent};

pub const TAG_STATUSES: [&str; 4] = ["active", "inactive", "lost", "damaged"];
pub const DEFAULT_TAG_TYPE: &str = "NFC";
const RECENT_LOGS: usize = 10;

fn what(record: RecordType) -> &'static str {
    match record {
        RecordType::SentCard => "Sent card",
        _ => "Card",
    }
}

fn by_uid(uid: &str) -> Filter {
    Filter::new().eq("rfidTag.uid", uid)
}

/// `(card, sent card)` currently carrying `uid`.
async fn holders(tenant: &TenantHandle, uid: &str) -> Result<(Option<Document>, Option<Document>)> {
    let card = tenant.cards().find_one(by_uid(uid)).await?;
    let sent = tenant.sent_cards().find_one(by_uid(uid)).await?;
    Ok((card, sent))
}

fn tag_uid(doc: &Document) -> Option<String> {
    doc.get("rfidTag")
        .and_then(|t| t.get("uid"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

pub async fn link(tenant: &TenantHandle, record: RecordType, id: &str, data: &Value) -> Result<Value> {
    let uid = opt_str(data, "uid")
        .ok_or_else(|| QslError::bad_request("RFID tag uid is required").into_anyhow())?;
    let records = tenant.collection(record);
    records.require(id, what(record)).await?;

    let (card, sent) = holders(tenant, &uid).await?;
    let held_elsewhere = |doc: &Option<Document>, own: RecordType| {
        doc.as_ref().is_some_and(|d| {
            own != record || d.get(ID_FIELD).and_then(Value::as_str) != Some(id)
        })
    };
    if held_elsewhere(&card, RecordType::Card) || held_elsewhere(&sent, RecordType::SentCard) {
        return Err(
            QslError::bad_request("RFID tag is already linked to another card").into_anyhow(),
        );
    }

    let ts = now();
    let tag = json!({
        "uid": uid,
        "type": opt_str(data, "type").unwrap_or_else(|| DEFAULT_TAG_TYPE.to_string()),
        "status": "active",
        "linkedAt": ts,
    });
    let linked = records
        .patch(id, into_document(json!({"rfidTag": tag, "updatedAt": ts}))?)
        .await?
        .ok_or_else(|| QslError::not_found(format!("{} not found", what(record))).into_anyhow())?;

    let mut event = RfidEvent::new("link").tag(uid).card(id);
    if let Some(device) = opt_str(data, "deviceId") {
        event = event.device(device);
    }
    rfid_events::record(tenant, event).await?;
    Ok(Value::Object(linked))
}

pub async fn unlink(tenant: &TenantHandle, record: RecordType, id: &str, data: &Value) -> Result<Value> {
    let records = tenant.collection(record);
    let doc = records.require(id, what(record)).await?;
    let uid = tag_uid(&doc).ok_or_else(|| {
        QslError::bad_request(format!("{} has no RFID tag", what(record))).into_anyhow()
    })?;

    let unlinked = records
        .patch(id, into_document(json!({"rfidTag": null, "updatedAt": now()}))?)
        .await?
        .ok_or_else(|| QslError::not_found(format!("{} not found", what(record))).into_anyhow())?;

    let mut event = RfidEvent::new("unlink").tag(uid).card(id);
    if let Some(device) = opt_str(data, "deviceId") {
        event = event.device(device);
    }
    rfid_events::record(tenant, event).await?;
    Ok(Value::Object(unlinked))
}

fn summary(doc: &Document) -> Value {
    json!({
        "id": doc.get(ID_FIELD),
        "callsign": doc.get("callsign"),
        "contactDate": doc.get("contactDate"),
        "band": doc.get("band"),
        "mode": doc.get("mode"),
        "contactType": doc.get("contactType"),
        "qrCode": doc.get("qrCode"),
        "rfidTag": doc.get("rfidTag"),
    })
}

/// The records carrying `uid` and its latest log lines.
pub async fn info(tenant: &TenantHandle, uid: &str) -> Result<Value> {
    let (card, sent) = holders(tenant, uid).await?;
    if card.is_none() && sent.is_none() {
        return Err(QslError::not_found("No card is linked to this RFID tag").into_anyhow());
    }

    let logs = tenant
        .rfid_logs()
        .find(&Query::newest_first(Filter::new().eq("tagUid", uid)).page(0, RECENT_LOGS))
        .await?;
    let logs: Vec<Value> = logs
        .iter()
        .map(|log| {
            json!({
                "id": log.get(ID_FIELD),
                "operationType": log.get("operationType"),
                "status": log.get("status"),
                "message": log.get("message"),
                "timestamp": log.get("timestamp"),
            })
        })
        .collect();

    Ok(json!({
        "tagUid": uid,
        "cardInfo": card.as_ref().map(summary),
        "sentCardInfo": sent.as_ref().map(summary),
        "logs": logs,
    }))
}

async fn set_status_on(records: &Collection, doc: Option<Document>, status: &str) -> Result<Option<Document>> {
    let Some(doc) = doc else {
        return Ok(None);
    };
    let Some(id) = doc.get(ID_FIELD).and_then(Value::as_str) else {
        return Ok(None);
    };
    let mut tag = doc
        .get("rfidTag")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    tag.insert("status".to_string(), Value::from(status));
    records
        .patch(id, into_document(json!({"rfidTag": tag, "updatedAt": now()}))?)
        .await
}

pub async fn set_status(tenant: &TenantHandle, data: &Value) -> Result<Value> {
    let uid = opt_str(data, "uid")
        .ok_or_else(|| QslError::bad_request("RFID tag uid is required").into_anyhow())?;
    let status = opt_str(data, "status").unwrap_or_default();
    if !TAG_STATUSES.contains(&status.as_str()) {
        return Err(QslError::bad_request(format!(
            "Invalid RFID tag status, expected one of: {}",
            TAG_STATUSES.join(", ")
        ))
        .into_anyhow());
    }

    let (card, sent) = holders(tenant, &uid).await?;
    if card.is_none() && sent.is_none() {
        return Err(QslError::not_found("No card is linked to this RFID tag").into_anyhow());
    }
    let card = set_status_on(&tenant.cards(), card, &status).await?;
    let sent = set_status_on(&tenant.sent_cards(), sent, &status).await?;

    info!(tenant = %tenant.name(), uid = %uid, status = %status, "rfid tag status changed");
    Ok(json!({
        "tagUid": uid,
        "status": status,
        "cardInfo": card.as_ref().map(summary),
        "sentCardInfo": sent.as_ref().map(summary),
    }))
}

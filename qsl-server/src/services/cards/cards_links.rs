//! Links between a received card and the sent card answering the same contact.
//!
//! Both sides are written: `cards.sentCard` ↔ `sent_cards.receivedCard`.

use anyhow::Result;
use qsl_core::errors::QslError;
use qsl_store::{Document, Filter, Query, TenantHandle};
use serde_json::{json, Value};

use crate::services::adapters::{into_document, now, str_field};

/// Link `card_id` with `sent_id`, replacing any previous link of either side.
pub async fn link(tenant: &TenantHandle, card_id: &str, sent_id: &str) -> Result<(Document, Document)> {
    let cards = tenant.cards();
    let sent_cards = tenant.sent_cards();

    let card = cards.require(card_id, "Card").await?;
    let sent = sent_cards.require(sent_id, "Sent card").await?;

    if let Some(other) = str_field(&sent, "receivedCard").filter(|c| *c != card_id) {
        if cards.get(other).await?.is_some() {
            return Err(
                QslError::bad_request("Sent card is already linked to another card").into_anyhow(),
            );
        }
    }
    if let Some(previous) = str_field(&card, "sentCard").filter(|s| *s != sent_id) {
        clear_sent_side(tenant, previous).await?;
    }

    let ts = now();
    let card = cards
        .patch(
            card_id,
            into_document(json!({"sentCard": sent_id, "qslStatus": "confirmed", "updatedAt": ts}))?,
        )
        .await?
        .ok_or_else(|| QslError::not_found("Card not found").into_anyhow())?;
    let sent = sent_cards
        .patch(
            sent_id,
            into_document(json!({
                "receivedCard": card_id,
                "isReceived": true,
                "receivedDate": ts,
                "updatedAt": ts,
            }))?,
        )
        .await?
        .ok_or_else(|| QslError::not_found("Sent card not found").into_anyhow())?;
    Ok((card, sent))
}

async fn clear_sent_side(tenant: &TenantHandle, sent_id: &str) -> Result<()> {
    tenant
        .sent_cards()
        .patch(
            sent_id,
            into_document(json!({
                "receivedCard": null,
                "isReceived": false,
                "receivedDate": null,
                "updatedAt": now(),
            }))?,
        )
        .await?;
    Ok(())
}

async fn clear_card_side(tenant: &TenantHandle, card_id: &str) -> Result<()> {
    tenant
        .cards()
        .patch(
            card_id,
            into_document(json!({"sentCard": null, "qslStatus": "received", "updatedAt": now()}))?,
        )
        .await?;
    Ok(())
}

/// Drop the link of a received card. Fails with 400 when it has none.
pub async fn unlink_card(tenant: &TenantHandle, card_id: &str) -> Result<Document> {
    let card = tenant.cards().require(card_id, "Card").await?;
    let Some(sent_id) = str_field(&card, "sentCard") else {
        return Err(QslError::bad_request("Card is not linked to a sent card").into_anyhow());
    };
    clear_sent_side(tenant, sent_id).await?;
    clear_card_side(tenant, card_id).await?;
    tenant.cards().require(card_id, "Card").await
}

/// Drop the link of a sent card. Fails with 400 when it has none.
pub async fn unlink_sent(tenant: &TenantHandle, sent_id: &str) -> Result<Document> {
    let sent = tenant.sent_cards().require(sent_id, "Sent card").await?;
    let Some(card_id) = str_field(&sent, "receivedCard") else {
        return Err(QslError::bad_request("Sent card is not linked to a card").into_anyhow());
    };
    clear_card_side(tenant, card_id).await?;
    clear_sent_side(tenant, sent_id).await?;
    tenant.sent_cards().require(sent_id, "Sent card").await
}

/// Forget links pointing at a card that is going away.
pub async fn detach_card(tenant: &TenantHandle, card: &Document) -> Result<()> {
    if let Some(sent_id) = str_field(card, "sentCard") {
        clear_sent_side(tenant, sent_id).await?;
    }
    Ok(())
}

pub async fn detach_sent(tenant: &TenantHandle, sent: &Document) -> Result<()> {
    if let Some(card_id) = str_field(sent, "receivedCard") {
        clear_card_side(tenant, card_id).await?;
    }
    Ok(())
}

/// Unlinked sent cards to the same callsign.
pub async fn matching_sent_cards(tenant: &TenantHandle, callsign: &str) -> Result<Vec<Document>> {
    let filter = Filter::new()
        .eq("callsign", callsign)
        .eq("receivedCard", Value::Null);
    tenant.sent_cards().find(&Query::newest_first(filter)).await
}

/// Unlinked received cards from the same callsign.
pub async fn matching_received_cards(tenant: &TenantHandle, callsign: &str) -> Result<Vec<Document>> {
    let filter = Filter::new()
        .eq("callsign", callsign)
        .eq("sentCard", Value::Null)
        .ne("cardType", "sent");
    tenant.cards().find(&Query::newest_first(filter)).await
}

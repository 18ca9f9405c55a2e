use std::sync::Arc;

use qsl_core::{QslApp, ServiceCapabilities};
use serde_json::Value;

use crate::services::adapters::Listing;
use crate::services::{VaultParams, VaultState};

pub const LISTING: Listing = Listing {
    search: &["callsign", "name", "qth", "cardNumber"],
    filters: &[
        ("cardType", "cardType"),
        ("qslStatus", "qslStatus"),
        ("contactType", "contactType"),
        ("mode", "mode"),
        ("band", "band"),
        ("callsignProfile", "callsignProfile"),
        ("country", "country"),
        ("qrCode", "qrCode"),
        ("rfidUid", "rfidTag.uid"),
        ("tags", "tags"),
        ("categories", "categories"),
        ("isPublic", "isPublic"),
    ],
    date_range: Some("contactDate"),
};

pub fn capabilities() -> ServiceCapabilities {
    ServiceCapabilities::standard_crud()
        .with_read_custom(&["stats", "find-matching-sent-cards", "rfid-tag"])
        .with_custom(&[
            "rfid-tag-status",
            "link-sent-card",
            "unlink-sent-card",
            "qrcode",
            "link-rfid",
            "unlink-rfid",
            "convert-to-eyeball",
        ])
}

pub fn register_hooks(app: &QslApp<Value, VaultParams>, state: &Arc<VaultState>) -> anyhow::Result<()> {
    app.service("cards")?.hooks(|h| {
        h.before_all(state.authenticate.clone());
    });
    super::cards_schema::register(app)?;
    Ok(())
}

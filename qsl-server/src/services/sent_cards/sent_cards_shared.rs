use std::sync::Arc;

use qsl_core::{QslApp, ServiceCapabilities};
use serde_json::Value;

use crate::services::adapters::Listing;
use crate::services::{VaultParams, VaultState};

pub const LISTING: Listing = Listing {
    search: &["callsign", "name", "qth", "cardNumber"],
    filters: &[
        ("qslStatus", "qslStatus"),
        ("contactType", "contactType"),
        ("mode", "mode"),
        ("band", "band"),
        ("callsignProfile", "callsignProfile"),
        ("country", "country"),
        ("isReceived", "isReceived"),
        ("qrCode", "qrCode"),
    ],
    date_range: Some("sentDate"),
};

pub fn capabilities() -> ServiceCapabilities {
    ServiceCapabilities::standard_crud()
        .with_read_custom(&["stats", "find-matching-received-cards"])
        .with_custom(&[
            "link-received-card",
            "unlink-received-card",
            "qrcode",
            "mark-received",
            "link-rfid",
            "unlink-rfid",
        ])
}

pub fn register_hooks(app: &QslApp<Value, VaultParams>, state: &Arc<VaultState>) -> anyhow::Result<()> {
    app.service("sent-cards")?.hooks(|h| {
        h.before_all(state.authenticate.clone());
    });
    super::sent_cards_schema::register(app)?;
    Ok(())
}

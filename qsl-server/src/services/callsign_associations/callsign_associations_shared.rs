use std::sync::Arc;

use qsl_core::{QslApp, ServiceCapabilities};
use serde_json::Value;

use crate::services::adapters::Listing;
use crate::services::{VaultParams, VaultState};

pub const LISTING: Listing = Listing {
    search: &["operatorName", "callsigns.callsign", "primaryCallsign"],
    filters: &[("primaryCallsign", "primaryCallsign"), ("tags", "tags")],
    date_range: None,
};

pub fn capabilities() -> ServiceCapabilities {
    ServiceCapabilities::standard_crud()
        .with_read_custom(&["cards", "by-callsign"])
        .with_custom(&["add-callsign", "remove-callsign", "callsign-status"])
}

pub fn register_hooks(app: &QslApp<Value, VaultParams>, state: &Arc<VaultState>) -> anyhow::Result<()> {
    app.service("callsign-associations")?.hooks(|h| {
        h.before_all(state.authenticate.clone());
    });
    super::callsign_associations_schema::register(app)?;
    Ok(())
}

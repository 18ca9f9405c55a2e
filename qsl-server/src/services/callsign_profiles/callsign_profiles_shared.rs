use std::sync::Arc;

use qsl_core::{QslApp, ServiceCapabilities};
use serde_json::Value;

use crate::services::adapters::Listing;
use crate::services::{VaultParams, VaultState};

pub const LISTING: Listing = Listing {
    search: &["callsignName", "qth", "gridSquare"],
    filters: &[("isDefault", "isDefault"), ("licenseClass", "licenseClass")],
    date_range: None,
};

pub fn capabilities() -> ServiceCapabilities {
    ServiceCapabilities::standard_crud().with_custom(&["set-default"])
}

pub fn register_hooks(app: &QslApp<Value, VaultParams>, state: &Arc<VaultState>) -> anyhow::Result<()> {
    app.service("callsign-profiles")?.hooks(|h| {
        h.before_all(state.authenticate.clone());
    });
    super::callsign_profiles_schema::register(app)?;
    Ok(())
}

use std::sync::Arc;

use qsl_core::{QslApp, ServiceCapabilities};
use serde_json::Value;

use crate::services::adapters::Listing;
use crate::services::{VaultParams, VaultState};

pub const LISTING: Listing = Listing {
    search: &["name"],
    filters: &[("color", "color")],
    date_range: None,
};

pub fn capabilities() -> ServiceCapabilities {
    ServiceCapabilities::standard_crud().with_read_custom(&["stats"])
}

pub fn register_hooks(app: &QslApp<Value, VaultParams>, state: &Arc<VaultState>) -> anyhow::Result<()> {
    app.service("tags")?.hooks(|h| {
        h.before_all(state.authenticate.clone());
    });
    super::tags_schema::register(app)?;
    Ok(())
}

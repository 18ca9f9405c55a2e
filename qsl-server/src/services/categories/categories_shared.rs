use std::sync::Arc;

use qsl_core::{QslApp, ServiceCapabilities};
use serde_json::Value;

use crate::services::adapters::Listing;
use crate::services::{VaultParams, VaultState};

pub const LISTING: Listing = Listing {
    search: &["name", "description"],
    filters: &[("parentId", "parentId"), ("level", "level")],
    date_range: None,
};

pub fn capabilities() -> ServiceCapabilities {
    ServiceCapabilities::standard_crud()
        .with_read_custom(&["path", "children", "descendants"])
        .with_custom(&["move"])
}

pub fn register_hooks(app: &QslApp<Value, VaultParams>, state: &Arc<VaultState>) -> anyhow::Result<()> {
    app.service("categories")?.hooks(|h| {
        h.before_all(state.authenticate.clone());
    });
    super::categories_schema::register(app)?;
    Ok(())
}

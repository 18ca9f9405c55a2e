use std::sync::Arc;

use qsl_core::{QslApp, ServiceCapabilities, ServiceMethodKind};
use serde_json::Value;

use crate::services::{VaultParams, VaultState};

pub fn capabilities() -> ServiceCapabilities {
    ServiceCapabilities::from_methods(vec![
        ServiceMethodKind::Find,
        ServiceMethodKind::Get,
        ServiceMethodKind::Create,
        ServiceMethodKind::Patch,
        ServiceMethodKind::Remove,
    ])
    .with_read_custom(&["stats"])
}

pub fn register_hooks(app: &QslApp<Value, VaultParams>, state: &Arc<VaultState>) -> anyhow::Result<()> {
    app.service("eyeball-cards")?.hooks(|h| {
        h.before_all(state.authenticate.clone());
    });
    super::eyeball_cards_schema::register(app)?;
    Ok(())
}

use std::sync::Arc;

use qsl_auth::ProtectHook;
use qsl_core::{QslApp, ServiceCapabilities, ServiceMethodKind};
use serde_json::Value;

use crate::services::adapters::Listing;
use crate::services::{VaultParams, VaultState};

pub const LISTING: Listing = Listing {
    search: &["title", "certificateNumber", "data.callsign"],
    filters: &[
        ("type", "type"),
        ("status", "status"),
        ("cardId", "cardId"),
        ("isPublic", "isPublic"),
    ],
    date_range: Some("issueDate"),
};

pub const TEMPLATE_LISTING: Listing = Listing {
    search: &["name", "description"],
    filters: &[("type", "type"), ("isDefault", "isDefault")],
    date_range: None,
};

pub fn capabilities() -> ServiceCapabilities {
    ServiceCapabilities::from_methods(vec![
        ServiceMethodKind::Find,
        ServiceMethodKind::Get,
        ServiceMethodKind::Remove,
    ])
    .with_read_custom(&["document"])
    .with_custom(&["eyeball"])
}

pub fn register_hooks(app: &QslApp<Value, VaultParams>, state: &Arc<VaultState>) -> anyhow::Result<()> {
    app.service("certificates")?.hooks(|h| {
        h.before_all(state.authenticate.clone());
        // The rendered document is only served by `GET /{id}/document`.
        let protect = Arc::new(ProtectHook::from_fields(&["document"]));
        for kind in [ServiceMethodKind::Find, ServiceMethodKind::Get, ServiceMethodKind::Remove] {
            h.after(kind, protect.clone());
        }
    });
    app.service("certificate-templates")?.hooks(|h| {
        h.before_all(state.authenticate.clone());
    });
    super::certificate_templates_schema::register(app)?;
    Ok(())
}

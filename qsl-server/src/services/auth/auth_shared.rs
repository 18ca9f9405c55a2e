use std::sync::Arc;

use qsl_core::{QslApp, ServiceCapabilities, ServiceMethodKind};
use serde_json::Value;

use crate::services::{VaultParams, VaultState};

pub fn capabilities() -> ServiceCapabilities {
    ServiceCapabilities::from_methods(vec![
        ServiceMethodKind::Create,
        ServiceMethodKind::Get,
        ServiceMethodKind::Patch,
        ServiceMethodKind::Remove,
    ])
    .with_read_custom(&["init-status"])
    .with_custom(&["register", "initialize", "change-password"])
}

/// Login and registration stay public; the account methods need a token.
pub fn register_hooks(app: &QslApp<Value, VaultParams>, state: &Arc<VaultState>) -> anyhow::Result<()> {
    app.service("auth")?.hooks(|h| {
        for kind in [
            ServiceMethodKind::Get,
            ServiceMethodKind::Patch,
            ServiceMethodKind::Remove,
            ServiceMethodKind::Custom("change-password"),
        ] {
            h.before(kind, state.authenticate.clone());
        }
    });
    Ok(())
}

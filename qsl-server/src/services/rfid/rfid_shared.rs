use std::sync::Arc;

use qsl_core::{QslApp, ServiceCapabilities};
use serde_json::Value;

use crate::services::adapters::Listing;
use crate::services::{VaultParams, VaultState};

pub const DEVICE_LISTING: Listing = Listing {
    search: &["name", "model", "serialNumber"],
    filters: &[
        ("deviceType", "deviceType"),
        ("status", "status"),
        ("isConnected", "isConnected"),
    ],
    date_range: None,
};

pub const LOG_LISTING: Listing = Listing {
    search: &["tagUid", "message"],
    filters: &[
        ("deviceId", "deviceId"),
        ("operationType", "operationType"),
        ("tagUid", "tagUid"),
        ("cardId", "cardId"),
        ("status", "status"),
    ],
    date_range: Some("createdAt"),
};

pub fn device_capabilities() -> ServiceCapabilities {
    ServiceCapabilities::standard_crud()
        .with_read_custom(&["status"])
        .with_custom(&["connect", "disconnect"])
}

pub fn log_capabilities() -> ServiceCapabilities {
    ServiceCapabilities::read_only()
}

pub fn register_hooks(app: &QslApp<Value, VaultParams>, state: &Arc<VaultState>) -> anyhow::Result<()> {
    for name in ["rfid-devices", "rfid-logs"] {
        app.service(name)?.hooks(|h| {
            h.before_all(state.authenticate.clone());
        });
    }
    super::rfid_devices_schema::register(app)?;
    Ok(())
}

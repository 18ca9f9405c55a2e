use anyhow::Result;
use qsl_core::{QslApp, SchemaHooksExt};
use qsl_schema::{validate_value, SchemaErrors};
use serde::Deserialize;
use serde_json::Value;
use validator::Validate;

use crate::services::VaultParams;

pub const ERROR_MESSAGE: &str = "RFID device validation failed";
pub const DEVICE_TYPES: &[&str] = &["USB", "Bluetooth", "Network", "Serial", "Other"];
pub const DEVICE_STATUSES: &[&str] = &["active", "inactive", "error", "maintenance"];

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateDevice {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(max = 100))]
    pub model: Option<String>,
    #[validate(length(max = 100))]
    pub serial_number: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PatchDevice {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
}

fn check_enums(data: &Value) -> Result<()> {
    let mut errors = SchemaErrors::new();
    errors.check_one_of("deviceType", data.get("deviceType").and_then(Value::as_str), DEVICE_TYPES);
    errors.check_one_of("status", data.get("status").and_then(Value::as_str), DEVICE_STATUSES);
    errors.into_result(ERROR_MESSAGE)
}

fn apply_defaults(data: &mut Value) {
    if let Some(obj) = data.as_object_mut() {
        obj.entry("deviceType").or_insert_with(|| Value::from("USB"));
        obj.entry("status").or_insert_with(|| Value::from("inactive"));
        obj.insert("isConnected".to_string(), Value::Bool(false));
    }
}

/// Connection state only changes through `connect` / `disconnect`.
fn strip_connection_state(data: &mut Value) {
    if let Some(obj) = data.as_object_mut() {
        for key in ["isConnected", "lastConnected", "lastDisconnected"] {
            obj.remove(key);
        }
    }
}

pub fn register(app: &QslApp<Value, VaultParams>) -> Result<()> {
    app.service("rfid-devices")?.hooks(|h| {
        h.schema(|s| {
            s.on_writes()
                .resolve(|data, _meta| {
                    strip_connection_state(data);
                    Ok(())
                })
                .validate(|data, _meta| check_enums(data));
            s.on_create()
                .validate(|data, _meta| validate_value::<CreateDevice>(data, ERROR_MESSAGE))
                .resolve(|data, _meta| {
                    apply_defaults(data);
                    Ok(())
                });
            s.on_update()
                .validate(|data, _meta| validate_value::<CreateDevice>(data, ERROR_MESSAGE));
            s.on_patch()
                .validate(|data, _meta| validate_value::<PatchDevice>(data, ERROR_MESSAGE));
        });
    });
    Ok(())
}

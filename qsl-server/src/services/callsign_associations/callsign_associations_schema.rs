use anyhow::Result;
use qsl_core::{QslApp, SchemaHooksExt};
use qsl_schema::validate_value;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

use crate::services::VaultParams;

pub const ERROR_MESSAGE: &str = "Callsign association validation failed";

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CallsignEntry {
    #[validate(length(min = 1, max = 20))]
    pub callsign: String,
    pub is_active: Option<bool>,
    #[validate(length(max = 100))]
    pub region: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateAssociation {
    #[validate(length(min = 1, max = 100))]
    pub operator_name: String,
    #[validate(length(min = 1), nested)]
    pub callsigns: Vec<CallsignEntry>,
    #[validate(length(max = 20))]
    pub primary_callsign: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PatchAssociation {
    #[validate(length(min = 1, max = 100))]
    pub operator_name: Option<String>,
    #[validate(length(min = 1), nested)]
    pub callsigns: Option<Vec<CallsignEntry>>,
    #[validate(length(max = 20))]
    pub primary_callsign: Option<String>,
}

pub fn normalize_callsign(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Uppercase every callsign and give entries their `isActive` default.
pub fn normalize_entry(entry: &mut Map<String, Value>) {
    if let Some(Value::String(call)) = entry.get_mut("callsign") {
        *call = normalize_callsign(call);
    }
    entry.entry("isActive").or_insert(Value::Bool(true));
}

fn normalize(data: &mut Value) {
    let Some(obj) = data.as_object_mut() else {
        return;
    };
    if let Some(Value::Array(entries)) = obj.get_mut("callsigns") {
        for entry in entries.iter_mut().filter_map(Value::as_object_mut) {
            normalize_entry(entry);
        }
    }
    if let Some(Value::String(primary)) = obj.get_mut("primaryCallsign") {
        *primary = normalize_callsign(primary);
    }
    if let Some(Value::String(name)) = obj.get_mut("operatorName") {
        *name = name.trim().to_string();
    }
}

pub fn register(app: &QslApp<Value, VaultParams>) -> Result<()> {
    app.service("callsign-associations")?.hooks(|h| {
        h.schema(|s| {
            s.on_create()
                .validate(|data, _meta| validate_value::<CreateAssociation>(data, ERROR_MESSAGE));
            s.on_update()
                .validate(|data, _meta| validate_value::<CreateAssociation>(data, ERROR_MESSAGE));
            s.on_patch()
                .validate(|data, _meta| validate_value::<PatchAssociation>(data, ERROR_MESSAGE));
            s.on_writes().resolve(|data, _meta| {
                normalize(data);
                Ok(())
            });
        });
    });
    Ok(())
}

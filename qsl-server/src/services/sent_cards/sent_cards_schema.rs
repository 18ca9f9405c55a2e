use anyhow::Result;
use qsl_core::{QslApp, SchemaHooksExt};
use qsl_schema::{validate_value, SchemaErrors};
use serde::Deserialize;
use serde_json::Value;
use validator::Validate;

use crate::services::adapters::now;
use crate::services::cards::cards_schema::{check_contact_fields, uppercase_field, PatchCard};
use crate::services::VaultParams;

pub const ERROR_MESSAGE: &str = "Sent card validation failed";

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSentCard {
    #[validate(length(min = 1))]
    pub callsign_profile: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub callsign: String,
    #[validate(length(min = 1, message = "is required"))]
    pub contact_date: String,
    #[validate(range(min = 0.0, message = "must not be negative"))]
    pub frequency: f64,
    #[validate(length(min = 1, message = "is required"))]
    pub mode: String,
}

pub fn validate_create(data: &Value) -> Result<()> {
    validate_value::<CreateSentCard>(data, ERROR_MESSAGE)?;
    let mut errors = SchemaErrors::new();
    check_contact_fields(data, &mut errors);
    errors.into_result(ERROR_MESSAGE)
}

pub fn validate_patch(data: &Value) -> Result<()> {
    validate_value::<PatchCard>(data, ERROR_MESSAGE)?;
    let mut errors = SchemaErrors::new();
    check_contact_fields(data, &mut errors);
    errors.into_result(ERROR_MESSAGE)
}

const MANAGED: [&str; 4] = ["cardNumber", "qrCode", "receivedCard", "rfidTag"];

pub fn resolve_create(data: &mut Value) {
    let Some(obj) = data.as_object_mut() else {
        return;
    };
    uppercase_field(obj, "callsign");
    for key in MANAGED {
        obj.remove(key);
    }
    let defaults = [
        ("cardType", Value::from("sent")),
        ("contactType", Value::from("shortwave")),
        ("qslStatus", Value::from("sent")),
        ("sentDate", Value::from(now())),
        ("isReceived", Value::Bool(false)),
        ("receivedCard", Value::Null),
        ("receivedDate", Value::Null),
    ];
    for (key, value) in defaults {
        if obj.get(key).map_or(true, Value::is_null) {
            obj.insert(key.to_string(), value);
        }
    }
}

pub fn resolve_patch(data: &mut Value) {
    if let Some(obj) = data.as_object_mut() {
        uppercase_field(obj, "callsign");
        for key in MANAGED {
            obj.remove(key);
        }
    }
}

pub fn register(app: &QslApp<Value, VaultParams>) -> Result<()> {
    app.service("sent-cards")?.hooks(|h| {
        h.schema(|s| {
            s.on_create()
                .validate(|data, _meta| validate_create(data))
                .resolve(|data, _meta| {
                    resolve_create(data);
                    Ok(())
                });
            s.on_update()
                .validate(|data, _meta| validate_create(data))
                .resolve(|data, _meta| {
                    resolve_patch(data);
                    Ok(())
                });
            s.on_patch()
                .validate(|data, _meta| validate_patch(data))
                .resolve(|data, _meta| {
                    resolve_patch(data);
                    Ok(())
                });
        });
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn profile_is_optional_for_sent_cards() {
        let data = json!({
            "callsign": "BA1AA",
            "contactDate": "2024-05-01T10:00:00Z",
            "frequency": 7.074,
            "mode": "FT8",
        });
        assert!(validate_create(&data).is_ok());
    }

    #[test]
    fn create_defaults_to_an_unanswered_sent_card() {
        let mut data = json!({"callsign": "ba1aa", "receivedCard": "forged"});
        resolve_create(&mut data);
        assert_eq!(data["callsign"], "BA1AA");
        assert_eq!(data["isReceived"], false);
        assert_eq!(data["receivedCard"], Value::Null);
        assert_eq!(data["cardType"], "sent");
        assert!(data["sentDate"].is_string());
    }
}

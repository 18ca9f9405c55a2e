use anyhow::Result;
use qsl_core::{QslApp, SchemaHooksExt};
use qsl_schema::{validate_value, SchemaErrors};
use serde::Deserialize;
use serde_json::{Map, Value};
use validator::Validate;

use crate::services::VaultParams;

pub const ERROR_MESSAGE: &str = "Card validation failed";

pub const CARD_TYPES: &[&str] = &["received", "sent"];
pub const CONTACT_TYPES: &[&str] = &[
    "satellite",
    "shortwave",
    "repeater",
    "direct",
    "eyeball_offline",
    "eyeball_online",
    "other",
];
pub const QSL_STATUSES: &[&str] = &["pending", "sent", "received", "confirmed"];
pub const MEETING_TYPES: &[&str] = &[
    "hamfest",
    "convention",
    "club_meeting",
    "personal_visit",
    "field_day",
    "contest",
    "other",
];
pub const VERIFICATION_METHODS: &[&str] = &["in_person", "photo", "video", "third_party", "other"];

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCard {
    #[validate(length(min = 1, message = "is required"))]
    pub callsign_profile: String,
    #[validate(length(min = 1, max = 20))]
    pub callsign: String,
    #[validate(length(min = 1, message = "is required"))]
    pub contact_date: String,
    #[validate(range(min = 0.0, message = "must not be negative"))]
    pub frequency: f64,
    #[validate(length(min = 1, message = "is required"))]
    pub mode: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PatchCard {
    #[validate(length(min = 1))]
    pub callsign_profile: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub callsign: Option<String>,
    pub contact_date: Option<String>,
    #[validate(range(min = 0.0, message = "must not be negative"))]
    pub frequency: Option<f64>,
    #[validate(length(min = 1))]
    pub mode: Option<String>,
}

pub fn valid_date(raw: &str) -> bool {
    chrono::DateTime::parse_from_rfc3339(raw).is_ok()
        || chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d").is_ok()
}

fn text<'a>(data: &'a Value, key: &str) -> Option<&'a str> {
    data.get(key).and_then(Value::as_str)
}

/// Enumerations and dates shared by received, sent and eyeball cards.
pub fn check_contact_fields(data: &Value, errors: &mut SchemaErrors) {
    errors.check_one_of("cardType", text(data, "cardType"), CARD_TYPES);
    errors.check_one_of("contactType", text(data, "contactType"), CONTACT_TYPES);
    errors.check_one_of("qslStatus", text(data, "qslStatus"), QSL_STATUSES);

    for key in ["contactDate", "sentDate", "receivedDate"] {
        if let Some(raw) = text(data, key) {
            if !valid_date(raw) {
                errors.push_field(key, "must be a valid date");
            }
        }
    }

    if let Some(info) = data.get("eyeballInfo").filter(|v| !v.is_null()) {
        check_eyeball_info(info, errors);
    }
}

pub fn check_eyeball_info(info: &Value, errors: &mut SchemaErrors) {
    if !info.is_object() {
        errors.push_field("eyeballInfo", "must be an object");
        return;
    }
    errors.check_one_of(
        "eyeballInfo.meetingType",
        text(info, "meetingType"),
        MEETING_TYPES,
    );
    errors.check_one_of(
        "eyeballInfo.verificationMethod",
        text(info, "verificationMethod"),
        VERIFICATION_METHODS,
    );
}

pub fn validate_create(data: &Value) -> Result<()> {
    validate_value::<CreateCard>(data, ERROR_MESSAGE)?;
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

pub fn uppercase_field(data: &mut Map<String, Value>, key: &str) {
    if let Some(Value::String(s)) = data.get_mut(key) {
        *s = s.trim().to_uppercase();
    }
}

fn default_field(data: &mut Map<String, Value>, key: &str, value: Value) {
    if data.get(key).map_or(true, Value::is_null) {
        data.insert(key.to_string(), value);
    }
}

/// Drop repeated ids from a reference list, keeping first occurrences.
pub fn dedupe_ids(data: &mut Map<String, Value>, key: &str) {
    if let Some(Value::Array(items)) = data.get_mut(key) {
        let mut seen = Vec::with_capacity(items.len());
        items.retain(|item| {
            if seen.contains(item) {
                return false;
            }
            seen.push(item.clone());
            true
        });
    }
}

pub fn resolve_create(data: &mut Value) {
    let Some(obj) = data.as_object_mut() else {
        return;
    };
    uppercase_field(obj, "callsign");
    default_field(obj, "cardType", Value::from("received"));
    default_field(obj, "contactType", Value::from("shortwave"));
    default_field(obj, "qslStatus", Value::from("pending"));
    default_field(obj, "isPublic", Value::Bool(false));
    default_field(obj, "categories", Value::Array(Vec::new()));
    default_field(obj, "tags", Value::Array(Vec::new()));
    dedupe_ids(obj, "tags");
    dedupe_ids(obj, "categories");
    for key in ["cardNumber", "qrCode", "rfidTag", "sentCard"] {
        obj.remove(key);
    }
}

/// Numbers and links are managed by the service, never by the client.
pub fn resolve_patch(data: &mut Value) {
    let Some(obj) = data.as_object_mut() else {
        return;
    };
    uppercase_field(obj, "callsign");
    dedupe_ids(obj, "tags");
    dedupe_ids(obj, "categories");
    for key in ["cardNumber", "qrCode", "rfidTag", "sentCard"] {
        obj.remove(key);
    }
}

pub fn register(app: &QslApp<Value, VaultParams>) -> Result<()> {
    app.service("cards")?.hooks(|h| {
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
    use qsl_core::QslError;
    use serde_json::json;

    fn field_errors(err: anyhow::Error) -> Value {
        QslError::find_in(&err).unwrap().errors.clone().unwrap()
    }

    #[test]
    fn create_requires_the_contact_basics() {
        let err = validate_create(&json!({
            "callsignProfile": "p1",
            "callsign": "",
            "contactDate": "2024-05-01",
            "frequency": -1.0,
            "mode": "FT8",
        }))
        .unwrap_err();
        let errors = field_errors(err);
        assert!(errors.get("callsign").is_some());
        assert_eq!(errors["frequency"][0], "must not be negative");
    }

    #[test]
    fn enums_and_dates_are_checked() {
        let err = validate_create(&json!({
            "callsignProfile": "p1",
            "callsign": "BG7XYZ",
            "contactDate": "yesterday",
            "frequency": 14.074,
            "mode": "FT8",
            "contactType": "telepathy",
            "eyeballInfo": {"meetingType": "dinner"},
        }))
        .unwrap_err();
        let errors = field_errors(err);
        assert!(errors.get("contactDate").is_some());
        assert!(errors.get("contactType").is_some());
        assert!(errors.get("eyeballInfo.meetingType").is_some());
    }

    #[test]
    fn create_defaults_and_uppercases() {
        let mut data = json!({"callsign": " bg7xyz ", "cardNumber": "forged", "qslStatus": null});
        resolve_create(&mut data);
        assert_eq!(data["callsign"], "BG7XYZ");
        assert_eq!(data["cardType"], "received");
        assert_eq!(data["contactType"], "shortwave");
        assert_eq!(data["qslStatus"], "pending");
        assert!(data.get("cardNumber").is_none());
    }

    #[test]
    fn repeated_references_are_collapsed() {
        let mut data = json!({"callsign": "BA1AA", "tags": ["t1", "t2", "t1"], "categories": ["c1", "c1"]});
        resolve_create(&mut data);
        assert_eq!(data["tags"], json!(["t1", "t2"]));
        assert_eq!(data["categories"], json!(["c1"]));

        let mut patch = json!({"tags": ["t3", "t3"]});
        resolve_patch(&mut patch);
        assert_eq!(patch["tags"], json!(["t3"]));
    }
}

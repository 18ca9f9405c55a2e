use anyhow::Result;
use qsl_core::{QslApp, SchemaHooksExt};
use qsl_schema::{validate_value, SchemaErrors};
use serde::Deserialize;
use serde_json::Value;
use validator::Validate;

use crate::services::cards::cards_schema::uppercase_field;
use crate::services::VaultParams;

pub const ERROR_MESSAGE: &str = "Callsign profile validation failed";
pub const LICENSE_CLASSES: &[&str] = &["A", "B", "C", "D", "E"];

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateProfile {
    #[validate(length(min = 1, max = 20))]
    pub callsign_name: String,
    #[validate(length(min = 4, max = 8))]
    pub grid_square: Option<String>,
    #[validate(range(min = 0.0, message = "must not be negative"))]
    pub power: Option<f64>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PatchProfile {
    #[validate(length(min = 1, max = 20))]
    pub callsign_name: Option<String>,
    #[validate(length(min = 4, max = 8))]
    pub grid_square: Option<String>,
    #[validate(range(min = 0.0, message = "must not be negative"))]
    pub power: Option<f64>,
}

fn check_license(data: &Value) -> Result<()> {
    let mut errors = SchemaErrors::new();
    errors.check_one_of(
        "licenseClass",
        data.get("licenseClass").and_then(Value::as_str),
        LICENSE_CLASSES,
    );
    errors.into_result(ERROR_MESSAGE)
}

pub fn normalize(data: &mut Value) {
    if let Some(obj) = data.as_object_mut() {
        uppercase_field(obj, "callsignName");
        uppercase_field(obj, "gridSquare");
        uppercase_field(obj, "licenseClass");
    }
}

pub fn register(app: &QslApp<Value, VaultParams>) -> Result<()> {
    app.service("callsign-profiles")?.hooks(|h| {
        h.schema(|s| {
            s.on_writes().resolve(|data, _meta| {
                normalize(data);
                Ok(())
            });
            s.on_create().validate(|data, _meta| {
                validate_value::<CreateProfile>(data, ERROR_MESSAGE)?;
                check_license(data)
            });
            s.on_update().validate(|data, _meta| {
                validate_value::<CreateProfile>(data, ERROR_MESSAGE)?;
                check_license(data)
            });
            s.on_patch().validate(|data, _meta| {
                validate_value::<PatchProfile>(data, ERROR_MESSAGE)?;
                check_license(data)
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
    fn license_class_is_checked_after_uppercasing() {
        let mut data = json!({"callsignName": "bg7xyz", "licenseClass": "b", "gridSquare": "ol72"});
        normalize(&mut data);
        assert_eq!(data["callsignName"], "BG7XYZ");
        assert_eq!(data["gridSquare"], "OL72");
        assert!(check_license(&data).is_ok());
        assert!(check_license(&json!({"licenseClass": "Z"})).is_err());
    }

    #[test]
    fn negative_power_is_rejected() {
        let err = validate_value::<CreateProfile>(
            &json!({"callsignName": "BG7XYZ", "power": -5}),
            ERROR_MESSAGE,
        );
        assert!(err.is_err());
    }
}

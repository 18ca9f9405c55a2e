use anyhow::Result;
use qsl_core::{QslApp, SchemaHooksExt};
use qsl_schema::{validate_value, SchemaErrors};
use serde::Deserialize;
use serde_json::Value;
use validator::Validate;

use crate::services::VaultParams;

pub const ERROR_MESSAGE: &str = "Certificate template validation failed";
pub const TEMPLATE_TYPES: &[&str] = &["eyeball", "achievement", "award", "other"];
pub const PAPER_SIZES: &[&str] = &["A4", "A5", "Letter", "Legal"];
pub const ORIENTATIONS: &[&str] = &["portrait", "landscape"];

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTemplate {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1))]
    pub template_html: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PatchTemplate {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(min = 1))]
    pub template_html: Option<String>,
}

fn check_enums(data: &Value) -> Result<()> {
    let field = |key: &str| data.get(key).and_then(Value::as_str);
    let mut errors = SchemaErrors::new();
    errors.check_one_of("type", field("type"), TEMPLATE_TYPES);
    errors.check_one_of("paperSize", field("paperSize"), PAPER_SIZES);
    errors.check_one_of("orientation", field("orientation"), ORIENTATIONS);
    errors.into_result(ERROR_MESSAGE)
}

fn apply_defaults(data: &mut Value) {
    if let Some(obj) = data.as_object_mut() {
        obj.entry("type").or_insert_with(|| Value::from("eyeball"));
        obj.entry("paperSize").or_insert_with(|| Value::from("A4"));
        obj.entry("orientation").or_insert_with(|| Value::from("landscape"));
        obj.entry("isDefault").or_insert(Value::Bool(false));
    }
}

pub fn register(app: &QslApp<Value, VaultParams>) -> Result<()> {
    app.service("certificate-templates")?.hooks(|h| {
        h.schema(|s| {
            s.on_writes().validate(|data, _meta| check_enums(data));
            s.on_create()
                .validate(|data, _meta| validate_value::<CreateTemplate>(data, ERROR_MESSAGE))
                .resolve(|data, _meta| {
                    apply_defaults(data);
                    Ok(())
                });
            s.on_update()
                .validate(|data, _meta| validate_value::<CreateTemplate>(data, ERROR_MESSAGE))
                .resolve(|data, _meta| {
                    apply_defaults(data);
                    Ok(())
                });
            s.on_patch()
                .validate(|data, _meta| validate_value::<PatchTemplate>(data, ERROR_MESSAGE));
        });
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use qsl_core::QslError;
    use serde_json::json;

    #[test]
    fn html_body_is_required() {
        let err = validate_value::<CreateTemplate>(&json!({"name": "Hamfest"}), ERROR_MESSAGE)
            .unwrap_err();
        assert_eq!(QslError::find_in(&err).unwrap().code(), 422);
    }

    #[test]
    fn layout_defaults_to_landscape_a4() {
        let mut data = json!({"name": "Hamfest", "templateHtml": "<p>{{callsign}}</p>"});
        apply_defaults(&mut data);
        assert_eq!(data["type"], "eyeball");
        assert_eq!(data["paperSize"], "A4");
        assert_eq!(data["orientation"], "landscape");
        assert_eq!(data["isDefault"], false);
    }

    #[test]
    fn unknown_orientation_is_rejected() {
        assert!(check_enums(&json!({"orientation": "diagonal"})).is_err());
        assert!(check_enums(&json!({"type": "award", "paperSize": "Letter"})).is_ok());
    }
}

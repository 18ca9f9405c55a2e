use anyhow::Result;
use qsl_core::{QslApp, SchemaHooksExt};
use qsl_schema::validate_value;
use serde::Deserialize;
use serde_json::Value;
use validator::Validate;

use crate::services::VaultParams;

pub const ERROR_MESSAGE: &str = "Tag validation failed";
pub const DEFAULT_COLOR: &str = "#1890ff";

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTag {
    #[validate(length(min = 1, max = 30))]
    pub name: String,
    #[validate(length(min = 4, max = 9))]
    pub color: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PatchTag {
    #[validate(length(min = 1, max = 30))]
    pub name: Option<String>,
    #[validate(length(min = 4, max = 9))]
    pub color: Option<String>,
}

/// `count` is maintained from card writes only.
fn strip_managed(data: &mut Value) {
    if let Some(obj) = data.as_object_mut() {
        obj.remove("count");
        if let Some(Value::String(name)) = obj.get_mut("name") {
            *name = name.trim().to_string();
        }
    }
}

fn apply_defaults(data: &mut Value) {
    if let Some(obj) = data.as_object_mut() {
        obj.entry("color")
            .or_insert_with(|| Value::String(DEFAULT_COLOR.to_string()));
        obj.insert("count".to_string(), Value::from(0));
    }
}

pub fn register(app: &QslApp<Value, VaultParams>) -> Result<()> {
    app.service("tags")?.hooks(|h| {
        h.schema(|s| {
            s.on_writes().resolve(|data, _meta| {
                strip_managed(data);
                Ok(())
            });
            s.on_create()
                .validate(|data, _meta| validate_value::<CreateTag>(data, ERROR_MESSAGE))
                .resolve(|data, _meta| {
                    apply_defaults(data);
                    Ok(())
                });
            s.on_update()
                .validate(|data, _meta| validate_value::<CreateTag>(data, ERROR_MESSAGE));
            s.on_patch()
                .validate(|data, _meta| validate_value::<PatchTag>(data, ERROR_MESSAGE));
        });
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_count_is_dropped_and_defaults_apply() {
        let mut data = json!({"name": "  DX ", "count": 99});
        strip_managed(&mut data);
        apply_defaults(&mut data);
        assert_eq!(data, json!({"name": "DX", "color": "#1890ff", "count": 0}));
    }

    #[test]
    fn explicit_color_is_kept() {
        let mut data = json!({"name": "QRP", "color": "#ff0000"});
        apply_defaults(&mut data);
        assert_eq!(data["color"], "#ff0000");
    }

    #[test]
    fn name_is_required_on_create() {
        let err = validate_value::<CreateTag>(&json!({"color": "#fff"}), ERROR_MESSAGE).unwrap_err();
        let qsl = qsl_core::errors::QslError::find_in(&err).unwrap();
        assert_eq!(qsl.code(), 422);
    }
}

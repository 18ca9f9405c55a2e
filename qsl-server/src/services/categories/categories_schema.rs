use anyhow::Result;
use qsl_core::{QslApp, SchemaHooksExt};
use qsl_schema::validate_value;
use serde::Deserialize;
use serde_json::Value;
use validator::Validate;

use crate::services::VaultParams;

pub const ERROR_MESSAGE: &str = "Category validation failed";

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategory {
    #[validate(length(min = 1, max = 50))]
    pub name: String,
    pub parent_id: Option<String>,
    #[validate(length(max = 200))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PatchCategory {
    #[validate(length(min = 1, max = 50))]
    pub name: Option<String>,
    pub parent_id: Option<String>,
    #[validate(length(max = 200))]
    pub description: Option<String>,
}

fn trim_name(data: &mut Value) {
    if let Some(Value::String(name)) = data.get_mut("name") {
        *name = name.trim().to_string();
    }
    // The tree position is derived, never taken from the client.
    if let Some(obj) = data.as_object_mut() {
        obj.remove("level");
    }
}

pub fn register(app: &QslApp<Value, VaultParams>) -> Result<()> {
    app.service("categories")?.hooks(|h| {
        h.schema(|s| {
            s.on_writes().resolve(|data, _meta| {
                trim_name(data);
                Ok(())
            });
            s.on_create()
                .validate(|data, _meta| validate_value::<CreateCategory>(data, ERROR_MESSAGE));
            s.on_update()
                .validate(|data, _meta| validate_value::<CreateCategory>(data, ERROR_MESSAGE));
            s.on_patch()
                .validate(|data, _meta| validate_value::<PatchCategory>(data, ERROR_MESSAGE));
        });
    });
    Ok(())
}

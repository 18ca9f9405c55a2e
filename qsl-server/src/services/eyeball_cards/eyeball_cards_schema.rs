use anyhow::Result;
use qsl_core::{QslApp, SchemaHooksExt};
use qsl_schema::SchemaErrors;
use serde_json::{Map, Value};

use crate::services::cards::cards_schema;
use crate::services::VaultParams;

fn require_eyeball_info(data: &Value) -> Result<()> {
    let mut errors = SchemaErrors::new();
    match data.get("eyeballInfo") {
        Some(Value::Object(_)) => {}
        Some(Value::Null) | None => errors.push_field("eyeballInfo", "is required"),
        Some(_) => errors.push_field("eyeballInfo", "must be an object"),
    }
    errors.into_result(cards_schema::ERROR_MESSAGE)
}

/// Eyeball cards are always flagged, and offline unless said otherwise.
pub fn resolve_create(data: &mut Value) {
    cards_schema::resolve_create(data);
    let Some(obj) = data.as_object_mut() else {
        return;
    };

    let online = obj.get("contactType").and_then(Value::as_str) == Some("eyeball_online");
    let contact_type = if online { "eyeball_online" } else { "eyeball_offline" };
    obj.insert("contactType".to_string(), Value::from(contact_type));

    let info = obj
        .entry("eyeballInfo")
        .or_insert_with(|| Value::Object(Map::new()));
    if let Value::Object(info) = info {
        info.insert("isEyeball".to_string(), Value::Bool(true));
    }
}

pub fn register(app: &QslApp<Value, VaultParams>) -> Result<()> {
    app.service("eyeball-cards")?.hooks(|h| {
        h.schema(|s| {
            s.on_create()
                .validate(|data, _meta| {
                    require_eyeball_info(data)?;
                    cards_schema::validate_create(data)
                })
                .resolve(|data, _meta| {
                    resolve_create(data);
                    Ok(())
                });
            s.on_patch()
                .validate(|data, _meta| cards_schema::validate_patch(data))
                .resolve(|data, _meta| {
                    cards_schema::resolve_patch(data);
                    if let Some(Value::Object(info)) =
                        data.as_object_mut().and_then(|o| o.get_mut("eyeballInfo"))
                    {
                        info.insert("isEyeball".to_string(), Value::Bool(true));
                    }
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
    fn create_forces_the_eyeball_flag() {
        let mut data = json!({"callsign": "ba1aa", "eyeballInfo": {"isEyeball": false}});
        resolve_create(&mut data);
        assert_eq!(data["eyeballInfo"]["isEyeball"], true);
        assert_eq!(data["contactType"], "eyeball_offline");

        let mut online = json!({"callsign": "ba1aa", "contactType": "eyeball_online"});
        resolve_create(&mut online);
        assert_eq!(online["contactType"], "eyeball_online");
        assert_eq!(online["eyeballInfo"]["isEyeball"], true);
    }

    #[test]
    fn eyeball_info_is_required() {
        assert!(require_eyeball_info(&json!({})).is_err());
        assert!(require_eyeball_info(&json!({"eyeballInfo": {}})).is_ok());
    }
}

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use validator::Validate;

use crate::SchemaErrors;

fn friendly_message(code: &str) -> Option<&'static str> {
    match code {
        "required" => Some("is required"),
        "email" => Some("must be a valid email"),
        "length" => Some("has invalid length"),
        "range" => Some("is out of range"),
        "url" => Some("must be a valid URL"),
        "regex" => Some("has an invalid format"),
        _ => None,
    }
}

fn join_path(prefix: &str, field: &str) -> String {
    if prefix.is_empty() {
        field.to_string()
    } else {
        format!("{prefix}.{field}")
    }
}

fn push_validation_errors(out: &mut SchemaErrors, prefix: &str, errs: &validator::ValidationErrors) {
    for (field, kind) in errs.errors() {
        match kind {
            validator::ValidationErrorsKind::Field(field_errors) => {
                let key = join_path(prefix, field);
                for e in field_errors {
                    let msg = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .or_else(|| friendly_message(&e.code).map(|m| m.to_string()))
                        .unwrap_or_else(|| e.code.to_string());
                    out.push_field(&key, msg);
                }
            }
            validator::ValidationErrorsKind::Struct(struct_errs) => {
                let next = join_path(prefix, field);
                push_validation_errors(out, &next, struct_errs.as_ref());
            }
            validator::ValidationErrorsKind::List(list_errs) => {
                let base = join_path(prefix, field);
                for (idx, nested) in list_errs {
                    let next = format!("{base}[{idx}]");
                    push_validation_errors(out, &next, nested.as_ref());
                }
            }
        }
    }
}

/// Deserialize `data` into `T` and run its `validator` rules.
///
/// Shape errors land under `_schema`; rule failures under their field path
/// (`callsigns[1].callsign`).
pub fn validate<T>(data: &Value, error_message: &str) -> anyhow::Result<T>
where
    T: DeserializeOwned + Validate,
{
    let parsed: T = serde_json::from_value(data.clone())
        .map_err(|e| crate::unprocessable(error_message, json!({"_schema": [e.to_string()]})))?;

    parsed.validate().map_err(|e| {
        let mut out = SchemaErrors::default();
        push_validation_errors(&mut out, "", &e);
        out.into_unprocessable_anyhow(error_message)
    })?;

    Ok(parsed)
}

/// Like [`validate`], for callers that keep working on the raw JSON.
pub fn validate_value<T>(data: &Value, error_message: &str) -> anyhow::Result<()>
where
    T: DeserializeOwned + Validate,
{
    validate::<T>(data, error_message).map(|_| ())
}

#[cfg(test)]
mod tests {
    use qsl_core::errors::QslError;
    use serde::Deserialize;
    use serde_json::json;
    use validator::Validate;

    use super::validate;

    #[derive(Debug, Deserialize, Validate)]
    struct Entry {
        #[validate(length(min = 3, message = "callsign must be at least 3 chars"))]
        callsign: String,
    }

    #[derive(Debug, Deserialize, Validate)]
    #[serde(rename_all = "camelCase")]
    struct Association {
        #[validate(length(min = 1))]
        operator_name: String,

        #[validate(nested)]
        callsigns: Vec<Entry>,

        #[validate(email)]
        contact_email: Option<String>,
    }

    #[test]
    fn nested_and_list_errors_are_flattened_with_paths() {
        let data = json!({
            "operatorName": "",
            "callsigns": [{"callsign": "BG7XYZ"}, {"callsign": "B"}],
            "contactEmail": "nope"
        });

        let err = validate::<Association>(&data, "Association validation failed").unwrap_err();
        let qsl = QslError::from_anyhow(&err).expect("must be QslError");
        let errors = qsl.errors.as_ref().unwrap();

        assert_eq!(errors["callsigns[1].callsign"][0], "callsign must be at least 3 chars");
        assert_eq!(errors["operator_name"][0], "has invalid length");
        assert_eq!(errors["contact_email"][0], "must be a valid email");
    }

    #[test]
    fn shape_errors_go_under_schema() {
        let err = validate::<Association>(&json!({"callsigns": 3}), "bad").unwrap_err();
        let qsl = QslError::from_anyhow(&err).unwrap();
        assert!(qsl.errors.as_ref().unwrap()["_schema"][0].is_string());
    }
}

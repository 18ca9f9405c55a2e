//! Field-level validation errors shaped as 422 `QslError`s.
//!
//! `errors` is a map of field path to a list of messages; `_schema` holds
//! errors that belong to no single field (bad JSON shape, unknown enum value).

mod validate;

pub use validate::{validate, validate_value};

use qsl_core::errors::QslError;
use serde_json::{json, Map, Value};

#[derive(Default, Debug)]
pub struct SchemaErrors {
    map: Map<String, Value>,
}

impl SchemaErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_schema(&mut self, msg: impl Into<String>) {
        Self::push_to(&mut self.map, "_schema", msg);
    }

    pub fn push_field(&mut self, field: &str, msg: impl Into<String>) {
        Self::push_to(&mut self.map, field, msg);
    }

    fn push_to(map: &mut Map<String, Value>, key: &str, msg: impl Into<String>) {
        let msg = Value::String(msg.into());
        match map.get_mut(key) {
            Some(Value::Array(arr)) => arr.push(msg),
            _ => {
                map.insert(key.to_string(), Value::Array(vec![msg]));
            }
        }
    }

    /// Record an error when `value` is present and not one of `allowed`.
    pub fn check_one_of(&mut self, field: &str, value: Option<&str>, allowed: &[&str]) {
        if let Some(v) = value {
            if !allowed.contains(&v) {
                self.push_field(field, format!("must be one of: {}", allowed.join(", ")));
            }
        }
    }

    /// Record an error when `value` is missing or blank.
    pub fn require(&mut self, field: &str, value: Option<&str>) {
        if value.map(str::trim).unwrap_or_default().is_empty() {
            self.push_field(field, "is required");
        }
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn merge(&mut self, other: SchemaErrors) {
        for (key, msgs) in other.map {
            if let Value::Array(msgs) = msgs {
                for m in msgs {
                    if let Value::String(m) = m {
                        self.push_field(&key, m);
                    }
                }
            }
        }
    }

    pub fn into_unprocessable_anyhow(self, message: &str) -> anyhow::Error {
        QslError::unprocessable(message)
            .with_errors(Value::Object(self.map))
            .into_anyhow()
    }

    /// `Ok(())` when nothing was recorded.
    pub fn into_result(self, message: &str) -> anyhow::Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self.into_unprocessable_anyhow(message))
        }
    }
}

pub fn unprocessable(message: &str, errors: Value) -> anyhow::Error {
    QslError::unprocessable(message).with_errors(errors).into_anyhow()
}

pub fn schema_error(message: &str, msg: impl Into<String>) -> anyhow::Error {
    unprocessable(message, json!({"_schema": [msg.into()]}))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_of_and_require_collect_per_field() {
        let mut errors = SchemaErrors::new();
        errors.check_one_of("contactType", Some("telepathy"), &["direct", "repeater"]);
        errors.check_one_of("mode", None, &["SSB"]);
        errors.require("callsign", Some("  "));

        let err = errors.into_result("Card validation failed").unwrap_err();
        let qsl = QslError::find_in(&err).unwrap();
        let fields = qsl.errors.as_ref().unwrap();
        assert_eq!(qsl.code(), 422);
        assert_eq!(fields["contactType"][0], "must be one of: direct, repeater");
        assert_eq!(fields["callsign"][0], "is required");
        assert!(fields.get("mode").is_none());
    }

    #[test]
    fn empty_errors_pass() {
        assert!(SchemaErrors::new().into_result("unused").is_ok());
    }
}

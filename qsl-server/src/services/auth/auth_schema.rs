use serde::Deserialize;
use validator::Validate;

pub const ERROR_MESSAGE: &str = "Registration validation failed";

#[derive(Debug, Deserialize, Validate)]
pub struct Credentials {
    #[validate(length(min = 1))]
    pub username: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterUser {
    #[validate(length(min = 3, max = 50))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6))]
    pub password: String,
    #[validate(length(max = 100))]
    pub full_name: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub callsign: Option<String>,
    #[validate(length(max = 100))]
    pub qth: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePassword {
    #[validate(length(min = 1))]
    pub current_password: String,
    #[validate(length(min = 6))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMe {
    #[validate(length(max = 100))]
    pub full_name: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub callsign: Option<String>,
    #[validate(length(max = 100))]
    pub qth: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use qsl_core::QslError;
    use qsl_schema::validate;
    use serde_json::json;

    #[test]
    fn registration_checks_every_field() {
        let err = validate::<RegisterUser>(
            &json!({"username": "ab", "email": "not-an-email", "password": "123"}),
            ERROR_MESSAGE,
        )
        .unwrap_err();
        let qsl = QslError::find_in(&err).unwrap();
        assert_eq!(qsl.code(), 422);
        let errors = qsl.errors.clone().unwrap();
        for field in ["username", "email", "password"] {
            assert!(errors.get(field).is_some(), "{field} should be rejected");
        }
    }

    #[test]
    fn valid_registration_parses() {
        let user = validate::<RegisterUser>(
            &json!({"username": "bg7xyz", "email": "op@example.org", "password": "secret1", "callsign": "bg7xyz"}),
            ERROR_MESSAGE,
        )
        .unwrap();
        assert_eq!(user.callsign.as_deref(), Some("bg7xyz"));
    }
}

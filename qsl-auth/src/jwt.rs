// Access tokens.

use anyhow::Result;
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AuthError;
use crate::options::JwtOptions;

/// Claims of an access token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub role: String,
    /// Tenant database of the user
    #[serde(rename = "userDb")]
    pub user_db: String,
    pub iss: String,
    pub aud: Vec<String>,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

pub struct JwtService {
    options: JwtOptions,
    secret: String,
}

impl JwtService {
    pub fn new(options: JwtOptions) -> std::result::Result<Self, AuthError> {
        options.validate().map_err(AuthError::Config)?;
        let secret = options.secret.clone().ok_or(AuthError::MissingSecret)?;
        Ok(Self { options, secret })
    }

    pub fn options(&self) -> &JwtOptions {
        &self.options
    }

    pub fn issue(&self, user_id: &str, role: &str, user_db: &str) -> Result<String> {
        let now = Utc::now().timestamp();
        let ttl = i64::try_from(self.options.expires_in.as_secs()).unwrap_or(i64::MAX / 2);
        let claims = Claims {
            sub: user_id.to_string(),
            role: role.to_string(),
            user_db: user_db.to_string(),
            iss: self.options.issuer.clone(),
            aud: self.options.audience.clone(),
            iat: now,
            exp: now.saturating_add(ttl),
            jti: Uuid::new_v4().to_string(),
        };
        self.sign(&claims)
    }

    fn sign(&self, claims: &Claims) -> Result<String> {
        let header = Header::new(self.options.algorithm.into());
        encode(&header, claims, &EncodingKey::from_secret(self.secret.as_bytes()))
            .map_err(|e| AuthError::InvalidToken(e.to_string()).into_anyhow())
    }

    /// Check signature, issuer, audience and expiry.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(self.options.algorithm.into());
        validation.set_issuer(&[self.options.issuer.as_str()]);
        validation.set_audience(
            &self
                .options
                .audience
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>(),
        );

        let decoded = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            JwtErrorKind::ExpiredSignature => AuthError::Expired.into_anyhow(),
            _ => AuthError::InvalidToken(e.to_string()).into_anyhow(),
        })?;

        Ok(decoded.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qsl_core::QslError;

    fn service(secret: &str) -> JwtService {
        JwtService::new(JwtOptions {
            secret: Some(secret.to_string()),
            ..JwtOptions::default()
        })
        .unwrap()
    }

    #[test]
    fn issued_tokens_verify() {
        let jwt = service("test-secret");
        let token = jwt.issue("507f1f77bcf86cd799439011", "user", "radio_card_user_507f1f77bcf86cd799439011").unwrap();
        let claims = jwt.verify(&token).unwrap();
        assert_eq!(claims.sub, "507f1f77bcf86cd799439011");
        assert_eq!(claims.user_db, "radio_card_user_507f1f77bcf86cd799439011");
        assert_eq!(claims.iss, "qsl-vault");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = service("one").issue("u1", "user", "radio_card_user_u1").unwrap();
        let err = service("two").verify(&token).unwrap_err();
        let qsl = QslError::find_in(&err).unwrap();
        assert_eq!(qsl.code(), 401);
        assert_eq!(qsl.message, "Invalid token");
    }

    #[test]
    fn expired_tokens_say_so() {
        let jwt = service("test-secret");
        let now = Utc::now().timestamp();
        let token = jwt
            .sign(&Claims {
                sub: "u1".into(),
                role: "user".into(),
                user_db: "radio_card_user_u1".into(),
                iss: "qsl-vault".into(),
                aud: vec!["qsl-api".into()],
                iat: now - 7200,
                exp: now - 3600,
                jti: "j".into(),
            })
            .unwrap();
        let err = jwt.verify(&token).unwrap_err();
        assert_eq!(QslError::find_in(&err).unwrap().message, "Token expired");
    }

    #[test]
    fn missing_secret_fails_construction() {
        assert!(JwtService::new(JwtOptions::default()).is_err());
    }
}

// Authentication options.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// HMAC algorithms; the vault signs with a shared secret.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum JwtAlgorithm {
    #[default]
    HS256,
    HS384,
    HS512,
}

impl From<JwtAlgorithm> for jsonwebtoken::Algorithm {
    fn from(alg: JwtAlgorithm) -> Self {
        match alg {
            JwtAlgorithm::HS256 => jsonwebtoken::Algorithm::HS256,
            JwtAlgorithm::HS384 => jsonwebtoken::Algorithm::HS384,
            JwtAlgorithm::HS512 => jsonwebtoken::Algorithm::HS512,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct JwtOptions {
    pub algorithm: JwtAlgorithm,
    /// `iss` claim
    pub issuer: String,
    /// `aud` claim
    pub audience: Vec<String>,
    #[serde(with = "humantime_serde")]
    pub expires_in: Duration,
    pub secret: Option<String>,
}

impl Default for JwtOptions {
    fn default() -> Self {
        Self {
            algorithm: JwtAlgorithm::default(),
            issuer: "qsl-vault".to_string(),
            audience: vec!["qsl-api".to_string()],
            expires_in: Duration::from_secs(7 * 24 * 3600),
            secret: None,
        }
    }
}

impl JwtOptions {
    pub fn validate(&self) -> Result<(), String> {
        if self.issuer.is_empty() {
            return Err("JWT issuer cannot be empty".to_string());
        }
        if self.audience.is_empty() {
            return Err("JWT audience cannot be empty".to_string());
        }
        match self.secret.as_deref() {
            None | Some("") => return Err("HMAC algorithms require a secret".to_string()),
            Some(_) => {}
        }
        if self.expires_in.as_secs() == 0 {
            return Err("Access token expiration must be greater than 0".to_string());
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthOptions {
    pub jwt: JwtOptions,
    pub bcrypt_cost: u32,
}

impl Default for AuthOptions {
    fn default() -> Self {
        Self {
            jwt: JwtOptions::default(),
            bcrypt_cost: 10,
        }
    }
}

impl AuthOptions {
    pub fn validate(&self) -> Result<(), String> {
        self.jwt
            .validate()
            .map_err(|e| format!("JWT validation failed: {e}"))?;
        if !(4..=31).contains(&self.bcrypt_cost) {
            return Err(format!("bcrypt cost must be within 4..=31, got {}", self.bcrypt_cost));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_is_required() {
        let mut opts = AuthOptions::default();
        assert!(opts.validate().is_err());
        opts.jwt.secret = Some("s3cret".into());
        assert!(opts.validate().is_ok());
        opts.bcrypt_cost = 2;
        assert!(opts.validate().is_err());
    }

    #[test]
    fn expiry_reads_humantime() {
        let opts: JwtOptions = serde_json::from_value(serde_json::json!({
            "algorithm": "HS256",
            "issuer": "qsl-vault",
            "audience": ["qsl-api"],
            "expires_in": "12h",
            "secret": "x"
        }))
        .unwrap();
        assert_eq!(opts.expires_in, Duration::from_secs(12 * 3600));
    }
}

use std::env;

use anyhow::{anyhow, Result};
use qsl_auth::{AuthOptions, JwtOptions};
use qsl_core::{load_env_config, parse_duration, QslApp};
use serde_json::Value;

use crate::services::VaultParams;

/// Prefix of the generic overrides: `QSL__PAGINATE__MAX=50` sets `paginate.max`.
pub const ENV_PREFIX: &str = "QSL";

/// Copy the environment into the app config.
pub fn config(app: &QslApp<Value, VaultParams>) -> Result<()> {
    configure_http(app);
    configure_store(app);
    configure_auth(app);
    configure_paginate(app);

    load_env_config(app, ENV_PREFIX);
    Ok(())
}

fn first_env(names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|n| env::var(n).ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn set_from_env(app: &QslApp<Value, VaultParams>, key: &str, names: &[&str]) {
    if let Some(v) = first_env(names) {
        app.set(key, v);
    }
}

fn configure_http(app: &QslApp<Value, VaultParams>) {
    set_from_env(app, "http.host", &["HTTP_HOST"]);
    set_from_env(app, "http.port", &["HTTP_PORT"]);
}

fn configure_store(app: &QslApp<Value, VaultParams>) {
    set_from_env(app, "store.uri", &["STORE_URI", "MONGO_URI"]);
}

fn configure_auth(app: &QslApp<Value, VaultParams>) {
    set_from_env(app, "auth.jwt.secret", &["AUTH_JWT_SECRET", "JWT_SECRET"]);
    set_from_env(app, "auth.jwt.expires_in", &["AUTH_JWT_EXPIRES_IN", "JWT_EXPIRE"]);
    set_from_env(app, "auth.bcrypt.cost", &["AUTH_BCRYPT_COST"]);
}

fn configure_paginate(app: &QslApp<Value, VaultParams>) {
    set_from_env(app, "paginate.default", &["PAGINATE_DEFAULT"]);
    set_from_env(app, "paginate.max", &["PAGINATE_MAX"]);
}

/// Auth settings from the app config. The JWT secret is mandatory.
pub fn auth_options(app: &QslApp<Value, VaultParams>) -> Result<AuthOptions> {
    let mut jwt = JwtOptions {
        secret: app.get("auth.jwt.secret"),
        ..JwtOptions::default()
    };
    if jwt.secret.is_none() {
        return Err(anyhow!("Missing AUTH_JWT_SECRET"));
    }
    if let Some(raw) = app.get("auth.jwt.expires_in") {
        jwt.expires_in =
            parse_duration(&raw).ok_or_else(|| anyhow!("Invalid auth.jwt.expires_in: {raw}"))?;
    }
    if let Some(issuer) = app.get("auth.jwt.issuer") {
        jwt.issuer = issuer;
    }

    let mut options = AuthOptions {
        jwt,
        ..AuthOptions::default()
    };
    if let Some(raw) = app.get("auth.bcrypt.cost") {
        options.bcrypt_cost = raw
            .trim()
            .parse()
            .map_err(|_| anyhow!("Invalid auth.bcrypt.cost: {raw}"))?;
    }
    options.validate().map_err(|e| anyhow!(e))?;
    Ok(options)
}

/// Page size settings for `find`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginate {
    pub default: usize,
    pub max: usize,
}

impl Default for Paginate {
    fn default() -> Self {
        Self {
            default: 10,
            max: 100,
        }
    }
}

impl Paginate {
    pub fn from_app(app: &QslApp<Value, VaultParams>) -> Self {
        let read = |key: &str| app.get(key).and_then(|v| v.trim().parse::<usize>().ok());
        let base = Self::default();
        let max = read("paginate.max").filter(|m| *m > 0).unwrap_or(base.max);
        let default = read("paginate.default")
            .filter(|d| *d > 0)
            .unwrap_or(base.default)
            .min(max);
        Self { default, max }
    }

    /// `(page, limit)` from raw query values, clamped to `1..=max`.
    pub fn resolve(&self, page: Option<&str>, limit: Option<&str>) -> (usize, usize) {
        let page = page
            .and_then(|p| p.trim().parse::<usize>().ok())
            .filter(|p| *p > 0)
            .unwrap_or(1);
        let limit = limit
            .and_then(|l| l.trim().parse::<usize>().ok())
            .filter(|l| *l > 0)
            .unwrap_or(self.default)
            .min(self.max);
        (page, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paginate_clamps_to_max() {
        let p = Paginate { default: 10, max: 50 };
        assert_eq!(p.resolve(None, None), (1, 10));
        assert_eq!(p.resolve(Some("3"), Some("500")), (3, 50));
        assert_eq!(p.resolve(Some("0"), Some("abc")), (1, 10));
    }

    #[test]
    fn auth_options_need_a_secret() {
        let app: QslApp<Value, VaultParams> = QslApp::new();
        assert!(auth_options(&app).is_err());

        app.set("auth.jwt.secret", "s3cret");
        app.set("auth.jwt.expires_in", "12h");
        app.set("auth.bcrypt.cost", "4");
        let opts = auth_options(&app).unwrap();
        assert_eq!(opts.jwt.expires_in.as_secs(), 12 * 3600);
        assert_eq!(opts.bcrypt_cost, 4);

        app.set("auth.bcrypt.cost", "99");
        assert!(auth_options(&app).is_err());
    }
}

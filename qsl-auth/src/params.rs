use std::collections::HashMap;

use serde_json::Value;

use crate::jwt::Claims;

/// Transport params plus what authentication learned about the caller.
#[derive(Clone, Debug, Default)]
pub struct AuthParams<P> {
    pub inner: P,
    /// `None` for calls made from inside the app.
    pub provider: Option<String>,
    pub headers: HashMap<String, String>,
    pub authenticated: bool,
    /// Public view of the authenticated user.
    pub user: Option<Value>,
    pub claims: Option<Claims>,
}

impl<P> AuthParams<P> {
    /// Params of an in-process call, trusted without a token.
    pub fn internal(inner: P) -> Self {
        Self {
            inner,
            provider: None,
            headers: HashMap::new(),
            authenticated: false,
            user: None,
            claims: None,
        }
    }

    pub fn is_external(&self) -> bool {
        self.provider.as_deref().is_some_and(|p| !p.trim().is_empty())
    }

    pub fn user_id(&self) -> Option<&str> {
        self.claims.as_ref().map(|c| c.sub.as_str())
    }
}

/// Token of an `Authorization: Bearer <token>` header.
pub fn extract_bearer_token(headers: &HashMap<String, String>) -> Option<String> {
    let v = headers
        .get("authorization")
        .or_else(|| headers.get("Authorization"))?;
    let (scheme, token) = v.trim().split_once(' ')?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return None;
    }
    Some(token.to_string())
}

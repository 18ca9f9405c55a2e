// Authenticate hook.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use qsl_core::errors::QslError;
use qsl_core::hooks::QslBeforeHook;
use qsl_core::{HookContext, TenantContext};
use serde_json::Value;
use tracing::debug;

use crate::directory::{public_user, UserDirectory};
use crate::jwt::JwtService;
use crate::params::{extract_bearer_token, AuthParams};

/// Resolves the bearer token of an external call into a tenant-bound context.
///
/// Calls without a provider come from inside the app and pass through
/// untouched; they keep whatever tenant the caller handed them.
pub struct AuthenticateHook {
    jwt: Arc<JwtService>,
    users: UserDirectory,
}

impl AuthenticateHook {
    pub fn new(jwt: Arc<JwtService>, users: UserDirectory) -> Self {
        Self { jwt, users }
    }
}

fn unauthenticated(msg: &str) -> anyhow::Error {
    QslError::not_authenticated(msg).into_anyhow()
}

#[async_trait]
impl<P> QslBeforeHook<Value, AuthParams<P>> for AuthenticateHook
where
    P: Clone + Send + Sync + 'static,
{
    async fn run(&self, ctx: &mut HookContext<Value, AuthParams<P>>) -> Result<()> {
        if ctx.params.authenticated {
            return Ok(());
        }
        if !ctx.params.is_external() {
            return Ok(());
        }

        let token = extract_bearer_token(&ctx.params.headers)
            .ok_or_else(|| unauthenticated("Not authenticated"))?;
        let claims = self.jwt.verify(&token)?;

        let user = self
            .users
            .find_by_id(&claims.sub)
            .await?
            .ok_or_else(|| unauthenticated("User not found"))?;
        if user.get("isActive").and_then(Value::as_bool) == Some(false) {
            return Err(unauthenticated("Account is disabled"));
        }

        let tenant = user
            .get("userDatabaseName")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let role = user.get("role").and_then(Value::as_str).unwrap_or("user");

        ctx.tenant = TenantContext::for_user(claims.sub.as_str(), role, tenant);
        if ctx.tenant.is_anonymous() {
            return Err(QslError::general_error("User has no database").into_anyhow());
        }
        debug!(user = %claims.sub, tenant = %tenant, service = %ctx.service, "authenticated");

        ctx.params.authenticated = true;
        ctx.params.user = Some(public_user(user));
        ctx.params.claims = Some(claims);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::NewUser;
    use crate::options::JwtOptions;
    use qsl_core::{Page, QslApp, QslService};
    use qsl_store::ConnectionRegistry;
    use serde_json::json;
    use std::collections::HashMap;

    type Params = AuthParams<()>;

    struct WhoAmI;

    #[async_trait]
    impl QslService<Value, Params> for WhoAmI {
        async fn find(&self, ctx: &TenantContext, params: Params) -> Result<Page<Value>> {
            let tenant = ctx.require_tenant()?.to_string();
            Ok(Page::all(vec![json!({
                "tenant": tenant,
                "user": params.user_id(),
            })]))
        }
    }

    struct Fixture {
        app: QslApp<Value, Params>,
        jwt: Arc<JwtService>,
        users: UserDirectory,
    }

    async fn fixture() -> Fixture {
        let registry =
            Arc::new(ConnectionRegistry::from_uri("memory://localhost/auth-hook-tests").unwrap());
        registry.init_administrative().await.unwrap();
        let users = UserDirectory::new(registry);
        let jwt = Arc::new(
            JwtService::new(JwtOptions {
                secret: Some("hook-secret".into()),
                ..JwtOptions::default()
            })
            .unwrap(),
        );

        let app: QslApp<Value, Params> = QslApp::new();
        app.register_service("whoami", Arc::new(WhoAmI));
        let hook = Arc::new(AuthenticateHook::new(Arc::clone(&jwt), users.clone()));
        app.service("whoami").unwrap().hooks(|h| {
            h.before_all(hook);
        });
        Fixture { app, jwt, users }
    }

    fn external(token: Option<&str>) -> Params {
        let mut headers = HashMap::new();
        if let Some(t) = token {
            headers.insert("authorization".to_string(), format!("Bearer {t}"));
        }
        AuthParams {
            provider: Some("rest".into()),
            headers,
            ..AuthParams::internal(())
        }
    }

    async fn user(f: &Fixture, active: bool) -> (String, String) {
        let doc = f
            .users
            .create(NewUser {
                username: format!("op{active}"),
                email: format!("op{active}@example.com"),
                password_hash: "x".into(),
                role: "user".into(),
                full_name: None,
                callsign: None,
                qth: None,
            })
            .await
            .unwrap();
        let id = doc["_id"].as_str().unwrap().to_string();
        if !active {
            f.users
                .registry()
                .administrative()
                .unwrap()
                .users()
                .set(&id, "isActive", json!(false))
                .await
                .unwrap();
        }
        let db = doc["userDatabaseName"].as_str().unwrap().to_string();
        let token = f.jwt.issue(&id, "user", &db).unwrap();
        (id, token)
    }

    #[tokio::test]
    async fn bearer_token_selects_the_users_tenant() {
        let f = fixture().await;
        let (id, token) = user(&f, true).await;

        let page = f
            .app
            .service("whoami")
            .unwrap()
            .find(TenantContext::anonymous(), external(Some(&token)))
            .await
            .unwrap();
        assert_eq!(page.data[0]["tenant"], format!("radio_card_user_{id}"));
        assert_eq!(page.data[0]["user"], id);
    }

    #[tokio::test]
    async fn missing_or_bad_tokens_are_rejected() {
        let f = fixture().await;
        let svc = f.app.service("whoami").unwrap();

        for params in [external(None), external(Some("not-a-jwt"))] {
            let err = svc.find(TenantContext::anonymous(), params).await.unwrap_err();
            assert_eq!(QslError::find_in(&err).unwrap().code(), 401);
        }
    }

    #[tokio::test]
    async fn inactive_users_are_rejected() {
        let f = fixture().await;
        let (_, token) = user(&f, false).await;
        let err = f
            .app
            .service("whoami")
            .unwrap()
            .find(TenantContext::anonymous(), external(Some(&token)))
            .await
            .unwrap_err();
        assert_eq!(QslError::find_in(&err).unwrap().code(), 401);
    }

    #[tokio::test]
    async fn internal_calls_keep_their_context() {
        let f = fixture().await;
        let svc = f.app.service("whoami").unwrap();

        let page = svc
            .find(TenantContext::new("radio_card_user_internal"), AuthParams::internal(()))
            .await
            .unwrap();
        assert_eq!(page.data[0]["tenant"], "radio_card_user_internal");

        let err = svc
            .find(TenantContext::anonymous(), AuthParams::internal(()))
            .await
            .unwrap_err();
        assert_eq!(QslError::find_in(&err).unwrap().code(), 401);
    }
}

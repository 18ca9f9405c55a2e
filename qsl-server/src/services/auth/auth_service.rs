use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use qsl_auth::directory::public_user;
use qsl_auth::password::{hash_password, verify_password};
use qsl_auth::NewUser;
use qsl_core::errors::QslError;
use qsl_core::tenant::TenantContext;
use qsl_core::{QslService, ServiceCapabilities};
use qsl_schema::validate;
use qsl_store::{object_id, registry_error, Document, ID_FIELD};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::services::adapters::{into_document, now, str_field};
use crate::services::{VaultParams, VaultState};

use super::auth_schema::{ChangePassword, Credentials, RegisterUser, UpdateMe, ERROR_MESSAGE};
use super::auth_shared;

/// Login, registration and the caller's own account.
pub struct AuthService {
    pub state: Arc<VaultState>,
}

fn invalid_credentials() -> anyhow::Error {
    QslError::not_authenticated("Invalid credentials").into_anyhow()
}

/// Only the caller's own account is reachable, as `me` or by id.
fn own_id<'a>(ctx: &'a TenantContext, id: &str) -> Result<&'a str> {
    let user_id = ctx.require_user()?;
    if id == "me" || id == user_id {
        return Ok(user_id);
    }
    Err(QslError::forbidden("Not allowed to access another account").into_anyhow())
}

impl AuthService {
    pub fn new(state: Arc<VaultState>) -> Self {
        Self { state }
    }

    /// Token plus public user, the shape every sign-in answers with.
    fn session(&self, user: Document) -> Result<Value> {
        let id = str_field(&user, ID_FIELD).unwrap_or_default();
        let role = str_field(&user, "role").unwrap_or("user");
        let db = str_field(&user, "userDatabaseName").unwrap_or_default();
        let token = self.state.jwt.issue(id, role, db)?;
        Ok(json!({"token": token, "user": public_user(user)}))
    }

    async fn login(&self, data: Value) -> Result<Value> {
        let creds: Credentials = validate(&data, "Username and password are required")?;
        let user = self
            .state
            .users
            .find_by_login(&creds.username)
            .await?
            .ok_or_else(invalid_credentials)?;

        let hash = str_field(&user, "password").unwrap_or_default();
        if !verify_password(&creds.password, hash).await? {
            warn!(login = %creds.username, "rejected login");
            return Err(invalid_credentials());
        }
        if user.get("isActive").and_then(Value::as_bool) == Some(false) {
            return Err(QslError::not_authenticated("Account is disabled").into_anyhow());
        }

        let id = str_field(&user, ID_FIELD).unwrap_or_default().to_string();
        self.state.users.touch_login(&id).await?;
        // Open the tenant now so the first data request does not pay for it.
        if let Some(db) = str_field(&user, "userDatabaseName") {
            self.state.registry.tenant(db).await.map_err(registry_error)?;
        }
        info!(user = %id, "login");

        let user = self.state.users.find_by_id(&id).await?.unwrap_or(user);
        self.session(user)
    }

    /// Create the account, open its tenant database and seed a default profile.
    async fn register(&self, data: Value, role: &str) -> Result<Value> {
        let input: RegisterUser = validate(&data, ERROR_MESSAGE)?;
        let password_hash = hash_password(&input.password, self.state.bcrypt_cost).await?;
        let user = self
            .state
            .users
            .create(NewUser {
                username: input.username.trim().to_string(),
                email: input.email,
                password_hash,
                role: role.to_string(),
                full_name: input.full_name,
                callsign: input.callsign.clone(),
                qth: input.qth.clone(),
            })
            .await?;

        let db = str_field(&user, "userDatabaseName").unwrap_or_default();
        let tenant = self.state.registry.tenant(db).await.map_err(registry_error)?;

        if let Some(callsign) = input.callsign.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            let ts = now();
            let profile = into_document(json!({
                "_id": object_id(),
                "callsignName": callsign.to_uppercase(),
                "qth": input.qth,
                "isDefault": true,
                "createdAt": ts,
                "updatedAt": ts,
            }))?;
            tenant.profiles().insert(profile).await?;
        }
        info!(user = ?user.get(ID_FIELD), tenant = %tenant.name(), role, "account registered");

        self.session(user)
    }

    async fn initialize(&self, data: Value) -> Result<Value> {
        if self.state.users.count().await? > 0 {
            return Err(QslError::bad_request("System is already initialized").into_anyhow());
        }
        self.register(data, "admin").await
    }

    async fn change_password(&self, ctx: &TenantContext, id: &str, data: Value) -> Result<Value> {
        let user_id = own_id(ctx, id)?;
        let input: ChangePassword = validate(&data, "Password change validation failed")?;
        let user = self
            .state
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| QslError::not_found("User not found").into_anyhow())?;

        let hash = str_field(&user, "password").unwrap_or_default();
        if !verify_password(&input.current_password, hash).await? {
            return Err(QslError::bad_request("Current password is incorrect").into_anyhow());
        }
        let new_hash = hash_password(&input.new_password, self.state.bcrypt_cost).await?;
        self.state.users.set_password_hash(user_id, &new_hash).await?;
        info!(user = %user_id, "password changed");

        let session = self.session(user)?;
        Ok(json!({"token": session["token"]}))
    }
}

#[async_trait]
impl QslService<Value, VaultParams> for AuthService {
    fn capabilities(&self) -> ServiceCapabilities {
        auth_shared::capabilities()
    }

    async fn create(&self, _ctx: &TenantContext, data: Value, _params: VaultParams) -> Result<Value> {
        self.login(data).await
    }

    async fn get(&self, ctx: &TenantContext, id: &str, _params: VaultParams) -> Result<Value> {
        let user_id = own_id(ctx, id)?;
        let user = self
            .state
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| QslError::not_found("User not found").into_anyhow())?;
        Ok(public_user(user))
    }

    async fn patch(
        &self,
        ctx: &TenantContext,
        id: Option<&str>,
        data: Value,
        _params: VaultParams,
    ) -> Result<Value> {
        let user_id = own_id(ctx, id.unwrap_or("me"))?;
        validate::<UpdateMe>(&data, "Profile validation failed")?;
        let user = self.state.users.update_profile(user_id, &data).await?;
        Ok(public_user(user))
    }

    async fn remove(&self, ctx: &TenantContext, id: Option<&str>, _params: VaultParams) -> Result<Value> {
        let user_id = own_id(ctx, id.unwrap_or("me"))?;
        info!(user = %user_id, "logout");
        Ok(json!({"message": "Logged out"}))
    }

    async fn custom(
        &self,
        ctx: &TenantContext,
        method: &str,
        id: Option<&str>,
        data: Option<Value>,
        _params: VaultParams,
    ) -> Result<Value> {
        let data = data.unwrap_or(Value::Null);
        match method {
            "register" => self.register(data, "user").await,
            "initialize" => self.initialize(data).await,
            "init-status" => Ok(json!({"isInitialized": self.state.users.count().await? > 0})),
            "change-password" => self.change_password(ctx, id.unwrap_or("me"), data).await,
            _ => Err(QslError::method_not_allowed(format!("Method not allowed: {method}")).into_anyhow()),
        }
    }
}

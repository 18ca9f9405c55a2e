//! Accounts in the administrative database, and the tenant each one owns.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use qsl_core::errors::QslError;
use qsl_store::{
    object_id, registry_error, Collection, ConnectionRegistry, Condition, Document, Filter,
};
use serde_json::{json, Value};
use tracing::info;

/// Every tenant database name starts with this.
pub const TENANT_DATABASE_PREFIX: &str = "radio_card_user_";

pub fn tenant_database_name(user_id: &str) -> String {
    format!("{TENANT_DATABASE_PREFIX}{user_id}")
}

/// A user about to be created. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub full_name: Option<String>,
    pub callsign: Option<String>,
    pub qth: Option<String>,
}

/// Identity boundary: user id → account and tenant database.
#[derive(Clone)]
pub struct UserDirectory {
    registry: Arc<ConnectionRegistry>,
}

impl UserDirectory {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    fn users(&self) -> Result<Collection> {
        let admin = self.registry.administrative().map_err(registry_error)?;
        Ok(admin.users())
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Document>> {
        self.users()?.get(id).await
    }

    /// Lookup by username, or by e-mail (case-insensitive).
    pub async fn find_by_login(&self, login: &str) -> Result<Option<Document>> {
        let login = login.trim();
        let filter = Filter::new().with(Condition::Any(vec![
            Filter::new().eq("username", login),
            Filter::new().eq("email", login.to_lowercase()),
        ]));
        self.users()?.find_one(filter).await
    }

    pub async fn count(&self) -> Result<usize> {
        self.users()?.count(&Filter::new()).await
    }

    pub async fn create(&self, user: NewUser) -> Result<Document> {
        let users = self.users()?;
        let email = user.email.trim().to_lowercase();
        let taken = Filter::new().with(Condition::Any(vec![
            Filter::new().eq("username", user.username.as_str()),
            Filter::new().eq("email", email.as_str()),
        ]));
        if users.count(&taken).await? > 0 {
            return Err(QslError::bad_request("User already exists").into_anyhow());
        }

        let id = object_id();
        let now = Utc::now().to_rfc3339();
        let mut doc = Document::new();
        let fields = json!({
            "_id": id,
            "username": user.username,
            "email": email,
            "password": user.password_hash,
            "role": user.role,
            "fullName": user.full_name,
            "callsign": user.callsign.map(|c| c.trim().to_uppercase()),
            "qth": user.qth,
            "userDatabaseName": tenant_database_name(&id),
            "isActive": true,
            "lastLogin": Value::Null,
            "createdAt": now,
            "updatedAt": now,
        });
        if let Value::Object(fields) = fields {
            doc.extend(fields);
        }

        let created = users.insert(doc).await?;
        info!(user = %id, "user created");
        Ok(created)
    }

    /// Tenant database of `user_id`, failing with 401 for unknown users.
    pub async fn tenant_of(&self, user_id: &str) -> Result<String> {
        let user = self
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| QslError::not_authenticated("User not found").into_anyhow())?;
        user.get("userDatabaseName")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| QslError::general_error("User has no database").into_anyhow())
    }

    pub async fn touch_login(&self, user_id: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let mut changes = Document::new();
        changes.insert("lastLogin".into(), Value::String(now.clone()));
        changes.insert("updatedAt".into(), Value::String(now));
        self.users()?.patch(user_id, changes).await?;
        Ok(())
    }

    /// Update `fullName`, `callsign` and `qth`; other keys are ignored.
    pub async fn update_profile(&self, user_id: &str, data: &Value) -> Result<Document> {
        let mut changes = Document::new();
        for key in ["fullName", "callsign", "qth"] {
            if let Some(v) = data.get(key) {
                let v = match (key, v) {
                    ("callsign", Value::String(s)) => Value::String(s.trim().to_uppercase()),
                    _ => v.clone(),
                };
                changes.insert(key.to_string(), v);
            }
        }
        changes.insert("updatedAt".into(), Value::String(Utc::now().to_rfc3339()));

        self.users()?
            .patch(user_id, changes)
            .await?
            .ok_or_else(|| QslError::not_found("User not found").into_anyhow())
    }

    pub async fn set_password_hash(&self, user_id: &str, hash: &str) -> Result<()> {
        let mut changes = Document::new();
        changes.insert("password".into(), Value::String(hash.to_string()));
        changes.insert("updatedAt".into(), Value::String(Utc::now().to_rfc3339()));
        self.users()?
            .patch(user_id, changes)
            .await?
            .ok_or_else(|| QslError::not_found("User not found").into_anyhow())?;
        Ok(())
    }
}

/// The user without its password hash.
pub fn public_user(mut user: Document) -> Value {
    user.remove("password");
    Value::Object(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn directory() -> UserDirectory {
        let registry =
            Arc::new(ConnectionRegistry::from_uri("memory://localhost/directory-tests").unwrap());
        registry.init_administrative().await.unwrap();
        UserDirectory::new(registry)
    }

    fn alice() -> NewUser {
        NewUser {
            username: "alice".into(),
            email: "Alice@Example.com".into(),
            password_hash: "$2b$04$hash".into(),
            role: "user".into(),
            full_name: None,
            callsign: Some(" bg7xyz ".into()),
            qth: None,
        }
    }

    #[tokio::test]
    async fn created_users_own_a_tenant_database() {
        let dir = directory().await;
        let user = dir.create(alice()).await.unwrap();
        let id = user["_id"].as_str().unwrap();

        assert_eq!(user["callsign"], "BG7XYZ");
        assert_eq!(user["email"], "alice@example.com");
        assert_eq!(dir.tenant_of(id).await.unwrap(), format!("radio_card_user_{id}"));
        assert!(dir.find_by_login("ALICE@example.com").await.unwrap().is_some());
        assert!(public_user(user).get("password").is_none());
    }

    #[tokio::test]
    async fn duplicate_users_are_rejected() {
        let dir = directory().await;
        dir.create(alice()).await.unwrap();
        let err = dir.create(alice()).await.unwrap_err();
        assert_eq!(QslError::find_in(&err).unwrap().message, "User already exists");
        assert_eq!(dir.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn unknown_users_have_no_tenant() {
        let dir = directory().await;
        let err = dir.tenant_of("507f1f77bcf86cd799439011").await.unwrap_err();
        assert_eq!(QslError::find_in(&err).unwrap().code(), 401);
    }
}

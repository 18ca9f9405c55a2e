//! Tenant context carried through every service call.
//!
//! A request starts out anonymous. Only an authentication hook may attach a
//! tenant, and there is no fallback tenant: code that needs tenant storage
//! must go through [`TenantContext::require_tenant`].

use std::fmt;

use crate::errors::QslError;

/// Name of a tenant database, e.g. `radio_card_user_507f1f77bcf86cd799439011`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TenantId(String);

impl TenantId {
    /// Returns `None` for blank names.
    pub fn new(name: impl Into<String>) -> Option<Self> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of the caller as established by authentication.
#[derive(Debug, Clone, Default)]
pub struct TenantContext {
    tenant_id: Option<TenantId>,
    pub user_id: Option<String>,
    pub role: Option<String>,
}

impl TenantContext {
    /// Context of a request nobody has authenticated yet.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Context bound to a tenant database. A blank name yields an anonymous context.
    pub fn new<S: Into<String>>(tenant: S) -> Self {
        Self {
            tenant_id: TenantId::new(tenant),
            user_id: None,
            role: None,
        }
    }

    pub fn for_user(
        user_id: impl Into<String>,
        role: impl Into<String>,
        tenant: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: TenantId::new(tenant),
            user_id: Some(user_id.into()),
            role: Some(role.into()),
        }
    }

    pub fn tenant_id(&self) -> Option<&TenantId> {
        self.tenant_id.as_ref()
    }

    pub fn is_anonymous(&self) -> bool {
        self.tenant_id.is_none()
    }

    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some("admin")
    }

    pub fn require_tenant(&self) -> anyhow::Result<&TenantId> {
        self.tenant_id
            .as_ref()
            .ok_or_else(|| QslError::not_authenticated("Not authenticated").into_anyhow())
    }

    pub fn require_user(&self) -> anyhow::Result<&str> {
        self.user_id
            .as_deref()
            .ok_or_else(|| QslError::not_authenticated("Not authenticated").into_anyhow())
    }
}

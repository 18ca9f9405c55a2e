use std::sync::Arc;

use anyhow::Result;
use qsl_auth::{AuthenticateHook, JwtService, UserDirectory};
use qsl_axum::params::RestParams;
use qsl_core::TenantContext;
use qsl_store::{registry_error, AdminHandle, ConnectionRegistry, TenantHandle};

use crate::config::Paginate;
use crate::numbering::Numbering;
use crate::render::CertificateRenderer;

pub type VaultParams = qsl_auth::AuthParams<RestParams>;

/// Everything the services share.
pub struct VaultState {
    pub registry: Arc<ConnectionRegistry>,
    pub users: UserDirectory,
    pub jwt: Arc<JwtService>,
    pub authenticate: Arc<AuthenticateHook>,
    pub bcrypt_cost: u32,
    pub paginate: Paginate,
    pub numbering: Numbering,
    pub renderer: CertificateRenderer,
}

impl VaultState {
    /// Tenant database of the caller. Anonymous contexts get a 401.
    pub async fn tenant(&self, ctx: &TenantContext) -> Result<TenantHandle> {
        let name = ctx.require_tenant()?;
        self.registry.tenant(name.as_str()).await.map_err(registry_error)
    }

    pub fn admin(&self) -> Result<AdminHandle> {
        self.registry.administrative().map_err(registry_error)
    }
}

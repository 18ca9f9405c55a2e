//! QSL card vault: a multi-tenant backend for amateur-radio QSL cards.
//!
//! Every account owns a tenant database; the connection registry in
//! `qsl-store` opens it on first use and the services reach it only through
//! the authenticated request's tenant context.

pub mod app;
pub mod config;
pub mod hooks;
pub mod numbering;
pub mod render;
pub mod services;

use std::sync::Arc;

use anyhow::{Context, Result};
use qsl_auth::{AuthenticateHook, JwtService, UserDirectory};
use qsl_axum::AxumApp;
use qsl_store::ConnectionRegistry;
use serde_json::Value;
use tracing::info;

use crate::config::Paginate;
use crate::numbering::Numbering;
use crate::render::CertificateRenderer;
use crate::services::{VaultParams, VaultState};

/// The mounted HTTP app plus the state its services share.
pub struct Vault {
    pub ax: AxumApp<Value, VaultParams>,
    pub state: Arc<VaultState>,
}

impl Vault {
    pub fn router(&self) -> axum::Router {
        self.ax.router.clone()
    }

    /// Close every tenant connection and the administrative one.
    pub async fn shutdown(&self) {
        self.state.registry.close_all().await;
    }
}

/// Open the administrative database, build the services and mount them.
///
/// Fails when the store is unreachable: without the administrative
/// connection there is no way to resolve a tenant.
pub async fn build(app: qsl_core::QslApp<Value, VaultParams>) -> Result<Vault> {
    let auth = config::auth_options(&app)?;
    let paginate = Paginate::from_app(&app);

    let uri = app
        .get("store.uri")
        .context("store.uri is not configured")?;
    let registry = Arc::new(ConnectionRegistry::from_uri(&uri)?);
    let admin = registry.init_administrative().await?;
    info!(database = %admin.database(), "store ready");

    let jwt = Arc::new(JwtService::new(auth.jwt).map_err(|e| e.into_anyhow())?);
    let users = UserDirectory::new(Arc::clone(&registry));
    let authenticate = Arc::new(AuthenticateHook::new(Arc::clone(&jwt), users.clone()));

    let state = Arc::new(VaultState {
        registry: Arc::clone(&registry),
        users,
        jwt,
        authenticate,
        bcrypt_cost: auth.bcrypt_cost,
        paginate,
        numbering: Numbering::new(Arc::clone(&registry)),
        renderer: CertificateRenderer::html()?,
    });
    app.insert_extension(Arc::clone(&registry));

    hooks::global_hooks(&app);
    let svcs = services::configure(&app, Arc::clone(&state))?;

    let mut ax = qsl_axum::axum(app);
    for (path, svc) in svcs.mounts {
        ax = ax.use_service(path, svc);
    }

    Ok(Vault { ax, state })
}

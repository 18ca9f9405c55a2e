//! qsl-core: framework-agnostic service container for the QSL card vault.
//!
//! Services implement [`QslService`], get registered on a [`QslApp`] and run
//! through the hook pipeline (around → before → service → after → error).
//! Transports such as `qsl-axum` only talk to [`ServiceHandle`]s.

pub mod adapters;
pub mod app;
pub mod config;
pub mod errors;
pub mod hooks;
pub mod registry;
pub mod schema;
pub mod service;
pub mod tenant;

pub use app::{QslApp, ServiceCaller, ServiceHandle};
pub use config::{load_env_config, parse_duration, QslConfig, QslConfigSnapshot};
pub use errors::{ErrorKind, QslError};
pub use hooks::{
    HookContext, HookFut, HookResult, Next, QslAfterHook, QslAroundHook, QslBeforeHook,
    QslErrorHook, ServiceHooks,
};
pub use registry::QslServiceRegistry;
pub use schema::{HookMeta, ResolveData, SchemaHooksExt, ValidateData, WriteMethods};
pub use service::{Page, Pagination, QslService, ServiceCapabilities, ServiceMethodKind};
pub use tenant::{TenantContext, TenantId};

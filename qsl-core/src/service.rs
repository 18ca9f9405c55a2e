use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::errors::QslError;
use crate::tenant::TenantContext;

/// Standard service methods, similar to Feathers:
/// find, get, create, update, patch, remove.
///
/// Custom methods are declared via `Custom("method-name")`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ServiceMethodKind {
    Find,
    Get,
    Create,
    Update,
    Patch,
    Remove,
    Custom(&'static str),
}

impl ServiceMethodKind {
    pub fn name(&self) -> &'static str {
        match self {
            ServiceMethodKind::Find => "find",
            ServiceMethodKind::Get => "get",
            ServiceMethodKind::Create => "create",
            ServiceMethodKind::Update => "update",
            ServiceMethodKind::Patch => "patch",
            ServiceMethodKind::Remove => "remove",
            ServiceMethodKind::Custom(name) => name,
        }
    }
}

/// Capabilities describe which methods a service exposes to transports.
///
/// The HTTP adapter answers 405 for anything not listed here. Only the
/// custom methods in `read_methods` may be reached with `GET`.
#[derive(Debug, Clone, Default)]
pub struct ServiceCapabilities {
    pub allowed_methods: Vec<ServiceMethodKind>,
    pub read_methods: Vec<&'static str>,
}

impl ServiceCapabilities {
    /// Full CRUD, equivalent to Feathers default:
    /// ['find', 'get', 'create', 'patch', 'update', 'remove']
    pub fn standard_crud() -> Self {
        use ServiceMethodKind::*;
        Self::from_methods(vec![Find, Get, Create, Update, Patch, Remove])
    }

    pub fn read_only() -> Self {
        use ServiceMethodKind::*;
        Self::from_methods(vec![Find, Get])
    }

    pub fn from_methods(methods: Vec<ServiceMethodKind>) -> Self {
        Self {
            allowed_methods: methods,
            read_methods: Vec::new(),
        }
    }

    pub fn with_custom(mut self, names: &[&'static str]) -> Self {
        self.allowed_methods
            .extend(names.iter().map(|n| ServiceMethodKind::Custom(n)));
        self
    }

    /// Custom methods without side effects; these also answer `GET`.
    pub fn with_read_custom(mut self, names: &[&'static str]) -> Self {
        self.read_methods.extend_from_slice(names);
        self.with_custom(names)
    }

    pub fn is_read(&self, name: &str) -> bool {
        self.read_methods.iter().any(|m| *m == name)
    }

    pub fn allows(&self, method: &ServiceMethodKind) -> bool {
        self.allowed_methods.contains(method)
    }

    /// Resolve a transport-supplied method name to its declared custom method.
    pub fn custom_method(&self, name: &str) -> Option<ServiceMethodKind> {
        self.allowed_methods.iter().find_map(|m| match m {
            ServiceMethodKind::Custom(n) if *n == name => Some(ServiceMethodKind::Custom(n)),
            _ => None,
        })
    }
}

/// One page of a `find` result.
#[derive(Debug, Clone, Serialize)]
pub struct Page<R> {
    pub data: Vec<R>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
}

impl<R> Page<R> {
    /// A single page holding every record.
    pub fn all(data: Vec<R>) -> Self {
        let total = data.len();
        Self {
            data,
            total,
            page: 1,
            limit: total,
        }
    }

    pub fn pages(&self) -> usize {
        if self.limit == 0 {
            return if self.total == 0 { 0 } else { 1 };
        }
        self.total.div_ceil(self.limit)
    }
}

/// Pagination metadata of a page, without the records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub pages: usize,
}

impl<R> From<&Page<R>> for Pagination {
    fn from(page: &Page<R>) -> Self {
        Self {
            page: page.page,
            limit: page.limit,
            total: page.total,
            pages: page.pages(),
        }
    }
}

fn not_implemented(method: &str) -> anyhow::Error {
    QslError::method_not_allowed(format!("Method not allowed: {method}")).into_anyhow()
}

/// Core service trait, inspired by FeathersJS:
///
/// - `find`   → list/query many
/// - `get`    → fetch one by id
/// - `create` → create one
/// - `update` → full replace
/// - `patch`  → partial update
/// - `remove` → delete one
/// - `custom` → any named method declared in [`ServiceCapabilities`]
///
/// Every method defaults to a MethodNotAllowed error, so a service
/// overrides only what it supports.
#[async_trait]
pub trait QslService<R, P = ()>: Send + Sync
where
    R: Send + 'static,
    P: Send + 'static,
{
    fn capabilities(&self) -> ServiceCapabilities {
        ServiceCapabilities::standard_crud()
    }

    async fn find(&self, _ctx: &TenantContext, _params: P) -> Result<Page<R>> {
        Err(not_implemented("find"))
    }

    async fn get(&self, _ctx: &TenantContext, _id: &str, _params: P) -> Result<R> {
        Err(not_implemented("get"))
    }

    async fn create(&self, _ctx: &TenantContext, _data: R, _params: P) -> Result<R> {
        Err(not_implemented("create"))
    }

    async fn update(&self, _ctx: &TenantContext, _id: &str, _data: R, _params: P) -> Result<R> {
        Err(not_implemented("update"))
    }

    async fn patch(
        &self,
        _ctx: &TenantContext,
        _id: Option<&str>,
        _data: R,
        _params: P,
    ) -> Result<R> {
        Err(not_implemented("patch"))
    }

    async fn remove(&self, _ctx: &TenantContext, _id: Option<&str>, _params: P) -> Result<R> {
        Err(not_implemented("remove"))
    }

    /// `id` is `Some` for item-level methods (`/{id}/{method}`).
    async fn custom(
        &self,
        _ctx: &TenantContext,
        method: &str,
        _id: Option<&str>,
        _data: Option<R>,
        _params: P,
    ) -> Result<R> {
        Err(not_implemented(method))
    }
}

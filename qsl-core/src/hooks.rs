//! Feathers-style hooks.
//!
//! Execution order for one call:
//! `around` (outermost first) → `before` → service method → `after` → `error` on failure.
//! Global hooks run before service hooks in every stage.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::app::ServiceCaller;
use crate::config::QslConfigSnapshot;
use crate::service::{Pagination, ServiceMethodKind};
use crate::tenant::TenantContext;

pub type HookFut<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// What a service call produced.
#[derive(Debug, Clone)]
pub enum HookResult<R> {
    One(R),
    Many(Vec<R>),
}

impl<R> HookResult<R> {
    /// Apply `f` to every record in the result.
    pub fn map_records(self, mut f: impl FnMut(R) -> R) -> Self {
        match self {
            HookResult::One(v) => HookResult::One(f(v)),
            HookResult::Many(vs) => HookResult::Many(vs.into_iter().map(f).collect()),
        }
    }
}

/// Mutable state shared by every hook of one service call.
pub struct HookContext<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    pub tenant: TenantContext,
    pub service: String,
    pub method: ServiceMethodKind,
    pub id: Option<String>,
    pub params: P,
    pub data: Option<R>,
    pub result: Option<HookResult<R>>,
    pub pagination: Option<Pagination>,
    pub error: Option<anyhow::Error>,
    pub services: ServiceCaller<R, P>,
    pub config: QslConfigSnapshot,
}

impl<R, P> HookContext<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    pub fn new(
        tenant: TenantContext,
        service: impl Into<String>,
        method: ServiceMethodKind,
        params: P,
        services: ServiceCaller<R, P>,
        config: QslConfigSnapshot,
    ) -> Self {
        Self {
            tenant,
            service: service.into(),
            method,
            id: None,
            params,
            data: None,
            result: None,
            pagination: None,
            error: None,
            services,
            config,
        }
    }
}

#[async_trait]
pub trait QslBeforeHook<R, P>: Send + Sync
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    async fn run(&self, ctx: &mut HookContext<R, P>) -> Result<()>;
}

#[async_trait]
pub trait QslAfterHook<R, P>: Send + Sync
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    async fn run(&self, ctx: &mut HookContext<R, P>) -> Result<()>;
}

/// Runs with `ctx.error` set. Clearing it (and setting `ctx.result`) recovers the call.
#[async_trait]
pub trait QslErrorHook<R, P>: Send + Sync
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    async fn run(&self, ctx: &mut HookContext<R, P>) -> Result<()>;
}

#[async_trait]
pub trait QslAroundHook<R, P>: Send + Sync
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    async fn run(&self, ctx: &mut HookContext<R, P>, next: Next<R, P>) -> Result<()>;
}

type NextFn<R, P> = Box<dyn for<'a> FnOnce(&'a mut HookContext<R, P>) -> HookFut<'a> + Send>;

/// The rest of the pipeline, handed to around hooks.
pub struct Next<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    call: NextFn<R, P>,
}

impl<R, P> Next<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    pub(crate) fn new<F>(f: F) -> Self
    where
        F: for<'a> FnOnce(&'a mut HookContext<R, P>) -> HookFut<'a> + Send + 'static,
    {
        Self { call: Box::new(f) }
    }

    pub async fn run(self, ctx: &mut HookContext<R, P>) -> Result<()> {
        (self.call)(ctx).await
    }
}

type HookMap<H> = HashMap<ServiceMethodKind, Vec<Arc<H>>>;

/// Hooks registered on the app or on one service.
pub struct ServiceHooks<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    pub(crate) around_all: Vec<Arc<dyn QslAroundHook<R, P>>>,
    pub(crate) around_by_method: HookMap<dyn QslAroundHook<R, P>>,
    pub(crate) before_all: Vec<Arc<dyn QslBeforeHook<R, P>>>,
    pub(crate) before_by_method: HookMap<dyn QslBeforeHook<R, P>>,
    pub(crate) after_all: Vec<Arc<dyn QslAfterHook<R, P>>>,
    pub(crate) after_by_method: HookMap<dyn QslAfterHook<R, P>>,
    pub(crate) error_all: Vec<Arc<dyn QslErrorHook<R, P>>>,
    pub(crate) error_by_method: HookMap<dyn QslErrorHook<R, P>>,
}

impl<R, P> Default for ServiceHooks<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! method_shortcuts {
    ($register:ident, $hook:ident, $( $name:ident => $method:ident ),* $(,)?) => {
        $(
            pub fn $name(&mut self, hook: Arc<dyn $hook<R, P>>) -> &mut Self {
                self.$register(ServiceMethodKind::$method, hook)
            }
        )*
    };
}

impl<R, P> ServiceHooks<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    pub fn new() -> Self {
        Self {
            around_all: Vec::new(),
            around_by_method: HashMap::new(),
            before_all: Vec::new(),
            before_by_method: HashMap::new(),
            after_all: Vec::new(),
            after_by_method: HashMap::new(),
            error_all: Vec::new(),
            error_by_method: HashMap::new(),
        }
    }

    pub fn around_all(&mut self, hook: Arc<dyn QslAroundHook<R, P>>) -> &mut Self {
        self.around_all.push(hook);
        self
    }

    pub fn around(&mut self, method: ServiceMethodKind, hook: Arc<dyn QslAroundHook<R, P>>) -> &mut Self {
        self.around_by_method.entry(method).or_default().push(hook);
        self
    }

    pub fn before_all(&mut self, hook: Arc<dyn QslBeforeHook<R, P>>) -> &mut Self {
        self.before_all.push(hook);
        self
    }

    pub fn before(&mut self, method: ServiceMethodKind, hook: Arc<dyn QslBeforeHook<R, P>>) -> &mut Self {
        self.before_by_method.entry(method).or_default().push(hook);
        self
    }

    pub fn after_all(&mut self, hook: Arc<dyn QslAfterHook<R, P>>) -> &mut Self {
        self.after_all.push(hook);
        self
    }

    pub fn after(&mut self, method: ServiceMethodKind, hook: Arc<dyn QslAfterHook<R, P>>) -> &mut Self {
        self.after_by_method.entry(method).or_default().push(hook);
        self
    }

    pub fn error_all(&mut self, hook: Arc<dyn QslErrorHook<R, P>>) -> &mut Self {
        self.error_all.push(hook);
        self
    }

    pub fn error(&mut self, method: ServiceMethodKind, hook: Arc<dyn QslErrorHook<R, P>>) -> &mut Self {
        self.error_by_method.entry(method).or_default().push(hook);
        self
    }

    method_shortcuts!(before, QslBeforeHook,
        before_find => Find,
        before_get => Get,
        before_create => Create,
        before_update => Update,
        before_patch => Patch,
        before_remove => Remove,
    );

    method_shortcuts!(after, QslAfterHook,
        after_find => Find,
        after_get => Get,
        after_create => Create,
        after_update => Update,
        after_patch => Patch,
        after_remove => Remove,
    );
}

/// `all` hooks first, then the ones registered for `method`.
pub(crate) fn collect_method_hooks<H: ?Sized>(
    all: &[Arc<H>],
    by_method: &HashMap<ServiceMethodKind, Vec<Arc<H>>>,
    method: &ServiceMethodKind,
) -> Vec<Arc<H>> {
    let mut out: Vec<Arc<H>> = all.to_vec();
    if let Some(list) = by_method.get(method) {
        out.extend(list.iter().cloned());
    }
    out
}

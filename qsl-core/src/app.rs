use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use parking_lot::RwLock;

use crate::errors::QslError;
use crate::hooks::{collect_method_hooks, HookFut};
use crate::service::{Page, Pagination};
use crate::{
    HookContext, HookResult, Next, QslAfterHook, QslAroundHook, QslBeforeHook, QslConfig,
    QslConfigSnapshot, QslErrorHook, QslService, QslServiceRegistry, ServiceCapabilities,
    ServiceHooks, ServiceMethodKind, TenantContext,
};

struct QslAppInner<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    registry: RwLock<QslServiceRegistry<R, P>>,
    global_hooks: RwLock<ServiceHooks<R, P>>,
    service_hooks: RwLock<HashMap<String, ServiceHooks<R, P>>>,
    config: RwLock<QslConfig>,
    // Arc<dyn QslService<R, P>> boxed as Any, for typed lookups from hooks.
    any_services: RwLock<HashMap<String, Box<dyn Any + Send + Sync>>>,
    extensions: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

/// Central application container.
///
/// Framework-agnostic. Holds:
/// - service registry
/// - app hooks
/// - per-service hooks
/// - config
/// - typed extensions shared by services and hooks
pub struct QslApp<R, P = ()>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    inner: Arc<QslAppInner<R, P>>,
}

type HooksForMethod<R, P> = (
    Vec<Arc<dyn QslAroundHook<R, P>>>,
    Vec<Arc<dyn QslBeforeHook<R, P>>>,
    Vec<Arc<dyn QslAfterHook<R, P>>>,
    Vec<Arc<dyn QslErrorHook<R, P>>>,
);

type ServiceCall<R, P> = Box<
    dyn for<'a> FnOnce(Arc<dyn QslService<R, P>>, &'a mut HookContext<R, P>) -> HookFut<'a>
        + Send,
>;

fn service_call<R, P, F>(f: F) -> ServiceCall<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
    F: for<'a> FnOnce(Arc<dyn QslService<R, P>>, &'a mut HookContext<R, P>) -> HookFut<'a>
        + Send
        + 'static,
{
    Box::new(f)
}

impl<R, P> Default for QslApp<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<R, P> Clone for QslApp<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R, P> QslApp<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    pub fn new() -> Self {
        Self {
            inner: Arc::new(QslAppInner {
                registry: RwLock::new(QslServiceRegistry::new()),
                global_hooks: RwLock::new(ServiceHooks::new()),
                service_hooks: RwLock::new(HashMap::new()),
                config: RwLock::new(QslConfig::new()),
                any_services: RwLock::new(HashMap::new()),
                extensions: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn register_service<S>(&self, name: S, service: Arc<dyn QslService<R, P>>)
    where
        S: Into<String>,
    {
        let name = name.into();
        self.inner
            .registry
            .write()
            .register(name.clone(), Arc::clone(&service));
        self.inner
            .any_services
            .write()
            .insert(name, Box::new(service));
    }

    /// Feathers: `app.hooks({ ... })`
    pub fn hooks<F>(&self, f: F)
    where
        F: FnOnce(&mut ServiceHooks<R, P>),
    {
        let mut g = self.inner.global_hooks.write();
        f(&mut g);
    }

    pub(crate) fn configure_service_hooks<F>(&self, service_name: &str, f: F)
    where
        F: FnOnce(&mut ServiceHooks<R, P>),
    {
        let mut map = self.inner.service_hooks.write();
        let hooks = map.entry(service_name.to_string()).or_default();
        f(hooks);
    }

    /// Feathers: `app.service("name")`
    pub fn service(&self, name: &str) -> Result<ServiceHandle<R, P>> {
        let svc = self
            .inner
            .registry
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| QslError::not_found(format!("Service not found: {name}")).into_anyhow())?;

        Ok(ServiceHandle {
            app: self.clone(),
            name: name.to_string(),
            service: svc,
        })
    }

    pub fn service_names(&self) -> Vec<String> {
        self.inner
            .registry
            .read()
            .names()
            .map(|n| n.to_string())
            .collect()
    }

    /// Feathers: `app.set(key, value)`
    pub fn set<K, V>(&self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.inner.config.write().set(key, value);
    }

    /// Feathers: `app.get(key)`
    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.config.read().get(key).map(|v| v.to_string())
    }

    pub fn config_snapshot(&self) -> QslConfigSnapshot {
        self.inner.config.read().snapshot()
    }

    /// Share a typed object (a connection registry, an auth service) with the whole app.
    pub fn insert_extension<T>(&self, value: Arc<T>)
    where
        T: Any + Send + Sync,
    {
        self.inner
            .extensions
            .write()
            .insert(TypeId::of::<T>(), value);
    }

    pub fn extension<T>(&self) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        let ext = self.inner.extensions.read().get(&TypeId::of::<T>()).cloned()?;
        ext.downcast::<T>().ok()
    }
}

pub struct ServiceHandle<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    app: QslApp<R, P>,
    name: String,
    service: Arc<dyn QslService<R, P>>,
}

impl<R, P> ServiceHandle<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    /// Feathers: `app.service("x").hooks({ ... })`
    pub fn hooks<F>(self, f: F) -> Self
    where
        F: FnOnce(&mut ServiceHooks<R, P>),
    {
        self.app.configure_service_hooks(&self.name, f);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inner(&self) -> &Arc<dyn QslService<R, P>> {
        &self.service
    }

    pub fn capabilities(&self) -> ServiceCapabilities {
        self.service.capabilities()
    }

    /// Global hooks first, then service hooks.
    fn collect_hooks_for_method(&self, method: &ServiceMethodKind) -> HooksForMethod<R, P> {
        let g = self.app.inner.global_hooks.read();
        let map = self.app.inner.service_hooks.read();

        let mut around = collect_method_hooks(&g.around_all, &g.around_by_method, method);
        let mut before = collect_method_hooks(&g.before_all, &g.before_by_method, method);
        let mut after = collect_method_hooks(&g.after_all, &g.after_by_method, method);
        let mut error = collect_method_hooks(&g.error_all, &g.error_by_method, method);

        if let Some(h) = map.get(&self.name) {
            around.extend(collect_method_hooks(&h.around_all, &h.around_by_method, method));
            before.extend(collect_method_hooks(&h.before_all, &h.before_by_method, method));
            after.extend(collect_method_hooks(&h.after_all, &h.after_by_method, method));
            error.extend(collect_method_hooks(&h.error_all, &h.error_by_method, method));
        }

        (around, before, after, error)
    }

    fn context(&self, tenant: TenantContext, method: ServiceMethodKind, params: P) -> HookContext<R, P> {
        HookContext::new(
            tenant,
            self.name.clone(),
            method,
            params,
            ServiceCaller::new(self.app.clone()),
            self.app.config_snapshot(),
        )
    }

    /// around → before → service call → after, then error hooks on failure.
    async fn run_pipeline(
        &self,
        mut ctx: HookContext<R, P>,
        call: ServiceCall<R, P>,
    ) -> Result<HookContext<R, P>> {
        let (around, before, after, error) = self.collect_hooks_for_method(&ctx.method);
        let svc = Arc::clone(&self.service);

        let mut next: Next<R, P> = Next::new(move |ctx| {
            Box::pin(async move {
                for h in &before {
                    h.run(&mut *ctx).await?;
                }

                call(svc, &mut *ctx).await?;

                for h in &after {
                    h.run(&mut *ctx).await?;
                }

                Ok(())
            })
        });

        for hook in around.into_iter().rev() {
            let prev = next;
            next = Next::new(move |ctx| {
                Box::pin(async move { hook.run(ctx, prev).await })
            });
        }

        if let Err(e) = next.run(&mut ctx).await {
            ctx.error = Some(e);

            for h in &error {
                if let Err(hook_err) = h.run(&mut ctx).await {
                    ctx.error = Some(hook_err);
                }
            }

            if let Some(err) = ctx.error.take() {
                return Err(err);
            }
        }

        Ok(ctx)
    }

    fn expect_one(ctx: HookContext<R, P>, method: &str) -> Result<R> {
        match ctx.result {
            Some(HookResult::One(v)) => Ok(v),
            Some(HookResult::Many(_)) => Err(anyhow::anyhow!(
                "{method}() produced HookResult::Many unexpectedly"
            )),
            None => Err(anyhow::anyhow!("{method}() produced no result")),
        }
    }

    pub async fn find(&self, tenant: TenantContext, params: P) -> Result<Page<R>> {
        let ctx = self.context(tenant, ServiceMethodKind::Find, params);

        let ctx = self
            .run_pipeline(
                ctx,
                service_call::<R, P, _>(|svc, ctx| {
                    Box::pin(async move {
                        let page = svc.find(&ctx.tenant, ctx.params.clone()).await?;
                        ctx.pagination = Some(Pagination::from(&page));
                        ctx.result = Some(HookResult::Many(page.data));
                        Ok(())
                    })
                }),
            )
            .await?;

        let data = match ctx.result {
            Some(HookResult::Many(v)) => v,
            Some(HookResult::One(_)) => {
                return Err(anyhow::anyhow!("find() produced HookResult::One unexpectedly"))
            }
            None => Vec::new(),
        };

        Ok(match ctx.pagination {
            Some(p) => Page {
                data,
                total: p.total,
                page: p.page,
                limit: p.limit,
            },
            None => Page::all(data),
        })
    }

    pub async fn get(&self, tenant: TenantContext, id: &str, params: P) -> Result<R> {
        let mut ctx = self.context(tenant, ServiceMethodKind::Get, params);
        ctx.id = Some(id.to_string());

        let ctx = self
            .run_pipeline(
                ctx,
                service_call::<R, P, _>(|svc, ctx| {
                    Box::pin(async move {
                        let id = ctx.id.clone().unwrap_or_default();
                        let record = svc.get(&ctx.tenant, &id, ctx.params.clone()).await?;
                        ctx.result = Some(HookResult::One(record));
                        Ok(())
                    })
                }),
            )
            .await?;

        Self::expect_one(ctx, "get")
    }

    pub async fn create(&self, tenant: TenantContext, data: R, params: P) -> Result<R> {
        let mut ctx = self.context(tenant, ServiceMethodKind::Create, params);
        ctx.data = Some(data);

        let ctx = self
            .run_pipeline(
                ctx,
                service_call::<R, P, _>(|svc, ctx| {
                    Box::pin(async move {
                        let data = ctx
                            .data
                            .take()
                            .ok_or_else(|| anyhow::anyhow!("create() requires ctx.data"))?;
                        let created = svc.create(&ctx.tenant, data, ctx.params.clone()).await?;
                        ctx.result = Some(HookResult::One(created));
                        Ok(())
                    })
                }),
            )
            .await?;

        Self::expect_one(ctx, "create")
    }

    pub async fn update(&self, tenant: TenantContext, id: &str, data: R, params: P) -> Result<R> {
        let mut ctx = self.context(tenant, ServiceMethodKind::Update, params);
        ctx.id = Some(id.to_string());
        ctx.data = Some(data);

        let ctx = self
            .run_pipeline(
                ctx,
                service_call::<R, P, _>(|svc, ctx| {
                    Box::pin(async move {
                        let id = ctx.id.clone().unwrap_or_default();
                        let data = ctx
                            .data
                            .take()
                            .ok_or_else(|| anyhow::anyhow!("update() requires ctx.data"))?;
                        let updated = svc
                            .update(&ctx.tenant, &id, data, ctx.params.clone())
                            .await?;
                        ctx.result = Some(HookResult::One(updated));
                        Ok(())
                    })
                }),
            )
            .await?;

        Self::expect_one(ctx, "update")
    }

    pub async fn patch(
        &self,
        tenant: TenantContext,
        id: Option<&str>,
        data: R,
        params: P,
    ) -> Result<R> {
        let mut ctx = self.context(tenant, ServiceMethodKind::Patch, params);
        ctx.id = id.map(|s| s.to_string());
        ctx.data = Some(data);

        let ctx = self
            .run_pipeline(
                ctx,
                service_call::<R, P, _>(|svc, ctx| {
                    Box::pin(async move {
                        let id = ctx.id.clone();
                        let data = ctx
                            .data
                            .take()
                            .ok_or_else(|| anyhow::anyhow!("patch() requires ctx.data"))?;
                        let patched = svc
                            .patch(&ctx.tenant, id.as_deref(), data, ctx.params.clone())
                            .await?;
                        ctx.result = Some(HookResult::One(patched));
                        Ok(())
                    })
                }),
            )
            .await?;

        Self::expect_one(ctx, "patch")
    }

    pub async fn remove(&self, tenant: TenantContext, id: Option<&str>, params: P) -> Result<R> {
        let mut ctx = self.context(tenant, ServiceMethodKind::Remove, params);
        ctx.id = id.map(|s| s.to_string());

        let ctx = self
            .run_pipeline(
                ctx,
                service_call::<R, P, _>(|svc, ctx| {
                    Box::pin(async move {
                        let id = ctx.id.clone();
                        let removed = svc
                            .remove(&ctx.tenant, id.as_deref(), ctx.params.clone())
                            .await?;
                        ctx.result = Some(HookResult::One(removed));
                        Ok(())
                    })
                }),
            )
            .await?;

        Self::expect_one(ctx, "remove")
    }

    /// Run a declared custom method. Undeclared names fail with MethodNotAllowed.
    pub async fn custom(
        &self,
        tenant: TenantContext,
        method: &str,
        id: Option<&str>,
        data: Option<R>,
        params: P,
    ) -> Result<R> {
        let kind = self.capabilities().custom_method(method).ok_or_else(|| {
            QslError::method_not_allowed(format!("Method not allowed: {method}")).into_anyhow()
        })?;

        let mut ctx = self.context(tenant, kind.clone(), params);
        ctx.id = id.map(|s| s.to_string());
        ctx.data = data;

        let ctx = self
            .run_pipeline(
                ctx,
                service_call::<R, P, _>(move |svc, ctx| {
                    Box::pin(async move {
                        let id = ctx.id.clone();
                        let data = ctx.data.take();
                        let out = svc
                            .custom(&ctx.tenant, kind.name(), id.as_deref(), data, ctx.params.clone())
                            .await?;
                        ctx.result = Some(HookResult::One(out));
                        Ok(())
                    })
                }),
            )
            .await?;

        Self::expect_one(ctx, "custom")
    }
}

/// Lets hooks reach other services of the same app.
pub struct ServiceCaller<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    app: QslApp<R, P>,
}

impl<R, P> Clone for ServiceCaller<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    fn clone(&self) -> Self {
        Self {
            app: self.app.clone(),
        }
    }
}

impl<R, P> ServiceCaller<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    pub fn new(app: QslApp<R, P>) -> Self {
        Self { app }
    }

    /// Handle that runs the target's hooks.
    pub fn handle(&self, name: &str) -> Result<ServiceHandle<R, P>> {
        self.app.service(name)
    }

    pub fn extension<T>(&self) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        self.app.extension::<T>()
    }

    /// Raw service, bypassing hooks. `R2`/`P2` must match what was registered.
    pub fn service<R2, P2>(&self, name: &str) -> Result<Arc<dyn QslService<R2, P2>>>
    where
        R2: Send + 'static,
        P2: Send + 'static,
    {
        let map = self.app.inner.any_services.read();

        let any = map
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("Service not found: {name}"))?;

        let stored = any
            .as_ref()
            .downcast_ref::<Arc<dyn QslService<R2, P2>>>()
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Service type mismatch for '{name}'. \
                     You requested a different <R,P> than what was registered."
                )
            })?;

        Ok(Arc::clone(stored))
    }
}

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use qsl_core::QslApp;
use qsl_core::QslService;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::net::{TcpListener, ToSocketAddrs};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::params::FromRestParams;
use crate::rest;

pub struct AxumApp<R, P = ()>
where
    R: Send + Sync + 'static,
    P: Send + Sync + Clone + 'static,
{
    pub app: QslApp<R, P>,
    pub router: Router<()>,
}

impl<R, P> Clone for AxumApp<R, P>
where
    R: Send + Sync + 'static,
    P: Send + Sync + Clone + 'static,
{
    fn clone(&self) -> Self {
        Self {
            app: self.app.clone(),
            router: self.router.clone(),
        }
    }
}

/// Request ids and tracing for a router.
fn with_layers(router: Router<()>) -> Router<()> {
    router
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

impl<R, P> AxumApp<R, P>
where
    R: Send + Sync + 'static,
    P: Send + Sync + Clone + 'static,
{
    pub fn new(app: QslApp<R, P>) -> Self {
        Self {
            app,
            router: Router::new(),
        }
    }

    pub fn use_router(mut self, path: &str, router: Router<()>) -> Self {
        self.router = self.router.nest(path, with_layers(router));
        self
    }

    /// Register `service` under the last segment of `path` and mount its REST routes.
    ///
    /// `/api/cards` registers the service `cards`.
    pub fn use_service(self, path: &'static str, service: Arc<dyn QslService<R, P>>) -> Self
    where
        R: Serialize + DeserializeOwned,
        P: FromRestParams,
    {
        let name = path.trim_matches('/').rsplit('/').next().unwrap_or(path);
        self.app.register_service(name, service);

        let router = rest::service_router(Arc::new(name.to_string()), self.app.clone());
        self.use_router(path, router)
    }

    pub async fn listen<A>(self, addr: A) -> anyhow::Result<()>
    where
        A: ToSocketAddrs,
    {
        self.listen_with_shutdown(addr, shutdown_signal()).await
    }

    /// Serve until `shutdown` resolves, then let in-flight requests finish.
    pub async fn listen_with_shutdown<A, F>(self, addr: A, shutdown: F) -> anyhow::Result<()>
    where
        A: ToSocketAddrs,
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "listening");
        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler: run until killed.
        futures::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

pub fn axum<R, P>(app: QslApp<R, P>) -> AxumApp<R, P>
where
    R: Send + Sync + 'static,
    P: Send + Sync + Clone + 'static,
{
    AxumApp::new(app)
}

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use async_trait::async_trait;
use qsl_core::errors::QslError;
use qsl_core::hooks::{HookContext, Next, QslAroundHook};
use qsl_core::QslApp;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::services::VaultParams;

/// Logs every service call with its outcome and duration.
pub struct LogAround;

#[async_trait]
impl QslAroundHook<Value, VaultParams> for LogAround {
    async fn run(
        &self,
        ctx: &mut HookContext<Value, VaultParams>,
        next: Next<Value, VaultParams>,
    ) -> Result<()> {
        let started = Instant::now();
        let res = next.run(ctx).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let service = ctx.service.as_str();
        let method = ctx.method.name();
        let tenant = ctx
            .tenant
            .tenant_id()
            .map(|t| t.as_str().to_string())
            .unwrap_or_default();

        match &res {
            Ok(()) => debug!(service, method, %tenant, elapsed_ms, "ok"),
            Err(err) => {
                let code = QslError::find_in(err).map(|e| e.code()).unwrap_or(500);
                if code >= 500 {
                    warn!(service, method, %tenant, elapsed_ms, code, error = %err, "failed");
                } else {
                    info!(service, method, %tenant, elapsed_ms, code, "rejected");
                }
            }
        }
        res
    }
}

pub fn global_hooks(app: &QslApp<Value, VaultParams>) {
    app.hooks(|h| {
        h.around_all(Arc::new(LogAround));
    });
}

/// Implements [`QslService`](crate::QslService) by forwarding to inherent
/// `_find`/`_get`/`_create`/`_update`/`_patch`/`_remove`/`_custom` methods.
///
/// The type must have a `capabilities: ServiceCapabilities` field.
#[macro_export]
macro_rules! qsl_adapter {
    ($ty:ty, $req:ty, $params:ty) => {
        #[async_trait::async_trait]
        impl $crate::QslService<$req, $params> for $ty {
            fn capabilities(&self) -> $crate::ServiceCapabilities {
                self.capabilities.clone()
            }

            async fn find(
                &self,
                ctx: &$crate::TenantContext,
                params: $params,
            ) -> anyhow::Result<$crate::Page<$req>> {
                self._find(ctx, params).await
            }

            async fn get(
                &self,
                ctx: &$crate::TenantContext,
                id: &str,
                params: $params,
            ) -> anyhow::Result<$req> {
                self._get(ctx, id, params).await
            }

            async fn create(
                &self,
                ctx: &$crate::TenantContext,
                data: $req,
                params: $params,
            ) -> anyhow::Result<$req> {
                self._create(ctx, data, params).await
            }

            async fn update(
                &self,
                ctx: &$crate::TenantContext,
                id: &str,
                data: $req,
                params: $params,
            ) -> anyhow::Result<$req> {
                self._update(ctx, id, data, params).await
            }

            async fn patch(
                &self,
                ctx: &$crate::TenantContext,
                id: Option<&str>,
                data: $req,
                params: $params,
            ) -> anyhow::Result<$req> {
                self._patch(ctx, id, data, params).await
            }

            async fn remove(
                &self,
                ctx: &$crate::TenantContext,
                id: Option<&str>,
                params: $params,
            ) -> anyhow::Result<$req> {
                self._remove(ctx, id, params).await
            }

            async fn custom(
                &self,
                ctx: &$crate::TenantContext,
                method: &str,
                id: Option<&str>,
                data: Option<$req>,
                params: $params,
            ) -> anyhow::Result<$req> {
                self._custom(ctx, method, id, data, params).await
            }
        }
    };
}

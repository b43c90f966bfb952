use std::sync::Arc;

use super::{DataSourceHandle, Result, TenantContext, TenantDataSourceRegistry, TenantOwner};
use crate::services::metrics::ACTIVATIONS_COUNTER;

/// Binds a unit of work to its owner's tenant connection.
#[derive(Clone)]
pub struct ConnectionRouter {
    registry: Arc<TenantDataSourceRegistry>,
}

impl ConnectionRouter {
    pub fn new(registry: Arc<TenantDataSourceRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<TenantDataSourceRegistry> {
        &self.registry
    }

    /// Resolves the owner's handle and makes it current for `context`.
    ///
    /// Calling it again for the same owner in the same context returns the
    /// bound handle without going back to the registry.
    pub async fn activate<O>(&self, context: &TenantContext, owner: &O) -> Result<DataSourceHandle>
    where
        O: TenantOwner + ?Sized,
    {
        let tenant = owner.tenant_id();

        if let Some(current) = context.current() {
            if current.tenant_id() == tenant {
                return Ok(current);
            }
        }

        let outcome = match self.registry.resolve(tenant).await {
            Ok(handle) => context.set_current(handle),
            Err(e) => Err(e),
        };

        let label = if outcome.is_ok() { "ok" } else { "error" };
        ACTIVATIONS_COUNTER.with_label_values(&[label]).inc();

        let handle = outcome?;
        tracing::debug!(tenant = %tenant, database = %handle.database_name(), "Activated tenant connection");
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tenancy::memory::MemoryServer;
    use crate::tenancy::{TenantError, TenantId};

    fn router(server: Arc<MemoryServer>) -> ConnectionRouter {
        ConnectionRouter::new(Arc::new(TenantDataSourceRegistry::new(server)))
    }

    #[tokio::test]
    async fn test_activate_twice_returns_same_handle_and_opens_once() {
        let server = MemoryServer::with_databases(&["tenant_42"]);
        let router = router(server.clone());
        let context = TenantContext::new();

        let first = router.activate(&context, &TenantId(42)).await.unwrap();
        let second = router.activate(&context, &TenantId(42)).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(server.open_count("tenant_42"), 1);
        assert_eq!(context.current().unwrap().database_name(), "tenant_42");
    }

    #[tokio::test]
    async fn test_failed_activation_leaves_context_unbound() {
        let router = router(MemoryServer::new());
        let context = TenantContext::new();

        let err = router.activate(&context, &TenantId(8)).await.unwrap_err();

        assert!(matches!(err, TenantError::Connection { .. }));
        assert!(!context.is_bound());
    }

    #[tokio::test]
    async fn test_bound_context_refuses_other_owner() {
        let server = MemoryServer::with_databases(&["tenant_1", "tenant_2"]);
        let router = router(server);
        let context = TenantContext::new();

        router.activate(&context, &TenantId(1)).await.unwrap();
        let err = router.activate(&context, &TenantId(2)).await.unwrap_err();

        assert!(matches!(err, TenantError::ContextAlreadyBound { .. }));
        assert_eq!(context.current().unwrap().tenant_id(), TenantId(1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_contexts_never_see_each_other() {
        let names: Vec<String> = (1..=8).map(|id| format!("tenant_{id}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let router = router(MemoryServer::with_databases(&refs));

        let tasks: Vec<_> = (1..=8)
            .flat_map(|id| std::iter::repeat(id).take(4))
            .map(|id| {
                let router = router.clone();
                tokio::spawn(async move {
                    let context = TenantContext::new();
                    router.activate(&context, &TenantId(id)).await.unwrap();
                    for _ in 0..10 {
                        tokio::task::yield_now().await;
                        assert_eq!(context.current().unwrap().tenant_id(), TenantId(id));
                    }
                    context.current().unwrap().database_name().to_string()
                })
            })
            .collect();

        for (i, task) in tasks.into_iter().enumerate() {
            let id = i / 4 + 1;
            assert_eq!(task.await.unwrap(), format!("tenant_{id}"));
        }
    }
}

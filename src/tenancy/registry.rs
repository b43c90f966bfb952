use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{OnceCell, RwLock};

use super::{database_name, DatabaseServer, Result, TenantDatabase, TenantId};
use crate::services::metrics::TENANT_CONNECTIONS_GAUGE;

/// A tenant's connection parameters together with its live pool.
pub struct TenantDataSource {
    tenant_id: TenantId,
    database_name: String,
    database: Arc<dyn TenantDatabase>,
}

impl TenantDataSource {
    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn database_name(&self) -> &str {
        &self.database_name
    }

    pub fn database(&self) -> &dyn TenantDatabase {
        self.database.as_ref()
    }
}

impl fmt::Debug for TenantDataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantDataSource")
            .field("tenant_id", &self.tenant_id)
            .field("database_name", &self.database_name)
            .finish()
    }
}

pub type DataSourceHandle = Arc<TenantDataSource>;

type Slot = Arc<OnceCell<DataSourceHandle>>;

/// Process-wide cache of tenant pools, one per tenant.
///
/// Lookups take the read lock. A miss inserts an empty slot under the write
/// lock and the pool is opened through the slot's `OnceCell`, so concurrent
/// first resolutions of one tenant open a single pool without blocking other
/// tenants.
pub struct TenantDataSourceRegistry {
    server: Arc<dyn DatabaseServer>,
    sources: RwLock<HashMap<TenantId, Slot>>,
}

impl TenantDataSourceRegistry {
    pub fn new(server: Arc<dyn DatabaseServer>) -> Self {
        Self {
            server,
            sources: RwLock::new(HashMap::new()),
        }
    }

    pub fn server(&self) -> &Arc<dyn DatabaseServer> {
        &self.server
    }

    /// Returns the cached handle for `tenant`, opening the pool on first use.
    ///
    /// A failed open leaves the empty slot in place; the next caller retries
    /// on that same slot, so at most one pool per tenant is ever live.
    pub async fn resolve(&self, tenant: TenantId) -> Result<DataSourceHandle> {
        loop {
            let slot = self.slot(tenant).await;

            let opened = slot
                .get_or_try_init(|| async {
                    let name = database_name(tenant);
                    let database = self.server.connect(&name).await?;
                    tracing::info!(tenant = %tenant, database = %name, "Opened tenant connection pool");
                    Ok::<_, super::TenantError>(Arc::new(TenantDataSource {
                        tenant_id: tenant,
                        database_name: name,
                        database,
                    }))
                })
                .await;

            let handle = match opened {
                Ok(handle) => handle.clone(),
                Err(e) => {
                    tracing::warn!(tenant = %tenant, "Tenant connection failed: {e}");
                    return Err(e);
                }
            };

            // Evicted between lookup and use: its pool is closed, go again.
            if !self.holds(tenant, &slot).await {
                continue;
            }
            self.publish_gauge().await;
            return Ok(handle);
        }
    }

    /// Whether a live handle is cached for `tenant`.
    pub async fn is_cached(&self, tenant: TenantId) -> bool {
        self.sources
            .read()
            .await
            .get(&tenant)
            .is_some_and(|slot| slot.initialized())
    }

    /// Closes and forgets the pool of `tenant`. Returns whether one was cached.
    ///
    /// A slot whose pool is still being opened is left alone.
    pub async fn evict(&self, tenant: TenantId) -> bool {
        let slot = {
            let mut sources = self.sources.write().await;
            match sources.get(&tenant) {
                Some(slot) if slot.initialized() => sources.remove(&tenant),
                _ => None,
            }
        };
        let evicted = match slot.as_ref().and_then(|s| s.get()) {
            Some(handle) => {
                handle.database().close().await;
                tracing::info!(tenant = %tenant, "Evicted tenant connection pool");
                true
            }
            None => false,
        };
        self.publish_gauge().await;
        evicted
    }

    pub async fn stats(&self) -> RegistryStats {
        let sources = self.sources.read().await;
        RegistryStats {
            cached_connections: sources.values().filter(|s| s.initialized()).count(),
        }
    }

    async fn slot(&self, tenant: TenantId) -> Slot {
        if let Some(slot) = self.sources.read().await.get(&tenant) {
            return slot.clone();
        }
        self.sources
            .write()
            .await
            .entry(tenant)
            .or_default()
            .clone()
    }

    async fn holds(&self, tenant: TenantId, slot: &Slot) -> bool {
        self.sources
            .read()
            .await
            .get(&tenant)
            .is_some_and(|current| Arc::ptr_eq(current, slot))
    }

    async fn publish_gauge(&self) {
        let stats = self.stats().await;
        TENANT_CONNECTIONS_GAUGE.set(stats.cached_connections as f64);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RegistryStats {
    pub cached_connections: usize,
}

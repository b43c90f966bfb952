use std::collections::HashSet;
use std::sync::Mutex;

use super::{
    ConnectionRouter, DataSourceHandle, Migration, MigrationSet, Result, TenantContext,
    TenantError, TenantId, TenantOwner,
};
use crate::services::metrics::{MIGRATIONS_COUNTER, PROVISIONING_COUNTER};

/// Creates tenant databases and applies the tenant migration set.
///
/// The sequence is CREATE DATABASE, bind, migrate. A migration failure leaves
/// the created database in place, partially migrated, and is reported with the
/// last version that did apply. Nothing is retried or dropped automatically.
pub struct TenantProvisioner {
    router: ConnectionRouter,
    migrations: MigrationSet,
    in_flight: Mutex<HashSet<TenantId>>,
}

impl TenantProvisioner {
    pub fn new(router: ConnectionRouter, migrations: MigrationSet) -> Self {
        Self {
            router,
            migrations,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn migrations(&self) -> &MigrationSet {
        &self.migrations
    }

    /// Provisions the dedicated database of a freshly created owner.
    pub async fn provision<O>(&self, owner: &O) -> Result<DataSourceHandle>
    where
        O: TenantOwner + ?Sized,
    {
        let tenant = owner.tenant_id();
        let database = owner.database();
        let _claim = self.claim(tenant)?;

        tracing::info!(tenant = %tenant, database = %database, "Creating tenant database");
        if let Err(e) = self.router.registry().server().create_database(&database).await {
            tracing::error!(tenant = %tenant, database = %database, step = "create_database", "Tenant provisioning failed: {e}");
            PROVISIONING_COUNTER.with_label_values(&["create_failed"]).inc();
            return Err(e);
        }
        tracing::info!(tenant = %tenant, database = %database, "Tenant database created");

        // Migrations must run on the new database, never the administrative one.
        let context = TenantContext::new();
        let handle = match self.router.activate(&context, owner).await {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!(tenant = %tenant, database = %database, step = "connect", "Tenant provisioning failed: {e}");
                PROVISIONING_COUNTER.with_label_values(&["connect_failed"]).inc();
                return Err(e);
            }
        };

        tracing::info!(
            tenant = %tenant,
            database = %database,
            migrations = self.migrations.len(),
            "Applying tenant migrations"
        );
        let last_applied = match self.apply(&handle, self.migrations.iter(), None).await {
            Ok(version) => version,
            Err(e) => {
                PROVISIONING_COUNTER.with_label_values(&["migration_failed"]).inc();
                return Err(e);
            }
        };

        PROVISIONING_COUNTER.with_label_values(&["ok"]).inc();
        tracing::info!(
            tenant = %tenant,
            database = %database,
            version = ?last_applied,
            "Tenant provisioning complete"
        );
        Ok(handle)
    }

    /// Applies migrations newer than the highest version recorded in the
    /// tenant database. Returns the version the tenant is at afterwards.
    pub async fn migrate_pending<O>(&self, owner: &O) -> Result<Option<i64>>
    where
        O: TenantOwner + ?Sized,
    {
        let tenant = owner.tenant_id();
        let _claim = self.claim(tenant)?;

        let context = TenantContext::new();
        let handle = self.router.activate(&context, owner).await?;
        let current = handle.database().applied_versions().await?.last().copied();

        let pending: Vec<&Migration> = self.migrations.after(current).collect();
        if pending.is_empty() {
            return Ok(current);
        }

        tracing::info!(
            tenant = %tenant,
            database = %handle.database_name(),
            from = ?current,
            pending = pending.len(),
            "Applying pending tenant migrations"
        );
        self.apply(&handle, pending.into_iter(), current).await
    }

    async fn apply<'a>(
        &self,
        handle: &DataSourceHandle,
        migrations: impl Iterator<Item = &'a Migration>,
        mut last_applied: Option<i64>,
    ) -> Result<Option<i64>> {
        for migration in migrations {
            if let Err(source) = handle.database().run_migration(migration).await {
                tracing::error!(
                    tenant = %handle.tenant_id(),
                    database = %handle.database_name(),
                    step = "migrate",
                    failed_version = migration.version,
                    last_applied_version = ?last_applied,
                    "Tenant migration failed, database left partially migrated: {source}"
                );
                return Err(TenantError::Migration {
                    database: handle.database_name().to_string(),
                    failed_version: migration.version,
                    last_applied_version: last_applied,
                    source,
                });
            }
            MIGRATIONS_COUNTER.inc();
            tracing::info!(
                tenant = %handle.tenant_id(),
                version = migration.version,
                description = %migration.description,
                "Applied tenant migration"
            );
            last_applied = Some(migration.version);
        }
        Ok(last_applied)
    }

    fn claim(&self, tenant: TenantId) -> Result<InFlight<'_>> {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !in_flight.insert(tenant) {
            return Err(TenantError::ProvisioningInProgress(tenant));
        }
        Ok(InFlight { set: &self.in_flight, tenant })
    }
}

/// Releases the per-tenant provisioning claim on drop.
struct InFlight<'a> {
    set: &'a Mutex<HashSet<TenantId>>,
    tenant: TenantId,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&self.tenant);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::tenancy::memory::MemoryServer;
    use crate::tenancy::TenantDataSourceRegistry;

    fn provisioner(server: Arc<MemoryServer>) -> TenantProvisioner {
        let registry = Arc::new(TenantDataSourceRegistry::new(server));
        TenantProvisioner::new(ConnectionRouter::new(registry), MigrationSet::tenant())
    }

    #[tokio::test]
    async fn test_provision_creates_database_and_applies_migrations_in_order() {
        let server = MemoryServer::new();
        let provisioner = provisioner(server.clone());

        let handle = provisioner.provision(&TenantId(42)).await.unwrap();

        assert_eq!(handle.database_name(), "tenant_42");
        assert_eq!(server.created(), vec!["tenant_42".to_string()]);
        assert_eq!(server.database("tenant_42").unwrap().applied(), vec![1, 2, 3]);

        let registry = provisioner.router.registry();
        let resolved = registry.resolve(TenantId(42)).await.unwrap();
        assert!(Arc::ptr_eq(&resolved, &handle));
        assert_eq!(server.open_count("tenant_42"), 1);
    }

    #[tokio::test]
    async fn test_permission_denied_skips_migrations_and_caches_nothing() {
        let server = MemoryServer::new();
        server.deny_create("tenant_42");
        let provisioner = provisioner(server.clone());

        let err = provisioner.provision(&TenantId(42)).await.unwrap_err();

        assert!(matches!(err, TenantError::PermissionDenied { .. }));
        assert!(server.database("tenant_42").is_none());
        assert_eq!(server.open_count("tenant_42"), 0);
        assert!(!provisioner.router.registry().is_cached(TenantId(42)).await);
    }

    #[tokio::test]
    async fn test_duplicate_database_is_not_reused() {
        let server = MemoryServer::with_databases(&["tenant_42"]);
        let provisioner = provisioner(server.clone());

        let err = provisioner.provision(&TenantId(42)).await.unwrap_err();

        assert!(matches!(err, TenantError::DatabaseAlreadyExists(ref name) if name == "tenant_42"));
        assert!(server.database("tenant_42").unwrap().applied().is_empty());
        assert_eq!(server.open_count("tenant_42"), 0);
    }

    #[tokio::test]
    async fn test_migration_failure_keeps_database_with_earlier_versions() {
        let server = MemoryServer::new();
        server.fail_migration("tenant_42", 2);
        let provisioner = provisioner(server.clone());

        let err = provisioner.provision(&TenantId(42)).await.unwrap_err();

        match err {
            TenantError::Migration { failed_version, last_applied_version, .. } => {
                assert_eq!(failed_version, 2);
                assert_eq!(last_applied_version, Some(1));
            }
            other => panic!("expected migration error, got {other:?}"),
        }
        let database = server.database("tenant_42").expect("database is not dropped");
        assert_eq!(database.applied(), vec![1]);
    }

    #[tokio::test]
    async fn test_failure_on_first_migration_reports_none_applied() {
        let server = MemoryServer::new();
        server.fail_migration("tenant_3", 1);
        let provisioner = provisioner(server);

        match provisioner.provision(&TenantId(3)).await {
            Err(TenantError::Migration { last_applied_version, .. }) => {
                assert_eq!(last_applied_version, None)
            }
            other => panic!("expected migration error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_claim_is_exclusive_per_tenant() {
        let provisioner = provisioner(MemoryServer::new());

        let claim = provisioner.claim(TenantId(4)).unwrap();
        assert!(matches!(
            provisioner.provision(&TenantId(4)).await,
            Err(TenantError::ProvisioningInProgress(TenantId(4)))
        ));
        assert!(provisioner.claim(TenantId(5)).is_ok());

        drop(claim);
        assert!(provisioner.provision(&TenantId(4)).await.is_ok());
    }

    #[tokio::test]
    async fn test_migrate_pending_applies_only_newer_versions() {
        let server = MemoryServer::new();
        let registry = Arc::new(TenantDataSourceRegistry::new(server.clone()));
        let router = ConnectionRouter::new(registry);

        let initial = MigrationSet::new(vec![Migration::new(1, "one", "SELECT 1")]).unwrap();
        TenantProvisioner::new(router.clone(), initial)
            .provision(&TenantId(11))
            .await
            .unwrap();

        let upgraded = TenantProvisioner::new(router, MigrationSet::tenant());
        assert_eq!(upgraded.migrate_pending(&TenantId(11)).await.unwrap(), Some(3));
        assert_eq!(server.database("tenant_11").unwrap().applied(), vec![1, 2, 3]);

        assert_eq!(upgraded.migrate_pending(&TenantId(11)).await.unwrap(), Some(3));
        assert_eq!(server.database("tenant_11").unwrap().applied(), vec![1, 2, 3]);
    }
}

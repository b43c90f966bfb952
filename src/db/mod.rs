pub mod tenant;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::models::owner::{Owner, ProvisioningStatus};
use crate::services::owners::OwnerService;
use crate::tenancy::{TenantError, TenantOwner, TenantProvisioner};

pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Run the control-plane migrations embedded from ./migrations/control
pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations/control").run(pool).await?;
    Ok(())
}

/// Bring every ready tenant database up to the latest tenant migration.
/// Owners whose provisioning failed are left for an operator.
pub async fn migrate_all_existing_tenants(
    pool: &PgPool,
    provisioner: &TenantProvisioner,
) -> anyhow::Result<()> {
    let owners: Vec<Owner> = OwnerService::list_by_status(pool, ProvisioningStatus::Ready).await?;

    for owner in owners {
        match provisioner.migrate_pending(&owner).await {
            Ok(version) => {
                OwnerService::mark_ready(pool, owner.id, version).await?;
                tracing::info!("Migrated tenant database: {} (version {:?})", owner.database(), version);
            }
            Err(e) => {
                // One broken tenant must not keep the API from starting.
                tracing::error!("Tenant database {} could not be migrated: {e}", owner.database());
                if let Some(last_version) = failed_migration_version(&e) {
                    OwnerService::mark_failed(pool, owner.id, last_version, &e.to_string()).await?;
                }
            }
        }
    }
    Ok(())
}

/// For a failed migration, the version the tenant was left at. Other errors,
/// such as an unreachable tenant database, do not change the owner's state.
fn failed_migration_version(error: &TenantError) -> Option<Option<i64>> {
    match error {
        TenantError::Migration { last_applied_version, .. } => Some(*last_applied_version),
        _ => None,
    }
}

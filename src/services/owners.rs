use std::sync::Arc;

use sqlx::PgPool;

use crate::models::owner::{Owner, ProvisioningStatus};
use crate::tenancy::{TenantError, TenantOwner, TenantProvisioner};

const OWNER_COLUMNS: &str = "id, name, email, password_hash, provisioning_status,
    last_migration_version, provisioning_error, created_at, updated_at";

pub struct OwnerService;

impl OwnerService {
    pub async fn create(
        pool: &PgPool,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<Owner, sqlx::Error> {
        sqlx::query_as::<_, Owner>(&format!(
            "INSERT INTO owners (name, email, password_hash)
             VALUES ($1, $2, $3)
             RETURNING {OWNER_COLUMNS}"
        ))
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .fetch_one(pool)
        .await
    }

    pub async fn find(pool: &PgPool, id: i64) -> Result<Option<Owner>, sqlx::Error> {
        sqlx::query_as::<_, Owner>(&format!("SELECT {OWNER_COLUMNS} FROM owners WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Owner>, sqlx::Error> {
        sqlx::query_as::<_, Owner>(&format!(
            "SELECT {OWNER_COLUMNS} FROM owners WHERE lower(email) = lower($1)"
        ))
        .bind(email)
        .fetch_optional(pool)
        .await
    }

    pub async fn list_by_status(
        pool: &PgPool,
        status: ProvisioningStatus,
    ) -> Result<Vec<Owner>, sqlx::Error> {
        sqlx::query_as::<_, Owner>(&format!(
            "SELECT {OWNER_COLUMNS} FROM owners WHERE provisioning_status = $1 ORDER BY id"
        ))
        .bind(status.to_string())
        .fetch_all(pool)
        .await
    }

    /// Owners whose tenant database is not known to be usable.
    pub async fn list_unready(pool: &PgPool) -> Result<Vec<Owner>, sqlx::Error> {
        sqlx::query_as::<_, Owner>(&format!(
            "SELECT {OWNER_COLUMNS} FROM owners WHERE provisioning_status <> 'ready' ORDER BY id"
        ))
        .fetch_all(pool)
        .await
    }

    pub async fn mark_ready(pool: &PgPool, id: i64, version: Option<i64>) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE owners
             SET provisioning_status = 'ready', last_migration_version = $2,
                 provisioning_error = NULL, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(version)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn mark_failed(
        pool: &PgPool,
        id: i64,
        last_version: Option<i64>,
        error: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE owners
             SET provisioning_status = 'failed', last_migration_version = $2,
                 provisioning_error = $3, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(last_version)
        .bind(error)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Provisions the owner's tenant database and records the outcome on the
    /// owner row.
    ///
    /// Runs on its own task: once CREATE DATABASE has gone through, the
    /// sequence must finish even if the caller's future is dropped.
    pub async fn provision(
        pool: PgPool,
        provisioner: Arc<TenantProvisioner>,
        owner: Owner,
    ) -> Result<Option<i64>, TenantError> {
        let task = tokio::spawn(async move {
            let outcome = provisioner
                .provision(&owner)
                .await
                .map(|_| provisioner.migrations().latest_version());

            let recorded = match &outcome {
                Ok(version) => Self::mark_ready(&pool, owner.id, *version).await,
                Err(e) => {
                    let last_version = match e {
                        TenantError::Migration { last_applied_version, .. } => *last_applied_version,
                        _ => None,
                    };
                    Self::mark_failed(&pool, owner.id, last_version, &e.to_string()).await
                }
            };
            if let Err(e) = recorded {
                tracing::error!(
                    owner = owner.id,
                    database = %owner.database(),
                    "Could not record provisioning outcome: {e}"
                );
            }
            outcome
        });

        task.await
            .map_err(|e| TenantError::Internal(format!("provisioning task aborted: {e}")))?
    }
}

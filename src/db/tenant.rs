use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{Executor, PgPool};

use crate::models::lead::{CreateLeadRequest, Lead, LeadPage, LeadQuery};
use crate::tenancy::{DatabaseServer, Migration, Result, TenantDatabase, TenantError};

// SQLSTATE codes returned for a rejected CREATE DATABASE.
const DUPLICATE_DATABASE: &str = "42P04";
const INSUFFICIENT_PRIVILEGE: &str = "42501";

/// Pool settings applied to every tenant database.
#[derive(Debug, Clone)]
pub struct TenantPoolOptions {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for TenantPoolOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 0,
            acquire_timeout: Duration::from_secs(10),
        }
    }
}

/// PostgreSQL server hosting one database per tenant.
pub struct PgServer {
    admin: PgPool,
    connect_options: PgConnectOptions,
    pool_options: TenantPoolOptions,
}

impl PgServer {
    /// `admin` must hold CREATE DATABASE privileges. `connect_options` carry
    /// host and credentials for tenant databases; the database name is set
    /// per tenant.
    pub fn new(admin: PgPool, connect_options: PgConnectOptions, pool_options: TenantPoolOptions) -> Self {
        Self {
            admin,
            connect_options,
            pool_options,
        }
    }
}

/// Tenant names come from `database_name`; anything else is refused before
/// it reaches a DDL statement.
fn is_valid_database_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 63
        && name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit())
}

#[async_trait]
impl DatabaseServer for PgServer {
    async fn create_database(&self, name: &str) -> Result<()> {
        if !is_valid_database_name(name) {
            return Err(TenantError::PermissionDenied {
                database: name.to_string(),
                reason: "invalid database name".into(),
            });
        }

        let result = sqlx::raw_sql(&format!(r#"CREATE DATABASE "{name}""#))
            .execute(&self.admin)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) => {
                let code = db.code().map(|c| c.into_owned());
                match code.as_deref() {
                    Some(DUPLICATE_DATABASE) => Err(TenantError::DatabaseAlreadyExists(name.to_string())),
                    Some(INSUFFICIENT_PRIVILEGE) => Err(TenantError::PermissionDenied {
                        database: name.to_string(),
                        reason: db.message().to_string(),
                    }),
                    _ => Err(TenantError::Database(sqlx::Error::Database(db))),
                }
            }
            Err(e) => Err(TenantError::Database(e)),
        }
    }

    async fn connect(&self, name: &str) -> Result<Arc<dyn TenantDatabase>> {
        let options = self.connect_options.clone().database(name);
        let pool = PgPoolOptions::new()
            .max_connections(self.pool_options.max_connections)
            .min_connections(self.pool_options.min_connections)
            .acquire_timeout(self.pool_options.acquire_timeout)
            .idle_timeout(Duration::from_secs(600))
            .connect_with(options)
            .await
            .map_err(|e| TenantError::connection(name, e))?;

        Ok(Arc::new(PgTenantDatabase {
            name: name.to_string(),
            pool,
        }))
    }
}

/// A pool on one tenant database.
pub struct PgTenantDatabase {
    name: String,
    pool: PgPool,
}

impl PgTenantDatabase {
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl TenantDatabase for PgTenantDatabase {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run_migration(&self, migration: &Migration) -> std::result::Result<(), sqlx::Error> {
        // DDL is transactional in PostgreSQL: a failing script leaves no trace
        // and no bookkeeping row.
        let mut tx = self.pool.begin().await?;

        let conn: &mut sqlx::PgConnection = &mut tx;
        conn.execute(sqlx::raw_sql(
            "CREATE TABLE IF NOT EXISTS tenant_schema_migrations (
                version     BIGINT PRIMARY KEY,
                description TEXT NOT NULL,
                applied_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
        ))
        .await?;

        let conn: &mut sqlx::PgConnection = &mut tx;
        conn.execute(sqlx::raw_sql(&migration.sql)).await?;

        sqlx::query("INSERT INTO tenant_schema_migrations (version, description) VALUES ($1, $2)")
            .bind(migration.version)
            .bind(&migration.description)
            .execute(&mut *tx)
            .await?;

        tx.commit().await
    }

    async fn applied_versions(&self) -> std::result::Result<Vec<i64>, sqlx::Error> {
        let exists: bool = sqlx::query_scalar(
            "SELECT to_regclass('tenant_schema_migrations') IS NOT NULL",
        )
        .fetch_one(&self.pool)
        .await?;
        if !exists {
            return Ok(Vec::new());
        }

        sqlx::query_scalar("SELECT version FROM tenant_schema_migrations ORDER BY version")
            .fetch_all(&self.pool)
            .await
    }

    async fn list_leads(&self, query: &LeadQuery) -> std::result::Result<LeadPage, sqlx::Error> {
        let pattern = query.search_pattern();

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*)::BIGINT FROM leads
             WHERE $1::TEXT IS NULL
                OR name ILIKE $1 OR email ILIKE $1 OR phone ILIKE $1",
        )
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, Lead>(
            "SELECT id, name, email, phone, created_at, updated_at FROM leads
             WHERE $1::TEXT IS NULL
                OR name ILIKE $1 OR email ILIKE $1 OR phone ILIKE $1
             ORDER BY id DESC
             LIMIT $2 OFFSET $3",
        )
        .bind(&pattern)
        .bind(query.per_page())
        .bind(query.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(LeadPage::new(rows, total, query))
    }

    async fn find_lead(&self, id: i64) -> std::result::Result<Option<Lead>, sqlx::Error> {
        sqlx::query_as::<_, Lead>(
            "SELECT id, name, email, phone, created_at, updated_at FROM leads WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn insert_lead(&self, lead: &CreateLeadRequest) -> std::result::Result<Lead, sqlx::Error> {
        sqlx::query_as::<_, Lead>(
            "INSERT INTO leads (name, email, phone)
             VALUES ($1, $2, $3)
             RETURNING id, name, email, phone, created_at, updated_at",
        )
        .bind(lead.name.trim())
        .bind(lead.email.trim())
        .bind(lead.phone.trim())
        .fetch_one(&self.pool)
        .await
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

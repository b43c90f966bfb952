use std::env;
use std::time::Duration;

use crate::db::tenant::TenantPoolOptions;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Server holding the tenant databases. Defaults to `database_url`; the
    /// database name in it is replaced per tenant.
    pub tenant_database_url: String,
    pub tenant_db_max_connections: u32,
    pub tenant_db_min_connections: u32,
    pub tenant_db_acquire_timeout_secs: u64,
    pub jwt_secret: String,
    pub jwt_expiry_seconds: u64,
    pub host: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = required("DATABASE_URL")?;
        Ok(Self {
            tenant_database_url: env::var("TENANT_DATABASE_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| database_url.clone()),
            database_url,
            tenant_db_max_connections: env::var("TENANT_DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".into())
                .parse()?,
            tenant_db_min_connections: env::var("TENANT_DB_MIN_CONNECTIONS")
                .unwrap_or_else(|_| "0".into())
                .parse()?,
            tenant_db_acquire_timeout_secs: env::var("TENANT_DB_ACQUIRE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".into())
                .parse()?,
            jwt_secret: required("JWT_SECRET")?,
            jwt_expiry_seconds: env::var("JWT_EXPIRY_SECONDS")
                .unwrap_or_else(|_| "3600".into())
                .parse()?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()?,
        })
    }

    pub fn tenant_pool_options(&self) -> TenantPoolOptions {
        TenantPoolOptions {
            max_connections: self.tenant_db_max_connections,
            min_connections: self.tenant_db_min_connections.min(self.tenant_db_max_connections),
            acquire_timeout: Duration::from_secs(self.tenant_db_acquire_timeout_secs),
        }
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key).map_err(|_| anyhow::anyhow!("Missing required env var: {}", key))
}

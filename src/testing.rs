//! Shared fixtures for handler tests.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;

use crate::config::Config;
use crate::tenancy::memory::MemoryServer;
use crate::tenancy::{ConnectionRouter, MigrationSet, TenantDataSourceRegistry, TenantProvisioner};
use crate::AppState;

/// State backed by `server`. The control-plane pool is lazy and never
/// connects unless a handler touches it.
pub fn app_state(server: Arc<MemoryServer>, jwt_secret: &str) -> AppState {
    let config = Config {
        database_url: "postgres://localhost/leadhub".into(),
        tenant_database_url: "postgres://localhost/leadhub".into(),
        tenant_db_max_connections: 2,
        tenant_db_min_connections: 0,
        tenant_db_acquire_timeout_secs: 1,
        jwt_secret: jwt_secret.into(),
        jwt_expiry_seconds: 60,
        host: "127.0.0.1".into(),
        port: 0,
    };
    let db = PgPoolOptions::new()
        .connect_lazy(&config.database_url)
        .unwrap();
    let router = ConnectionRouter::new(Arc::new(TenantDataSourceRegistry::new(server)));
    let provisioner = Arc::new(TenantProvisioner::new(router.clone(), MigrationSet::tenant()));
    AppState {
        db,
        config: Arc::new(config),
        router,
        provisioner,
    }
}

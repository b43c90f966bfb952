use std::str::FromStr;
use std::sync::Arc;

use sqlx::postgres::PgConnectOptions;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use leadhub_api::{
    config::Config,
    db::{self, tenant::PgServer},
    tenancy::{ConnectionRouter, MigrationSet, TenantDataSourceRegistry, TenantProvisioner},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(Config::from_env()?);

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;
    info!("Control-plane database connected and migrations applied");

    let tenant_options = PgConnectOptions::from_str(&config.tenant_database_url)?;
    let server = PgServer::new(pool.clone(), tenant_options, config.tenant_pool_options());
    let registry = Arc::new(TenantDataSourceRegistry::new(Arc::new(server)));
    let router = ConnectionRouter::new(registry);
    let provisioner = Arc::new(TenantProvisioner::new(router.clone(), MigrationSet::tenant()));

    db::migrate_all_existing_tenants(&pool, &provisioner).await?;

    let state = AppState {
        db: pool,
        config: config.clone(),
        router,
        provisioner,
    };
    let app = leadhub_api::app(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("LeadHub API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

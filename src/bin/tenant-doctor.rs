/// Reports tenants whose database is not in a consistent state.
///
/// Usage: tenant-doctor [--owner ID]
///   --owner ID : compare this owner's recorded migrations with the embedded set

use std::str::FromStr;

use clap::Parser;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

use leadhub_api::{
    db::tenant::{PgServer, TenantPoolOptions},
    services::owners::OwnerService,
    tenancy::{DatabaseServer, MigrationSet, TenantOwner},
};

#[derive(Parser)]
#[command(name = "tenant-doctor", about = "Inspect tenant database provisioning state")]
struct Args {
    /// Owner id to inspect (lists every owner that is not ready if omitted)
    #[arg(long)]
    owner: Option<i64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();

    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("Missing required env var: DATABASE_URL"))?;
    let tenant_url = std::env::var("TENANT_DATABASE_URL").unwrap_or_else(|_| database_url.clone());

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await?;

    let Some(owner_id) = args.owner else {
        let owners = OwnerService::list_unready(&pool).await?;
        tracing::info!("{} owner(s) not ready", owners.len());
        for owner in owners {
            tracing::warn!(
                owner = owner.id,
                database = %owner.database(),
                status = %owner.provisioning_status,
                last_version = ?owner.last_migration_version,
                error = owner.provisioning_error.as_deref().unwrap_or(""),
                "Tenant not ready"
            );
        }
        return Ok(());
    };

    let owner = OwnerService::find(&pool, owner_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Owner {owner_id} not found"))?;

    let server = PgServer::new(
        pool.clone(),
        PgConnectOptions::from_str(&tenant_url)?,
        TenantPoolOptions {
            max_connections: 1,
            ..TenantPoolOptions::default()
        },
    );
    let database = server.connect(&owner.database()).await?;
    let applied = database.applied_versions().await?;
    database.close().await;

    let migrations = MigrationSet::tenant();
    let missing = migrations.missing_from(&applied);
    let unknown = migrations.unknown_in(&applied);

    tracing::info!(
        owner = owner.id,
        database = %owner.database(),
        status = %owner.provisioning_status,
        recorded = ?owner.last_migration_version,
        "Applied versions: {applied:?}"
    );

    if missing.is_empty() && unknown.is_empty() {
        tracing::info!("Tenant database is up to date");
    } else {
        tracing::warn!(?missing, ?unknown, "Tenant database is inconsistent with the embedded migrations");
    }

    Ok(())
}

//! Database-per-tenant provisioning and routing.
//!
//! Every owner gets a dedicated database named by [`database_name`]. The
//! [`TenantProvisioner`] creates and migrates it once, the
//! [`TenantDataSourceRegistry`] keeps one live pool per tenant, and the
//! [`ConnectionRouter`] binds that pool to the [`TenantContext`] of the unit of
//! work currently executing. Tenant-scoped services only ever read the
//! connection from that context.

pub mod context;
pub mod error;
pub mod migrations;
pub mod provisioner;
pub mod registry;
pub mod router;

#[cfg(test)]
pub(crate) mod memory;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::lead::{CreateLeadRequest, Lead, LeadPage, LeadQuery};

pub use context::TenantContext;
pub use error::{Result, TenantError};
pub use migrations::{Migration, MigrationSet};
pub use provisioner::TenantProvisioner;
pub use registry::{DataSourceHandle, RegistryStats, TenantDataSource, TenantDataSourceRegistry};
pub use router::ConnectionRouter;

/// Identifier of a tenant. Equal to the id of the owning account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub i64);

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Returns the physical database name for a tenant.
pub fn database_name(tenant: TenantId) -> String {
    format!("tenant_{}", tenant.0)
}

/// Anything that identifies the owner of a tenant database.
pub trait TenantOwner {
    fn tenant_id(&self) -> TenantId;

    fn database(&self) -> String {
        database_name(self.tenant_id())
    }
}

impl TenantOwner for TenantId {
    fn tenant_id(&self) -> TenantId {
        *self
    }
}

/// The database server hosting tenant databases.
///
/// `create_database` runs on the administrative connection; `connect` opens a
/// pool on an existing tenant database.
#[async_trait]
pub trait DatabaseServer: Send + Sync {
    async fn create_database(&self, name: &str) -> Result<()>;

    async fn connect(&self, name: &str) -> Result<Arc<dyn TenantDatabase>>;
}

/// A live connection to one tenant database.
#[async_trait]
pub trait TenantDatabase: Send + Sync {
    fn name(&self) -> &str;

    /// Runs the migration script and records its version, atomically.
    async fn run_migration(&self, migration: &Migration) -> std::result::Result<(), sqlx::Error>;

    /// Versions recorded in the tenant's bookkeeping table, ascending.
    async fn applied_versions(&self) -> std::result::Result<Vec<i64>, sqlx::Error>;

    async fn list_leads(&self, query: &LeadQuery) -> std::result::Result<LeadPage, sqlx::Error>;

    async fn find_lead(&self, id: i64) -> std::result::Result<Option<Lead>, sqlx::Error>;

    async fn insert_lead(&self, lead: &CreateLeadRequest) -> std::result::Result<Lead, sqlx::Error>;

    async fn close(&self);
}

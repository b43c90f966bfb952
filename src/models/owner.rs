use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::tenancy::{TenantId, TenantOwner};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProvisioningStatus {
    Pending,
    Ready,
    Failed,
}

impl std::fmt::Display for ProvisioningStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProvisioningStatus::Pending => "pending",
            ProvisioningStatus::Ready => "ready",
            ProvisioningStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ProvisioningStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ProvisioningStatus::Pending),
            "ready" => Ok(ProvisioningStatus::Ready),
            "failed" => Ok(ProvisioningStatus::Failed),
            _ => Err(anyhow::anyhow!("Unknown provisioning status: {s}")),
        }
    }
}

/// Control-plane row for a tenant owner.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Owner {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Stored as TEXT; see [`Owner::status`].
    pub provisioning_status: String,
    pub last_migration_version: Option<i64>,
    pub provisioning_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Owner {
    pub fn status(&self) -> Option<ProvisioningStatus> {
        self.provisioning_status.parse().ok()
    }
}

impl TenantOwner for Owner {
    fn tenant_id(&self) -> TenantId {
        TenantId(self.id)
    }
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}
